use crate::EventPayload;

/// Highest tick rate a server can report; readings above it are shown capped.
pub const MAX_TPS: f64 = 20.0;

/// Host-supplied tick rate readings, ordered 1m, 5m, 15m.
///
/// Called from the health monitor task, so implementations must be cheap and
/// must not block on the host's main thread.
pub trait TpsSource: Send + Sync {
    fn tps(&self) -> Vec<f64>;
}

impl<F> TpsSource for F
where
    F: Fn() -> Vec<f64> + Send + Sync,
{
    fn tps(&self) -> Vec<f64> {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TpsSample {
    pub one_minute: f64,
    pub five_minutes: f64,
    pub fifteen_minutes: f64,
}

impl TpsSample {
    /// Build a sample from however many averages the host provides.
    ///
    /// Missing long-term averages fall back to the next shorter one, a missing 1m
    /// average is assumed perfect.
    pub fn from_readings(readings: &[f64]) -> Self {
        let one_minute = readings.first().copied().unwrap_or(MAX_TPS);
        let five_minutes = readings.get(1).copied().unwrap_or(one_minute);
        let fifteen_minutes = readings.get(2).copied().unwrap_or(five_minutes);

        Self {
            one_minute,
            five_minutes,
            fifteen_minutes,
        }
    }

    /// Placeholders for the health template: `tps1m`, `tps5m`, `tps15m`.
    pub fn payload(&self) -> EventPayload {
        EventPayload::from([
            ("tps1m".to_string(), format_tps(self.one_minute)),
            ("tps5m".to_string(), format_tps(self.five_minutes)),
            ("tps15m".to_string(), format_tps(self.fifteen_minutes)),
        ])
    }
}

pub fn format_tps(tps: f64) -> String {
    format!("{:.2}", tps.min(MAX_TPS))
}
