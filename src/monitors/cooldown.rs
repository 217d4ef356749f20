//! Cooldown debouncing for health alerts
//!
//! ```text
//! metric >= threshold:
//!   → CooldownEvaluation::Healthy  (no alert, last alert is kept)
//!
//! metric < threshold:
//!   no previous alert              → CooldownEvaluation::Alert   (record now)
//!   now - last alert >= cooldown   → CooldownEvaluation::Alert   (record now)
//!   otherwise                      → CooldownEvaluation::Cooling (suppressed)
//! ```
//!
//! Recovering above the threshold does not restart the clock. Only one alert can
//! fire per cooldown window, however many ticks observe the breach.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownEvaluation {
    Healthy,
    Alert,
    Cooling,
}

impl CooldownEvaluation {
    pub fn evaluate(
        metric: f64,
        threshold: f64,
        cooldown: Duration,
        last_alert: Option<Instant>,
        now: Instant,
    ) -> CooldownEvaluation {
        // NaN is not a reading
        if metric.is_nan() || metric >= threshold {
            return CooldownEvaluation::Healthy;
        }

        match last_alert {
            None => CooldownEvaluation::Alert,
            Some(last) if now.saturating_duration_since(last) >= cooldown => {
                CooldownEvaluation::Alert
            }
            Some(_) => CooldownEvaluation::Cooling,
        }
    }
}

/// Per-signal cooldown state. Owned by exactly one monitor run.
#[derive(Debug, Clone, Default)]
pub struct Cooldown {
    last_alert: Option<Instant>,
}

impl Cooldown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_alert(&self) -> Option<Instant> {
        self.last_alert
    }

    /// Evaluate one tick and remember the alert time when it fires.
    pub fn evaluate(
        &mut self,
        metric: f64,
        threshold: f64,
        cooldown: Duration,
        now: Instant,
    ) -> CooldownEvaluation {
        let evaluation =
            CooldownEvaluation::evaluate(metric, threshold, cooldown, self.last_alert, now);
        if evaluation == CooldownEvaluation::Alert {
            self.last_alert = Some(now);
        }
        evaluation
    }

    pub fn should_alert(
        &mut self,
        metric: f64,
        threshold: f64,
        cooldown: Duration,
        now: Instant,
    ) -> bool {
        self.evaluate(metric, threshold, cooldown, now) == CooldownEvaluation::Alert
    }
}
