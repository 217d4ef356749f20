//! Helper functions for integration tests

use std::sync::{Arc, Mutex};

use telegram_relay::EventPayload;
use telegram_relay::config::{
    API_URL_KEY, CHAT_ID_KEY, ConfigSnapshot, ConfigValue, MemoryStore, TOKEN_KEY,
};
use telegram_relay::monitors::tps::TpsSource;
use telegram_relay::relay::Relay;
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "123456:test-token";
pub const TEST_CHAT: &str = "-100200";

/// Defaults plus working credentials pointing at the mock server
pub fn configured(server: &MockServer) -> ConfigSnapshot {
    configured_for(&server.uri())
}

pub fn configured_for(api_url: &str) -> ConfigSnapshot {
    ConfigSnapshot::defaults()
        .with_value(TOKEN_KEY, TEST_TOKEN)
        .with_value(CHAT_ID_KEY, TEST_CHAT)
        .with_value(API_URL_KEY, api_url)
}

pub fn with_values(
    snapshot: ConfigSnapshot,
    values: &[(&str, ConfigValue)],
) -> ConfigSnapshot {
    values
        .iter()
        .fold(snapshot, |snapshot, (key, value)| snapshot.with_value(*key, value.clone()))
}

/// Start a relay over an in-memory store
pub fn start_relay(
    snapshot: ConfigSnapshot,
    source: Arc<dyn TpsSource>,
) -> (Relay, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(snapshot));
    let relay = Relay::start(store.clone(), source).expect("relay should start");
    (relay, store)
}

pub fn payload(fields: &[(&str, &str)]) -> EventPayload {
    fields
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// TPS source whose readings tests can change while the monitor runs
#[derive(Debug, Default)]
pub struct ScriptedTps {
    readings: Mutex<Vec<f64>>,
}

impl ScriptedTps {
    pub fn new(readings: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            readings: Mutex::new(readings.to_vec()),
        })
    }

    pub fn set(&self, readings: &[f64]) {
        *self.readings.lock().unwrap() = readings.to_vec();
    }

    pub fn readings(&self) -> Vec<f64> {
        self.readings.lock().unwrap().clone()
    }

    /// The relay-facing source reading from this script
    pub fn source(self: &Arc<Self>) -> Arc<dyn TpsSource> {
        let script = self.clone();
        Arc::new(move || script.readings())
    }
}

pub fn steady_tps() -> Arc<dyn TpsSource> {
    ScriptedTps::new(&[20.0, 20.0, 20.0]).source()
}
