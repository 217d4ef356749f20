//! The relay context
//!
//! One [`Relay`] is built at startup and handed to whoever needs it: the host's event
//! hooks call [`Relay::notify`], the administrative interface calls
//! [`Relay::set_flag`], [`Relay::toggle`], [`Relay::features`] and [`Relay::reload`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::actors::delivery::DeliveryHandle;
use crate::actors::health::HealthMonitor;
use crate::config::{ConfigSnapshot, ConfigStore};
use crate::dispatcher::{Dispatch, Dispatcher};
use crate::error::{ConfigError, ConfigResult};
use crate::monitors::tps::TpsSource;
use crate::state::ConfigState;
use crate::telegram::TelegramClient;
use crate::template::render;
use crate::{EventKind, EventPayload};

/// One toggleable feature and its current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureState {
    pub kind: EventKind,
    /// Name of the flag below `messages.`, e.g. `enable_low_tps`
    pub name: String,
    pub enabled: bool,
}

/// Result of a successful reload
#[derive(Debug, Clone)]
pub struct ReloadReport {
    pub took: Duration,
    pub reloaded_at: DateTime<Utc>,
}

pub struct Relay {
    config: Arc<ConfigState>,
    store: Arc<dyn ConfigStore>,
    dispatcher: Dispatcher,
    monitor: HealthMonitor,

    /// Held across publish, monitor sync and save so admin changes apply in order
    admin: Mutex<()>,
}

impl Relay {
    /// Load and validate the configuration, then start delivery and, when enabled,
    /// health monitoring.
    ///
    /// Must be called from within a tokio runtime. Fails without starting anything
    /// when the credentials are missing or placeholders.
    #[instrument(skip_all)]
    pub fn start(store: Arc<dyn ConfigStore>, source: Arc<dyn TpsSource>) -> Result<Self> {
        let runtime =
            Handle::try_current().context("relay must be started inside a tokio runtime")?;

        let snapshot = store.load().context("failed to load configuration")?;
        snapshot
            .telegram()
            .context("refusing to start with invalid Telegram configuration")?;

        let client = TelegramClient::new()?;
        let config = Arc::new(ConfigState::new(snapshot));
        let dispatcher = Dispatcher::new(config.clone(), DeliveryHandle::spawn(client));
        let monitor = HealthMonitor::new(runtime, config.clone(), dispatcher.clone(), source);

        monitor.sync(&config.get());
        info!(
            "relay started, low TPS monitoring {}",
            if monitor.is_running() { "on" } else { "off" }
        );

        Ok(Self {
            config,
            store,
            dispatcher,
            monitor,
            admin: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ConfigState {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    /// Relay one host event. Never waits on the network.
    pub fn notify(&self, kind: EventKind, payload: EventPayload) -> Dispatch {
        self.dispatcher.notify(kind, payload)
    }

    /// Switch a feature on or off, then persist the published snapshot.
    ///
    /// The new state is live even when saving fails; the save error is returned so
    /// the caller can report it.
    pub fn set_flag(&self, feature: &str, enabled: bool) -> ConfigResult<EventKind> {
        let kind = parse_feature(feature)?;
        self.apply_flag(kind, enabled)?;
        Ok(kind)
    }

    fn apply_flag(&self, kind: EventKind, enabled: bool) -> ConfigResult<()> {
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);

        let published = self.config.toggle(&kind.flag_key(), enabled);
        self.monitor.sync(&published);
        info!("set {} = {enabled}", kind.flag_key());

        self.store.save(&published)
    }

    /// Like [`Relay::set_flag`], with the state given as a switch word (`on`, `off`, ...).
    pub fn toggle(&self, feature: &str, switch: &str) -> ConfigResult<(EventKind, bool)> {
        let kind = parse_feature(feature)?;
        let enabled = parse_switch(switch)?;
        self.apply_flag(kind, enabled)?;
        Ok((kind, enabled))
    }

    /// Every enable flag and its state in the current snapshot
    pub fn features(&self) -> Vec<FeatureState> {
        let config = self.config.get();
        EventKind::ALL
            .into_iter()
            .map(|kind| FeatureState {
                kind,
                name: format!("enable_{}", kind.config_name()),
                enabled: config.is_enabled(kind),
            })
            .collect()
    }

    /// Re-read the configuration from the store.
    ///
    /// Invalid configuration leaves the previous snapshot and monitor untouched. On
    /// success the monitor is rebuilt and `who` is announced to the chat.
    #[instrument(skip(self))]
    pub fn reload(&self, who: &str) -> ConfigResult<ReloadReport> {
        let started = Instant::now();
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);

        let snapshot = match load_valid(self.store.as_ref()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("reload failed, keeping previous settings: {e}");
                return Err(e);
            }
        };

        self.config.set(snapshot);
        self.monitor.restart();

        let config = self.config.get();
        let announcement = render(
            config.reload_template(),
            &EventPayload::from([("who".to_string(), who.to_string())]),
        );
        self.dispatcher.announce(announcement);

        let report = ReloadReport {
            took: started.elapsed(),
            reloaded_at: Utc::now(),
        };
        info!("configuration reloaded in {:?}", report.took);
        Ok(report)
    }

    /// Stop monitoring and wait for queued messages to be attempted.
    pub async fn shutdown(self) -> Result<()> {
        debug!("shutting down relay");
        self.monitor.stop();

        let delivery = self.dispatcher.delivery();
        delivery.flush().await?;
        delivery.shutdown().await
    }
}

fn load_valid(store: &dyn ConfigStore) -> ConfigResult<ConfigSnapshot> {
    let snapshot = store.load()?;
    snapshot.telegram()?;
    Ok(snapshot)
}

/// Resolve a feature name. Accepts `join`, `enable_join` and the monitor aliases
/// `monitor`, `tps` and `low_tps`.
pub fn parse_feature(input: &str) -> ConfigResult<EventKind> {
    let name = input.trim().to_ascii_lowercase();
    let name = name.strip_prefix("enable_").unwrap_or(&name);

    if name == "monitor" {
        return Ok(EventKind::Health);
    }

    name.parse()
        .map_err(|_| ConfigError::UnknownFeature(input.to_string()))
}

pub fn parse_switch(input: &str) -> ConfigResult<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "enable" => Ok(true),
        "off" | "false" | "disable" => Ok(false),
        _ => Err(ConfigError::InvalidSwitch(input.to_string())),
    }
}
