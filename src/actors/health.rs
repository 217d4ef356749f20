//! HealthMonitorActor - Periodically samples TPS and raises low-TPS alerts
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → enabled? → sample TpsSource → Cooldown::evaluate → Alert? → Dispatcher (Health)
//!     ↑
//!     └─── Commands (CheckNow, GetState, Shutdown)
//! ```
//!
//! Each run owns its own [`Cooldown`]. Stopping or restarting the monitor drops that
//! state, so disabling and re-enabling alerts starts with a clean clock.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument, trace, warn};

use crate::EventKind;
use crate::config::ConfigSnapshot;
use crate::dispatcher::Dispatcher;
use crate::monitors::cooldown::{Cooldown, CooldownEvaluation};
use crate::monitors::tps::{TpsSample, TpsSource};
use crate::state::ConfigState;

use super::messages::{HealthCheck, HealthCommand, HealthState};

/// Actor running one monitoring period loop
pub struct HealthMonitorActor {
    config: Arc<ConfigState>,

    dispatcher: Dispatcher,

    source: Arc<dyn TpsSource>,

    /// Debounce state of this run
    cooldown: Cooldown,

    command_rx: mpsc::Receiver<HealthCommand>,

    /// Fixed at start; a new period takes effect on restart
    period: Duration,

    checks: u64,

    alerts: u64,
}

impl HealthMonitorActor {
    pub fn new(
        config: Arc<ConfigState>,
        dispatcher: Dispatcher,
        source: Arc<dyn TpsSource>,
        command_rx: mpsc::Receiver<HealthCommand>,
    ) -> Self {
        let period = config.get().health_settings().check_interval;

        Self {
            config,
            dispatcher,
            source,
            cooldown: Cooldown::new(),
            command_rx,
            period,
            checks: 0,
            alerts: 0,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first check happens one full period after start.
    #[instrument(skip(self), fields(period_secs = self.period.as_secs()))]
    pub async fn run(mut self) {
        debug!("starting health monitor");

        let mut ticker = interval_at(tokio::time::Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check();
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        HealthCommand::CheckNow { respond_to } => {
                            trace!("received CheckNow command");
                            let _ = respond_to.send(self.check());
                        }

                        HealthCommand::GetState { respond_to } => {
                            let _ = respond_to.send(self.state());
                        }

                        HealthCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("health monitor stopped");
    }

    /// Sample and evaluate once, notifying when the cooldown allows it.
    fn check(&mut self) -> HealthCheck {
        let config = self.config.get();
        if !config.is_enabled(EventKind::Health) {
            trace!("low TPS alerts disabled, skipping check");
            return HealthCheck::Disabled;
        }

        self.checks += 1;
        let settings = config.health_settings();
        let sample = TpsSample::from_readings(&self.source.tps());

        let evaluation = self.cooldown.evaluate(
            sample.one_minute,
            settings.threshold,
            settings.cooldown,
            Instant::now(),
        );

        trace!(
            "TPS {:.2} vs threshold {:.2} → {evaluation:?}",
            sample.one_minute, settings.threshold
        );

        if evaluation == CooldownEvaluation::Alert {
            self.alerts += 1;
            info!(
                "TPS {:.2} below threshold {:.2}, sending alert",
                sample.one_minute, settings.threshold
            );
            self.dispatcher
                .dispatch(&config, EventKind::Health, sample.payload());
        }

        HealthCheck::Evaluated { sample, evaluation }
    }

    fn state(&self) -> HealthState {
        HealthState {
            checks: self.checks,
            alerts: self.alerts,
            last_alert: self.cooldown.last_alert(),
        }
    }
}

/// Handle for talking to a running HealthMonitorActor
#[derive(Clone)]
pub struct HealthHandle {
    sender: mpsc::Sender<HealthCommand>,
}

impl HealthHandle {
    /// Run a check immediately
    pub async fn check_now(&self) -> Result<HealthCheck> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HealthCommand::CheckNow { respond_to: tx })
            .await
            .context("failed to send CheckNow command")?;

        rx.await.context("failed to receive check result")
    }

    /// Get the state of this monitor run
    pub async fn state(&self) -> Option<HealthState> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HealthCommand::GetState { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Ask the monitor to stop after its current check
    pub async fn shutdown(&self) {
        let _ = self.sender.send(HealthCommand::Shutdown).await;
    }
}

struct RunningMonitor {
    handle: HealthHandle,
    task: JoinHandle<()>,
}

/// Owner of the (at most one) running health monitor
///
/// `start`, `stop`, `sync` and `restart` are synchronous and may be called from any
/// thread; the actor itself runs on the runtime captured at construction.
pub struct HealthMonitor {
    runtime: Handle,
    config: Arc<ConfigState>,
    dispatcher: Dispatcher,
    source: Arc<dyn TpsSource>,
    running: Mutex<Option<RunningMonitor>>,
}

impl HealthMonitor {
    pub fn new(
        runtime: Handle,
        config: Arc<ConfigState>,
        dispatcher: Dispatcher,
        source: Arc<dyn TpsSource>,
    ) -> Self {
        Self {
            runtime,
            config,
            dispatcher,
            source,
            running: Mutex::new(None),
        }
    }

    /// Start monitoring, replacing any monitor that is already running.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = running.take() {
            debug!("stopping previous health monitor before start");
            previous.task.abort();
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = HealthMonitorActor::new(
            self.config.clone(),
            self.dispatcher.clone(),
            self.source.clone(),
            cmd_rx,
        );
        let task = self.runtime.spawn(actor.run());

        *running = Some(RunningMonitor {
            handle: HealthHandle { sender: cmd_tx },
            task,
        });
    }

    /// Stop monitoring. Does nothing when no monitor is running.
    pub fn stop(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = running.take() {
            debug!("stopping health monitor");
            previous.task.abort();
        }
    }

    /// Start or stop to match the snapshot's enable flag, keeping a running monitor as is.
    pub fn sync(&self, config: &ConfigSnapshot) {
        let enabled = config.is_enabled(EventKind::Health);
        match (enabled, self.is_running()) {
            (true, false) => self.start(),
            (false, true) => self.stop(),
            _ => trace!("health monitor already matches configuration (enabled: {enabled})"),
        }
    }

    /// Rebuild the monitor from the current configuration, resetting its cooldown.
    pub fn restart(&self) {
        self.stop();
        if self.config.get().is_enabled(EventKind::Health) {
            self.start();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Handle of the running monitor, if any
    pub fn handle(&self) -> Option<HealthHandle> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|running| running.handle.clone())
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
