//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Requests**: Fire-and-forget work items, enqueued without waiting
//! 2. **Commands**: Control messages sent to a specific actor via mpsc
//! 3. **Request/Response**: oneshot channels for queries used by admins and tests

use std::time::Instant;

use tokio::sync::oneshot;

use crate::config::Telegram;
use crate::monitors::cooldown::CooldownEvaluation;
use crate::monitors::tps::TpsSample;

/// One rendered message waiting for the delivery workers
///
/// The target travels with the message so a reload between enqueue and send
/// cannot redirect it.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub telegram: Telegram,
    pub text: String,
    pub parse_mode: Option<String>,
}

/// Commands that can be sent to the DeliveryActor
#[derive(Debug)]
pub enum DeliveryCommand {
    /// Wait until every queued and in-flight message has been attempted
    Flush { respond_to: oneshot::Sender<()> },

    /// Get delivery counters
    GetStats {
        respond_to: oneshot::Sender<DeliveryStats>,
    },

    /// Stop accepting work and exit once in-flight sends finish
    Shutdown,
}

/// Delivery counters since the actor started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Messages the endpoint accepted
    pub delivered: u64,

    /// Messages answered with a non-2xx status
    pub rejected: u64,

    /// Messages lost to timeouts, DNS, TLS or connection errors
    pub failed: u64,

    /// Messages dropped because the queue was full
    pub dropped: u64,
}

/// Commands that can be sent to a HealthMonitorActor
#[derive(Debug)]
pub enum HealthCommand {
    /// Run a check immediately, bypassing the timer
    CheckNow {
        respond_to: oneshot::Sender<HealthCheck>,
    },

    /// Get the cooldown state of this monitor run
    GetState {
        respond_to: oneshot::Sender<HealthState>,
    },

    /// Stop the monitor
    Shutdown,
}

/// Result of one health check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HealthCheck {
    /// `messages.enable_low_tps` is off, nothing was sampled
    Disabled,

    /// The source was sampled and the cooldown evaluated
    Evaluated {
        sample: TpsSample,
        evaluation: CooldownEvaluation,
    },
}

/// Current state of a monitor run
#[derive(Debug, Clone, Copy)]
pub struct HealthState {
    pub checks: u64,
    pub alerts: u64,
    pub last_alert: Option<Instant>,
}
