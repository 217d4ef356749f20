//! Single entry point for event producers
//!
//! `notify` reads the configuration once, renders on the caller's thread and hands the
//! text to the delivery queue. It never waits on the network.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::actors::delivery::DeliveryHandle;
use crate::actors::messages::DeliveryRequest;
use crate::config::ConfigSnapshot;
use crate::state::ConfigState;
use crate::template::render;
use crate::{EventKind, EventPayload};

/// What `notify` did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The kind is switched off; nothing was rendered
    Disabled,

    /// Rendered and handed to the delivery queue
    Queued,

    /// Rendered, but the delivery queue was full or closed
    Dropped,

    /// The snapshot has no usable credentials
    Unconfigured,
}

#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<ConfigState>,
    delivery: DeliveryHandle,
}

impl Dispatcher {
    pub fn new(config: Arc<ConfigState>, delivery: DeliveryHandle) -> Self {
        Self { config, delivery }
    }

    /// Relay one host event.
    ///
    /// Safe to call from any thread, including ones outside the tokio runtime.
    pub fn notify(&self, kind: EventKind, payload: EventPayload) -> Dispatch {
        let config = self.config.get();
        if !config.is_enabled(kind) {
            return Dispatch::Disabled;
        }

        self.dispatch(&config, kind, payload)
    }

    /// Render and enqueue against a snapshot the caller already holds, skipping the
    /// enable check.
    pub fn dispatch(
        &self,
        config: &ConfigSnapshot,
        kind: EventKind,
        payload: EventPayload,
    ) -> Dispatch {
        let text = render(config.template(kind), &payload);
        trace!("rendered {kind} event: {text}");
        self.enqueue(config, text)
    }

    /// Send a fixed text, e.g. an administrative announcement.
    pub fn announce(&self, text: impl Into<String>) -> Dispatch {
        let config = self.config.get();
        self.enqueue(&config, text.into())
    }

    pub fn delivery(&self) -> &DeliveryHandle {
        &self.delivery
    }

    fn enqueue(&self, config: &ConfigSnapshot, text: String) -> Dispatch {
        let telegram = match config.telegram() {
            Ok(telegram) => telegram,
            Err(e) => {
                warn!("not sending message: {e}");
                return Dispatch::Unconfigured;
            }
        };

        let request = DeliveryRequest {
            telegram,
            text,
            parse_mode: config.parse_mode().map(str::to_string),
        };

        if self.delivery.enqueue(request) {
            Dispatch::Queued
        } else {
            Dispatch::Dropped
        }
    }
}
