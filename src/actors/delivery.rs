//! DeliveryActor - Sends rendered messages to Telegram in the background
//!
//! Producers hand over a [`DeliveryRequest`] with `try_send` and return at once. The
//! actor drains the bounded queue and runs at most `workers` sends concurrently, so a
//! burst of events cannot create an unbounded number of tasks.
//!
//! ## Message Flow
//!
//! ```text
//! Dispatcher::notify → try_send ─┐
//!                                ▼
//!                       bounded request queue → DeliveryActor → JoinSet (≤ workers) → TelegramClient::send
//!                                ▲
//!                                └─── Commands (Flush, GetStats, Shutdown)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, instrument, trace, warn};

use crate::telegram::{DeliveryOutcome, TelegramClient};

use super::messages::{DeliveryCommand, DeliveryRequest, DeliveryStats};

/// Maximum number of sends in flight at once
pub const DELIVERY_WORKERS: usize = 4;

/// Messages that may wait for a worker before new ones are dropped
pub const DELIVERY_QUEUE_CAPACITY: usize = 256;

/// Actor that owns the HTTP client and the in-flight sends
pub struct DeliveryActor {
    /// Telegram client shared by all sends
    client: TelegramClient,

    /// Work queue filled by the dispatcher
    request_rx: mpsc::Receiver<DeliveryRequest>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<DeliveryCommand>,

    /// Sends currently running
    in_flight: JoinSet<DeliveryOutcome>,

    /// Concurrency bound
    workers: usize,

    stats: DeliveryStats,

    /// Incremented by handles when the queue is full
    dropped: Arc<AtomicU64>,
}

impl DeliveryActor {
    pub fn new(
        client: TelegramClient,
        request_rx: mpsc::Receiver<DeliveryRequest>,
        command_rx: mpsc::Receiver<DeliveryCommand>,
        workers: usize,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        Self {
            client,
            request_rx,
            command_rx,
            in_flight: JoinSet::new(),
            workers: workers.max(1),
            stats: DeliveryStats::default(),
            dropped,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command arrives or every handle has been dropped.
    #[instrument(skip(self), fields(workers = self.workers))]
    pub async fn run(mut self) {
        debug!("starting delivery actor");

        loop {
            tokio::select! {
                // New work
                Some(request) = self.request_rx.recv() => {
                    self.dispatch(request).await;
                }

                // Reap finished sends
                Some(result) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.record(result);
                }

                // Handle commands
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        DeliveryCommand::Flush { respond_to } => {
                            trace!("received Flush command");
                            self.flush().await;
                            let _ = respond_to.send(());
                        }

                        DeliveryCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.current_stats());
                        }

                        DeliveryCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                // All handles dropped
                else => {
                    debug!("delivery channels closed, shutting down");
                    break;
                }
            }
        }

        // let in-flight sends finish, they are bounded by the client timeouts
        while let Some(result) = self.in_flight.join_next().await {
            self.record(result);
        }

        debug!("delivery actor stopped");
    }

    /// Start a send, waiting for a free worker slot first.
    async fn dispatch(&mut self, request: DeliveryRequest) {
        while self.in_flight.len() >= self.workers {
            if let Some(result) = self.in_flight.join_next().await {
                self.record(result);
            }
        }

        let client = self.client.clone();
        trace!("starting delivery, {} already in flight", self.in_flight.len());
        self.in_flight.spawn(async move {
            client
                .send(
                    &request.telegram,
                    &request.text,
                    request.parse_mode.as_deref(),
                )
                .await
        });
    }

    /// Attempt everything that is queued and wait for all sends to finish.
    async fn flush(&mut self) {
        while let Ok(request) = self.request_rx.try_recv() {
            self.dispatch(request).await;
        }

        while let Some(result) = self.in_flight.join_next().await {
            self.record(result);
        }
    }

    fn record(&mut self, result: Result<DeliveryOutcome, tokio::task::JoinError>) {
        match result {
            Ok(DeliveryOutcome::Delivered) => self.stats.delivered += 1,
            Ok(DeliveryOutcome::Rejected(_)) => self.stats.rejected += 1,
            Ok(DeliveryOutcome::Failed) => self.stats.failed += 1,
            Err(e) => {
                error!("delivery task did not complete: {e}");
                self.stats.failed += 1;
            }
        }
    }

    fn current_stats(&self) -> DeliveryStats {
        DeliveryStats {
            dropped: self.dropped.load(Ordering::Relaxed),
            ..self.stats
        }
    }
}

/// Handle for feeding and controlling the DeliveryActor
///
/// Cheap to clone. Enqueueing never blocks and never fails loudly.
#[derive(Clone)]
pub struct DeliveryHandle {
    requests: mpsc::Sender<DeliveryRequest>,
    commands: mpsc::Sender<DeliveryCommand>,
    dropped: Arc<AtomicU64>,
}

impl DeliveryHandle {
    /// Spawn a delivery actor with the default queue size and worker count
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(client: TelegramClient) -> Self {
        Self::spawn_with(client, DELIVERY_QUEUE_CAPACITY, DELIVERY_WORKERS)
    }

    pub fn spawn_with(client: TelegramClient, queue_capacity: usize, workers: usize) -> Self {
        let (request_tx, request_rx) = mpsc::channel(queue_capacity.max(1));
        let (command_tx, command_rx) = mpsc::channel(32);
        let dropped = Arc::new(AtomicU64::new(0));

        let actor = DeliveryActor::new(client, request_rx, command_rx, workers, dropped.clone());
        tokio::spawn(actor.run());

        Self {
            requests: request_tx,
            commands: command_tx,
            dropped,
        }
    }

    /// Queue a message for delivery without waiting.
    ///
    /// Returns `false` when the message was dropped.
    pub fn enqueue(&self, request: DeliveryRequest) -> bool {
        match self.requests.try_send(request) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("delivery queue is full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("delivery actor is not running, dropping message");
                false
            }
        }
    }

    /// Wait until everything enqueued so far has been attempted
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(DeliveryCommand::Flush { respond_to: tx })
            .await
            .context("failed to send Flush command")?;

        rx.await.context("failed to receive flush confirmation")
    }

    /// Get delivery counters
    pub async fn stats(&self) -> Option<DeliveryStats> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(DeliveryCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Gracefully shut down the delivery actor
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(DeliveryCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
