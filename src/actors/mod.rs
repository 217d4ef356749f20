//! Background actors of the relay
//!
//! Each actor runs as an independent tokio task and is controlled through a cloneable
//! handle wrapping its command channel.
//!
//! ## Architecture Overview
//!
//! ```text
//!   host event ──► Dispatcher::notify ──┐
//!                                       │ try_send
//!   HealthMonitorActor ── Alert ────────┤
//!      ▲ (timer)                        ▼
//!      │                        ┌────────────────┐
//!   HealthMonitor               │ DeliveryActor  │──► TelegramClient (≤ 4 in flight)
//!   (start/stop/sync)           └────────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **DeliveryActor**: Drains the bounded message queue and performs the HTTP sends
//! - **HealthMonitorActor**: Samples TPS once per period and raises debounced alerts
//!
//! ## Communication Patterns
//!
//! 1. **Requests**: Messages are handed to the delivery queue without waiting
//! 2. **Commands**: Each actor has an mpsc command channel for control messages
//! 3. **Request/Response**: oneshot channels for queries (stats, state, checks)

pub mod delivery;
pub mod health;
pub mod messages;
