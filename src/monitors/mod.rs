//! Health signal evaluation
//!
//! - [`cooldown`]: the debounce state machine deciding when a low reading alerts
//! - [`tps`]: the host-supplied tick rate signal and its formatting

pub mod cooldown;
pub mod tps;
