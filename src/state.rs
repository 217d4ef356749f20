//! Process-wide configuration holder
//!
//! The current [`ConfigSnapshot`] lives behind an `Arc`. Readers clone the `Arc` and
//! work with that snapshot for the rest of their operation; writers build a complete
//! new snapshot and swap the pointer. The read lock is only held for the clone, so a
//! reader never waits on anything slower than another pointer swap.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, trace};

use crate::config::{ConfigSnapshot, ConfigValue};

#[derive(Debug)]
pub struct ConfigState {
    current: RwLock<Arc<ConfigSnapshot>>,

    /// Serialises read-modify-publish cycles so concurrent toggles are not lost
    write_guard: Mutex<()>,
}

impl ConfigState {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            write_guard: Mutex::new(()),
        }
    }

    /// The currently published snapshot.
    pub fn get(&self) -> Arc<ConfigSnapshot> {
        // a poisoned lock still guards a fully formed Arc
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish a new snapshot, replacing the current one wholesale.
    pub fn set(&self, snapshot: ConfigSnapshot) {
        let _guard = self.write_guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.publish(Arc::new(snapshot));
    }

    /// Publish a copy of the current snapshot with `key` set to `value`.
    ///
    /// Returns the snapshot that was published.
    pub fn toggle(&self, key: &str, value: bool) -> Arc<ConfigSnapshot> {
        self.update(|current| current.with_value(key, ConfigValue::Bool(value)))
    }

    /// Derive and publish a new snapshot from the current one.
    pub fn update<F>(&self, derive: F) -> Arc<ConfigSnapshot>
    where
        F: FnOnce(&ConfigSnapshot) -> ConfigSnapshot,
    {
        let _guard = self.write_guard.lock().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(derive(&self.get()));
        self.publish(next.clone());
        next
    }

    fn publish(&self, snapshot: Arc<ConfigSnapshot>) {
        trace!("publishing configuration snapshot with {} keys", snapshot.len());
        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, snapshot)
        };
        debug!(
            "configuration published, {} reader(s) still hold the previous snapshot",
            Arc::strong_count(&previous) - 1
        );
    }
}

impl Default for ConfigState {
    fn default() -> Self {
        Self::new(ConfigSnapshot::defaults())
    }
}
