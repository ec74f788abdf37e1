//! in-process store with per-handle change fan-out
//!
//! The in-memory analog of the shared store: several handles in one process
//! stand in for several processes sharing one origin. This is what makes the
//! synchronization logic testable without a filesystem.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::store::{ChangeHandler, SharedStore};

#[derive(Default)]
struct Shared {
    values: DashMap<String, String>,
    handlers: Mutex<Vec<(u64, ChangeHandler)>>,
    next_handle: Mutex<u64>,
}

/// The store itself. Hand one [`MemoryStoreHandle`] to each participant.
#[derive(Clone, Default)]
pub struct MemoryStore(Arc<Shared>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MemoryStoreHandle {
        let mut next = self.0.next_handle.lock();
        let id = *next;
        *next += 1;
        MemoryStoreHandle { shared: self.0.clone(), id }
    }
}

/// One participant's connection. Writes through any handle notify every
/// other handle's change handler synchronously, never the writer's own.
pub struct MemoryStoreHandle {
    shared: Arc<Shared>,
    id: u64,
}

impl SharedStore for MemoryStoreHandle {
    fn get(&self, key: &str) -> Option<String> {
        self.shared.values.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        let prev = self.shared.values.insert(key.to_string(), value.to_string());
        if prev.as_deref() == Some(value) {
            return;
        }
        let mut handlers = self.shared.handlers.lock();
        for (handle_id, handler) in handlers.iter_mut() {
            if *handle_id != self.id {
                handler(key, value);
            }
        }
    }

    fn on_change(&self, handler: ChangeHandler) {
        let mut handlers = self.shared.handlers.lock();
        handlers.retain(|(handle_id, _)| *handle_id != self.id);
        handlers.push((self.id, handler));
    }
}
