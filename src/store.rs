//! the shared key-value substrate every process of the mesh can see

use std::path::PathBuf;

use thiserror::Error;

pub mod file;
pub mod memory;

/// Key holding the serialized window registry.
pub const KEY_WINDOWS: &str = "windows";
/// Key holding the identity counter.
pub const KEY_COUNT: &str = "count";

/// Invoked with `(key, new_value)` when *another* process (or another handle
/// of the same store) changes a value. Runs to completion on the notifying
/// thread; within a single writer's sequence of writes, delivery order
/// matches write order.
pub type ChangeHandler = Box<dyn FnMut(&str, &str) + Send>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access shared store at {path:?}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot watch shared store at {path:?}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// One process's connection to the shared store.
///
/// Semantics are last-writer-wins: concurrent writes to the same key from
/// two processes silently overwrite each other with no merge and no conflict
/// signal. Change notifications are delivered at most once per observed value
/// change, to every handle except the writer.
///
/// Reads and writes are synchronous local calls and never block on peers.
/// A change handler must not write back into the store; the registry sync
/// built on top never does.
pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Best-effort write. Implementations log failures rather than propagate
    /// them; only store *construction* can fail hard.
    fn set(&self, key: &str, value: &str);

    /// Registers this handle's change handler, replacing any previous one.
    fn on_change(&self, handler: ChangeHandler);
}
