//! file-backed store shared by every process of one user
//!
//! The production analog of the browser's per-origin storage: one JSON object
//! file that every participating process reads and writes. Writes go through
//! a temp file plus rename so peers never observe a half-written store, and a
//! debounced filesystem watcher turns peer writes into change notifications.
//! Self-notifications are suppressed by diffing against the last snapshot
//! this process has seen, which includes its own writes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{fs, io, process};

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{
    DebounceEventResult, DebouncedEventKind, Debouncer, new_debouncer,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::common::collections::HashMap;
use crate::store::{ChangeHandler, SharedStore, StoreError};

const DEBOUNCE: Duration = Duration::from_millis(250);

struct FileState {
    /// Last values seen by this process, own writes included. The watcher
    /// diffs against this, so only peer writes surface as changes.
    snapshot: HashMap<String, String>,
    handler: Option<ChangeHandler>,
}

pub struct FileStore {
    path: PathBuf,
    state: Arc<Mutex<FileState>>,
    // Held only to keep the watcher thread alive.
    _debouncer: Mutex<Debouncer<RecommendedWatcher>>,
}

impl FileStore {
    /// Opens (creating if needed) the shared store file and starts watching
    /// it. This is the one place the system fails hard: without the store
    /// there is nothing to synchronize through.
    pub fn new(path: impl Into<PathBuf>) -> Result<FileStore, StoreError> {
        let path = path.into();
        let unavailable = |source| StoreError::Unavailable { path: path.clone(), source };

        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(unavailable)?;
        if path.exists() {
            fs::read_to_string(&path).map_err(unavailable)?;
        } else {
            write_atomic(&path, "{}").map_err(unavailable)?;
        }

        let state = Arc::new(Mutex::new(FileState {
            snapshot: read_map(&path),
            handler: None,
        }));

        let file_name: Option<OsString> = path.file_name().map(|name| name.to_os_string());
        let watch_path = path.clone();
        let watch_state = state.clone();
        let mut debouncer =
            new_debouncer(DEBOUNCE, move |res: DebounceEventResult| {
                let Ok(events) = res else { return };
                let relevant = events.iter().any(|e| {
                    e.kind == DebouncedEventKind::Any
                        && e.path.file_name() == file_name.as_deref()
                });
                if relevant {
                    dispatch_changes(&watch_path, &watch_state);
                }
            })
            .map_err(|source| StoreError::Watch { path: path.clone(), source })?;
        debouncer
            .watcher()
            .watch(&parent, RecursiveMode::NonRecursive)
            .map_err(|source| StoreError::Watch { path: path.clone(), source })?;
        debug!("watching shared store at {:?}", path);

        Ok(FileStore {
            path,
            state,
            _debouncer: Mutex::new(debouncer),
        })
    }
}

impl SharedStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        read_map(&self.path).remove(key)
    }

    fn set(&self, key: &str, value: &str) {
        // The lock serializes this process's read-modify-write cycles. A
        // racing peer write between our read and rename is still lost
        // wholesale; that is the documented last-writer-wins semantics.
        let mut state = self.state.lock();
        let mut map = read_map(&self.path);
        map.insert(key.to_string(), value.to_string());
        state.snapshot.insert(key.to_string(), value.to_string());
        if let Err(err) = write_map(&self.path, &map) {
            warn!("failed to persist shared store {:?}: {err}", self.path);
        }
    }

    fn on_change(&self, handler: ChangeHandler) {
        self.state.lock().handler = Some(handler);
    }
}

/// Re-reads the store after a debounced event and fires the handler once per
/// key whose value differs from the snapshot. The handler runs without the
/// state lock held.
fn dispatch_changes(path: &Path, state: &Mutex<FileState>) {
    let next = read_map(path);
    let (mut handler, changed) = {
        let mut st = state.lock();
        let mut changed: Vec<(String, String)> = next
            .iter()
            .filter(|&(key, value)| st.snapshot.get(key.as_str()) != Some(value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        st.snapshot = next;
        if changed.is_empty() {
            return;
        }
        changed.sort();
        (st.handler.take(), changed)
    };
    if let Some(handler) = handler.as_mut() {
        for (key, value) in &changed {
            handler(key, value);
        }
    }
    if let Some(handler) = handler {
        state.lock().handler.get_or_insert(handler);
    }
}

fn read_map(path: &Path) -> HashMap<String, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                debug!("cannot read shared store {:?}: {err}", path);
            }
            return HashMap::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(map) => map,
        Err(err) => {
            warn!("malformed shared store {:?}, treating as empty: {err}", path);
            HashMap::default()
        }
    }
}

fn write_map(path: &Path, map: &HashMap<String, String>) -> io::Result<()> {
    let raw = serde_json::to_string(map).map_err(io::Error::other)?;
    write_atomic(path, &raw)
}

fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let tmp = path.with_extension(format!("{}.tmp", process::id()));
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let first = FileStore::new(&path).unwrap();
        first.set("count", "2");
        first.set("windows", "[]");
        drop(first);

        let second = FileStore::new(&path).unwrap();
        assert_eq!(second.get("count"), Some("2".to_string()));
        assert_eq!(second.get("windows"), Some("[]".to_string()));
        assert_eq!(second.get("missing"), None);
    }

    #[test]
    fn test_notifies_peer_but_not_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let writer = FileStore::new(&path).unwrap();
        let peer = FileStore::new(&path).unwrap();

        let (tx, rx) = mpsc::channel();
        peer.on_change(Box::new(move |key, value| {
            let _ = tx.send((key.to_string(), value.to_string()));
        }));

        writer.set("windows", "[7]");
        let (key, value) = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("peer should observe the write");
        assert_eq!(key, "windows");
        assert_eq!(value, "[7]");

        // The peer's own write must not come back at it.
        peer.set("windows", "[8]");
        assert!(rx.recv_timeout(Duration::from_millis(800)).is_err());
    }

    #[test]
    fn test_malformed_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "definitely not json").unwrap();

        let store = FileStore::new(&path).unwrap();
        assert_eq!(store.get("windows"), None);

        store.set("windows", "[]");
        assert_eq!(store.get("windows"), Some("[]".to_string()));
    }

    #[test]
    fn test_unreachable_path_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        fs::write(&blocker, "").unwrap();

        // Parent "directory" is a regular file, so the store cannot exist.
        let result = FileStore::new(blocker.join("store.json"));
        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
    }
}
