//! per-process window manager: registration, per-frame sync, notifications

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::host::HostWindow;
use crate::model::geometry::NestedReport;
use crate::model::registry::{Registry, WindowId, WindowRecord, registry_changed};
use crate::store::{KEY_COUNT, KEY_WINDOWS, SharedStore};

type Callback = Box<dyn FnMut() + Send>;

struct Inner {
    id: WindowId,
    record: WindowRecord,
    mirror: Registry,
    nested: NestedReport,
    on_shape_changed: Option<Callback>,
    on_registry_changed: Option<Callback>,
}

/// One process's view of the shared window registry.
///
/// Owns this process's identity and record, mirrors the registry locally,
/// and keeps both sides in sync: outbound by persisting geometry changes
/// every frame, inbound by applying peer writes delivered through the
/// store's change notifications.
pub struct WindowManager {
    store: Box<dyn SharedStore>,
    host: Box<dyn HostWindow>,
    inner: Arc<Mutex<Inner>>,
}

impl WindowManager {
    /// Registers this process in the shared registry and subscribes to peer
    /// changes.
    ///
    /// Identity comes from the shared counter: read, increment, write back.
    /// That cycle is not atomic across processes, so two processes
    /// initializing at nearly the same instant can allocate the same id.
    /// Known limitation, accepted rather than masked; see DESIGN.md.
    ///
    /// Each call allocates a fresh record by design: one process, one
    /// registration.
    pub fn init(store: Box<dyn SharedStore>, host: Box<dyn HostWindow>, meta: Value) -> Self {
        let mut mirror = match store.get(KEY_WINDOWS) {
            Some(raw) => Registry::parse(&raw),
            None => Registry::new(),
        };
        let count = match store.get(KEY_COUNT) {
            Some(raw) => raw.trim().parse::<u32>().unwrap_or_else(|err| {
                warn!("malformed identity counter {raw:?}, restarting at 0: {err}");
                0
            }),
            None => 0,
        };
        let count = count + 1;

        let id = WindowId::new(count);
        let record = WindowRecord { id, shape: host.shape(), meta };
        mirror.push(record.clone());

        store.set(KEY_COUNT, &count.to_string());
        store.set(KEY_WINDOWS, &mirror.serialize());
        debug!("registered window {id} ({} known)", mirror.len());

        let inner = Arc::new(Mutex::new(Inner {
            id,
            record,
            mirror,
            nested: NestedReport::default(),
            on_shape_changed: None,
            on_registry_changed: None,
        }));

        let notified = inner.clone();
        store.on_change(Box::new(move |key, value| {
            if key == KEY_WINDOWS {
                Self::apply_peer_registry(&notified, value);
            }
        }));

        WindowManager { store, host, inner }
    }

    /// Per-frame tick, driven by the external render loop.
    ///
    /// Compares the freshly queried geometry against the shape captured on
    /// the *previous* frame; on any difference it updates this record, fires
    /// `on_shape_changed`, and persists the mirror. The nested-shape
    /// analysis runs every frame regardless.
    pub fn update(&self) -> NestedReport {
        let fresh = self.host.shape();

        let mut callback = None;
        let mut persist = None;
        let report;
        {
            let mut inner = self.inner.lock();
            let previous = inner.record.shape;
            if fresh != previous {
                inner.record.shape = fresh;
                let id = inner.id;
                if inner.mirror.set_shape(id, fresh) {
                    persist = Some(inner.mirror.serialize());
                } else {
                    // A peer snapshot without our record was applied; the
                    // registry write is skipped and this change is dropped.
                    // The store catches up on the next real geometry change.
                    trace!("window {id} missing from mirror, skipping persist");
                }
                callback = inner.on_shape_changed.take();
            }
            report = NestedReport::analyze(&inner.mirror.shapes());
            inner.nested = report;
        }

        // Callbacks and store writes run unlocked so consumers can query the
        // manager from inside them.
        if let Some(mut cb) = callback {
            cb();
            self.inner.lock().on_shape_changed.get_or_insert(cb);
        }
        if let Some(raw) = persist {
            self.store.set(KEY_WINDOWS, &raw);
        }
        report
    }

    /// Removes this process's record from the shared registry. Best-effort:
    /// invoked on the termination signal, with no retry if the process dies
    /// before the write lands.
    pub fn teardown(&self) {
        let persist = {
            let mut inner = self.inner.lock();
            let id = inner.id;
            match inner.mirror.remove(id) {
                Some(_) => Some(inner.mirror.serialize()),
                None => {
                    debug!("window {id} already absent at teardown");
                    None
                }
            }
        };
        if let Some(raw) = persist {
            self.store.set(KEY_WINDOWS, &raw);
        }
    }

    /// Current registry snapshot, atomic per call. Callers should re-fetch
    /// every frame instead of caching indices; the registry can shrink
    /// between frames.
    pub fn windows(&self) -> Vec<WindowRecord> {
        self.inner.lock().mirror.records().to_vec()
    }

    pub fn id(&self) -> WindowId {
        self.inner.lock().id
    }

    pub fn this_window(&self) -> WindowRecord {
        self.inner.lock().record.clone()
    }

    /// Result of the most recent nested-shape pass.
    pub fn nested_report(&self) -> NestedReport {
        self.inner.lock().nested
    }

    /// Fired synchronously within `update()` when this process's own
    /// geometry changed.
    pub fn set_on_shape_changed(&self, callback: impl FnMut() + Send + 'static) {
        self.inner.lock().on_shape_changed = Some(Box::new(callback));
    }

    /// Fired synchronously within the change-notification handler when the
    /// window set plausibly changed.
    pub fn set_on_registry_changed(&self, callback: impl FnMut() + Send + 'static) {
        self.inner.lock().on_registry_changed = Some(Box::new(callback));
    }

    /// Runs on the store's notifying thread whenever a peer writes the
    /// registry key. The local mirror is replaced wholesale; there is no
    /// fine-grained merge.
    fn apply_peer_registry(inner: &Arc<Mutex<Inner>>, raw: &str) {
        let next = Registry::parse(raw);
        let callback = {
            let mut inner = inner.lock();
            let changed = registry_changed(&inner.mirror, &next);
            trace!(
                "peer registry applied: {} -> {} records, changed={changed}",
                inner.mirror.len(),
                next.len()
            );
            inner.mirror = next;
            if changed {
                inner.on_registry_changed.take()
            } else {
                None
            }
        };
        if let Some(mut cb) = callback {
            cb();
            inner.lock().on_registry_changed.get_or_insert(cb);
        }
    }
}
