//! Change notification registry.
//!
//! A `ChangeNotifier` is the shared heart of every dependency source: an
//! insertion-ordered, duplicate-free set of listeners. Variables and
//! containers hold one behind an `Arc`, and the dependency machinery works
//! against the notifier without knowing the value type it guards.
//!
//! # Ordering and snapshots
//!
//! Listeners fire in registration order. Notification iterates over a
//! snapshot taken before the first callback runs, so a listener removed by
//! an earlier callback in the same pass still fires: disposal silences
//! future notifications, never an in-flight cascade.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::listener::{Listener, ListenerId};

/// Unique identifier for a dependency source (a variable or a container).
///
/// Dependency tracing dedupes by this id: a source read several times in one
/// computation is still subscribed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    /// Generate a new unique source ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Insertion-ordered listener registry for one dependency source.
pub struct ChangeNotifier {
    id: SourceId,
    listeners: RwLock<IndexMap<ListenerId, Listener>>,
}

impl ChangeNotifier {
    /// Create an empty registry with a fresh source id.
    pub fn new() -> Self {
        Self {
            id: SourceId::new(),
            listeners: RwLock::new(IndexMap::new()),
        }
    }

    /// Get the id of the source this registry belongs to.
    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Register a listener.
    ///
    /// Re-adding a listener that is already registered is a no-op; the
    /// original registration keeps its position in the firing order.
    pub fn add_listener(&self, listener: Listener) {
        let mut listeners = self.listeners.write();
        listeners.entry(listener.id()).or_insert(listener);
    }

    /// Remove a listener by identity. Unknown ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.write().shift_remove(&id);
    }

    /// Invoke every registered listener, in registration order.
    pub fn notify(&self) {
        // Snapshot first: callbacks may add or remove listeners on this very
        // registry (e.g. a cascade that disposes a formula).
        let snapshot: SmallVec<[Listener; 4]> =
            self.listeners.read().values().cloned().collect();
        for listener in snapshot {
            listener.invoke();
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether the given listener is currently registered.
    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.read().contains_key(&id)
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("id", &self.id)
            .field("listener_count", &self.listener_count())
            .finish()
    }
}
