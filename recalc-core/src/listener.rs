//! Listener handles for change notification.
//!
//! A `Listener` is a callback plus an identity. Variables and containers keep
//! their listeners keyed by `ListenerId`, which is what makes removal by
//! identity and duplicate suppression possible.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a registered listener.
///
/// A formula uses one id for every subscription it holds, so detaching the
/// formula is a matter of removing that id everywhere it appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A change-notification callback with identity.
///
/// Cloning a `Listener` yields a handle to the same callback with the same
/// id; registries treat all clones as one registration.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    notify: Arc<dyn Fn() + Send + Sync>,
}

impl Listener {
    /// Create a new listener with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::new(),
            notify: Arc::new(notify),
        }
    }

    /// Get the listener's unique ID.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invoke the callback.
    pub fn invoke(&self) {
        (self.notify)();
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}
