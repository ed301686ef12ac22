//! Dependency discovery.
//!
//! `DependencySet::trace` runs a computation once inside a [`TraceScope`]
//! and captures every source it read. The set is what a formula subscribes
//! through at bind time and detaches through at disposal, so subscribe and
//! unsubscribe always cover exactly the same sources.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::listener::{Listener, ListenerId};
use crate::notify::SourceId;
use crate::trace::TraceScope;

/// A source a computation can depend on: a single variable or a dynamic
/// container of variables.
///
/// Implementations own the full subscription story for their kind. For a
/// variable that is one listener registration; for a container it is the
/// membership handler plus a registration on every current member, and
/// `detach` must release whatever the membership is *now*, not what it was
/// at attach time.
pub trait DependencySource: Send + Sync {
    /// Stable identity used to dedupe repeated reads of the same source.
    fn source_id(&self) -> SourceId;

    /// Subscribe the listener to change notifications from this source.
    fn attach(&self, listener: &Listener);

    /// Reverse `attach` for the given listener identity.
    fn detach(&self, listener: ListenerId);
}

/// The sources one traced computation reads, in first-read order.
pub struct DependencySet {
    sources: SmallVec<[Arc<dyn DependencySource>; 4]>,
}

impl DependencySet {
    /// Run `compute` once under a trace scope and collect what it reads.
    ///
    /// Returns the computed value together with the discovered set, so the
    /// trial evaluation doubles as the initial evaluation.
    pub fn trace<T, F>(compute: F) -> (T, DependencySet)
    where
        F: FnOnce() -> T,
    {
        let scope = TraceScope::enter();
        let value = compute();
        let sources = TraceScope::sources().into();
        drop(scope);
        (value, DependencySet { sources })
    }

    /// Subscribe `listener` to every source in the set.
    pub fn attach_all(&self, listener: &Listener) {
        for source in &self.sources {
            source.attach(listener);
        }
    }

    /// Unsubscribe the listener from every source in the set.
    pub fn detach_all(&self, listener: ListenerId) {
        for source in &self.sources {
            source.detach(listener);
        }
    }

    /// Number of distinct sources discovered.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the computation read no sources at all.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for DependencySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencySet")
            .field("len", &self.len())
            .finish()
    }
}
