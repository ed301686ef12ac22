//! Read-tracking scope.
//!
//! Dependency discovery works by running a computation once inside a trace
//! scope: every variable or container read while the scope is active records
//! itself here. The subscriptions a formula needs are derived from what was
//! recorded, so the author never lists dependencies by hand.
//!
//! # Implementation
//!
//! A thread-local stack tracks the currently tracing computation. Entering a
//! scope pushes a frame; reads record into the top frame; dropping the scope
//! guard pops it. The stack supports nesting (binding a formula from inside
//! another traced computation), and the guard restores the stack even if the
//! computation panics.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::deps::DependencySource;
use crate::notify::SourceId;

thread_local! {
    static TRACE_STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// One tracing frame: the sources read so far, deduped by source id and kept
/// in first-read order.
struct Frame {
    sources: IndexMap<SourceId, Arc<dyn DependencySource>>,
}

/// Guard that pops the tracing frame when dropped.
pub struct TraceScope {
    _private: (),
}

impl TraceScope {
    /// Begin tracing reads on the current thread.
    ///
    /// The scope ends when the returned guard is dropped.
    pub fn enter() -> Self {
        TRACE_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                sources: IndexMap::new(),
            });
        });
        Self { _private: () }
    }

    /// Check whether a trace scope is active on this thread.
    pub fn is_active() -> bool {
        TRACE_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Record a dependency source into the innermost scope.
    ///
    /// Called by variables and containers when they are read. A source that
    /// was already recorded in this scope is ignored.
    pub fn record(source: Arc<dyn DependencySource>) {
        TRACE_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                frame.sources.entry(source.source_id()).or_insert(source);
            }
        });
    }

    /// Clone out the sources recorded so far in the innermost scope.
    pub fn sources() -> Vec<Arc<dyn DependencySource>> {
        TRACE_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|frame| frame.sources.values().cloned().collect())
                .unwrap_or_default()
        })
    }
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        TRACE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(popped.is_some(), "TraceScope stack underflow");
        });
    }
}
