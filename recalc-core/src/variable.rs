//! Variable implementation.
//!
//! A `Variable` is the fundamental primitive: a mutable cell that notifies
//! its listeners when the stored value actually changes.
//!
//! # How writes propagate
//!
//! 1. `set` compares the new value with the current one; equal writes are
//!    dropped so cascades only fire on real change.
//!
//! 2. Listeners run synchronously, in registration order, before `set`
//!    returns. A listener may itself write other variables, driving the
//!    whole dependent cascade depth-first.
//!
//! 3. While a variable is notifying, further writes to that same variable
//!    are silently ignored. This is what lets two formulas defined in terms
//!    of each other settle instead of recursing forever; it is not a general
//!    cycle detector.
//!
//! # Sharing
//!
//! Cloning a `Variable` yields a handle to the same cell: value, listeners
//! and the reentrancy flag are all shared.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::deps::DependencySource;
use crate::listener::{Listener, ListenerId};
use crate::notify::{ChangeNotifier, SourceId};
use crate::trace::TraceScope;

/// A mutable cell with change notification.
///
/// # Example
///
/// ```rust,ignore
/// let count = Variable::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies listeners)
/// count.set(5);
/// ```
pub struct Variable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Optional diagnostic name, shown by `Debug`.
    name: Option<Arc<str>>,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Listener registry, shared with the dependency machinery.
    notifier: Arc<ChangeNotifier>,

    /// Reentrancy flag: true while this cell's listeners are running.
    notifying: Arc<AtomicBool>,
}

/// Clears the notifying flag when dropped, so a panicking listener does not
/// leave the cell permanently muted.
struct NotifyGuard<'a>(&'a AtomicBool);

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<T> Variable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new variable with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            name: None,
            value: Arc::new(RwLock::new(value)),
            notifier: Arc::new(ChangeNotifier::new()),
            notifying: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a new variable with a diagnostic name.
    pub fn named(value: T, name: impl Into<Arc<str>>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(value)
        }
    }

    /// Get the variable's source id.
    pub fn id(&self) -> SourceId {
        self.notifier.id()
    }

    /// Get the diagnostic name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get the current value.
    ///
    /// If called while dependency tracing is active, the variable records
    /// itself as a dependency of the traced computation.
    pub fn get(&self) -> T {
        if TraceScope::is_active() {
            TraceScope::record(Arc::new(self.clone()));
        }
        self.value.read().clone()
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value and notify listeners.
    ///
    /// This is a no-op when the new value equals the current one, or when
    /// the write arrives from within this variable's own notification chain.
    pub fn set(&self, value: T) {
        if self.notifying.load(Ordering::SeqCst) {
            return;
        }
        if *self.value.read() == value {
            return;
        }

        self.notifying.store(true, Ordering::SeqCst);
        let _guard = NotifyGuard(&self.notifying);

        *self.value.write() = value;
        // The value lock is released before listeners run: callbacks read
        // and write variables freely, including this one (blocked only by
        // the notifying flag).
        self.notifier.notify();
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.value.read());
        self.set(new_value);
    }

    /// Register a change listener.
    pub fn add_listener(&self, listener: Listener) {
        self.notifier.add_listener(listener);
    }

    /// Remove a change listener by identity. Unknown ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) {
        self.notifier.remove_listener(id);
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.notifier.listener_count()
    }
}

impl<T> DependencySource for Variable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn source_id(&self) -> SourceId {
        self.notifier.id()
    }

    fn attach(&self, listener: &Listener) {
        self.notifier.add_listener(listener.clone());
    }

    fn detach(&self, listener: ListenerId) {
        self.notifier.remove_listener(listener);
    }
}

impl<T> Default for Variable<T>
where
    T: Clone + PartialEq + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Clone for Variable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            value: Arc::clone(&self.value),
            notifier: Arc::clone(&self.notifier),
            notifying: Arc::clone(&self.notifying),
        }
    }
}

impl<T> Debug for Variable<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} = {:?}", name, self.get_untracked()),
            None => f
                .debug_struct("Variable")
                .field("id", &self.id())
                .field("value", &self.get_untracked())
                .finish(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn variable_get_and_set() {
        let variable = Variable::new(0);
        assert_eq!(variable.get(), 0);

        variable.set(42);
        assert_eq!(variable.get(), 42);
    }

    #[test]
    fn variable_update() {
        let variable = Variable::new(10);
        variable.update(|v| v + 5);
        assert_eq!(variable.get(), 15);
    }

    #[test]
    fn variable_notifies_listeners() {
        let variable = Variable::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        variable.add_listener(Listener::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        variable.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        variable.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn equal_write_is_a_noop() {
        let variable = Variable::new(7);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        variable.add_listener(Listener::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        variable.set(7);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn nan_write_counts_as_changed() {
        let variable = Variable::new(f64::NAN);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        variable.add_listener(Listener::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        // NaN != NaN, so the write goes through rather than erroring out.
        variable.set(f64::NAN);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_write_to_same_variable_is_ignored() {
        let variable = Variable::new(0);

        let inner = variable.clone();
        variable.add_listener(Listener::new(move || {
            inner.set(99);
        }));

        variable.set(1);
        assert_eq!(variable.get(), 1);
    }

    #[test]
    fn panicking_listener_propagates_and_does_not_wedge_the_cell() {
        let variable = Variable::new(0);

        let listener = Listener::new(|| panic!("listener failure"));
        let id = listener.id();
        variable.add_listener(listener);

        // The panic reaches the writer...
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            variable.set(1);
        }));
        assert!(result.is_err());
        assert_eq!(variable.get(), 1);

        // ...and the notifying flag was reset on unwind, so the cell still
        // accepts writes.
        variable.remove_listener(id);
        variable.set(2);
        assert_eq!(variable.get(), 2);
    }

    #[test]
    fn listener_removal_stops_notification() {
        let variable = Variable::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let listener = Listener::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        let id = listener.id();
        variable.add_listener(listener);

        variable.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        variable.remove_listener(id);
        variable.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn variable_clone_shares_state() {
        let variable1 = Variable::new(0);
        let variable2 = variable1.clone();

        variable1.set(42);
        assert_eq!(variable2.get(), 42);

        variable2.set(100);
        assert_eq!(variable1.get(), 100);
    }

    #[test]
    fn variable_ids_are_unique() {
        let v1: Variable<i32> = Variable::new(0);
        let v2: Variable<i32> = Variable::new(0);
        assert_ne!(v1.id(), v2.id());
    }

    #[test]
    fn named_variable_debug_output() {
        let variable = Variable::named(3, "sum");
        assert_eq!(format!("{:?}", variable), "sum = 3");
    }
}
