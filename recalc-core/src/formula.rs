//! Formula implementation.
//!
//! A `Formula` keeps a target variable equal to a computation over other
//! variables. Binding runs the computation once under dependency tracing,
//! subscribes an internal recompute listener to everything the computation
//! read, and seeds the target. From then on every upstream change
//! re-evaluates the computation and writes the result through the target's
//! normal setter, so downstream formulas cascade only when the value
//! actually differs.
//!
//! # Lifecycle
//!
//! Unbound → Bound → Disposed. Disposal is explicit and idempotent; it
//! detaches every subscription, after which the target is static. Dropping
//! a `Formula` handle does *not* dispose: the subscriptions live in the
//! source variables, so a discarded handle leaves the binding active.
//!
//! # Failure
//!
//! A panicking computation propagates to whoever triggered the write. The
//! engine does not catch, retry, or tear down subscriptions on the way out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::deps::DependencySet;
use crate::listener::Listener;
use crate::variable::Variable;

/// A one-way binding from a computation to a target variable.
///
/// # Example
///
/// ```rust,ignore
/// let a = Variable::new(2);
/// let b = Variable::new(3);
/// let sum = Variable::new(0);
///
/// let formula = sum.set_formula({
///     let (a, b) = (a.clone(), b.clone());
///     move || a.get() + b.get()
/// });
///
/// a.set(10);
/// assert_eq!(sum.get(), 13);
///
/// formula.dispose();
/// ```
pub struct Formula<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    target: Variable<T>,
    deps: Arc<DependencySet>,
    listener: Listener,
    disposed: Arc<AtomicBool>,
}

impl<T> Formula<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Bind `compute` to `target`.
    ///
    /// Discovers dependencies with one traced trial evaluation, subscribes
    /// to all of them, then seeds the target with the trial result.
    pub fn bind<F>(target: Variable<T>, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let compute: Arc<dyn Fn() -> T + Send + Sync> = Arc::new(compute);

        let (initial, deps) = DependencySet::trace(|| compute());

        let listener = {
            let target = target.clone();
            let compute = Arc::clone(&compute);
            Listener::new(move || {
                trace!("recomputing formula");
                target.set(compute());
            })
        };

        deps.attach_all(&listener);
        debug!(dependencies = deps.len(), "formula bound");

        // Seed through the normal setter so dependents of the target see
        // the initial value like any other change.
        target.set(initial);

        Self {
            target,
            deps: Arc::new(deps),
            listener,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The variable this formula writes.
    pub fn target(&self) -> &Variable<T> {
        &self.target
    }

    /// Number of dependency sources discovered at bind time.
    pub fn dependency_count(&self) -> usize {
        self.deps.len()
    }

    /// Detach the formula from all of its dependencies.
    ///
    /// Idempotent. After disposal the target variable is no longer updated
    /// by this formula; external writes to it go unintercepted.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.deps.detach_all(self.listener.id());
        debug!(dependencies = self.deps.len(), "formula disposed");
    }

    /// Check whether the formula has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<T> Clone for Formula<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            deps: Arc::clone(&self.deps),
            listener: self.listener.clone(),
            disposed: Arc::clone(&self.disposed),
        }
    }
}

impl<T> std::fmt::Debug for Formula<T>
where
    T: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Formula")
            .field("target", &self.target)
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Bind a computation to a target variable, returning the disposal handle.
///
/// Free-function form of [`Formula::bind`] for consumers that adapt the
/// engine behind their own property layer.
pub fn bind_formula<T, F>(target: &Variable<T>, compute: F) -> Formula<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Formula::bind(target.clone(), compute)
}

impl<T> Variable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Bind a computation to this variable; it recomputes on every change
    /// of a variable or container the computation reads.
    pub fn set_formula<F>(&self, compute: F) -> Formula<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Formula::bind(self.clone(), compute)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
