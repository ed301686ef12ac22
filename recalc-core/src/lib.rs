//! Recalc Core
//!
//! This crate implements a reactive dependency-tracking engine: a consumer
//! declares a computed value (a formula) as a pure function over mutable
//! values (variables), and the engine keeps the computed value in sync
//! whenever any variable the function reads changes.
//!
//! # Concepts
//!
//! ## Variables
//!
//! A [`Variable`] is a mutable cell with change notification. Writes that do
//! not change the value are dropped, and a write arriving from inside the
//! variable's own notification chain is ignored, which lets mutually defined
//! formulas settle.
//!
//! ## Dependency discovery
//!
//! Reading a variable while a computation is being traced records it as a
//! dependency, so the author never lists dependencies by hand. Variables
//! reached through a [`VarList`] are covered by the list's own membership
//! tracking: members added later start triggering recomputation, members
//! removed stop.
//!
//! ## Formulas
//!
//! A [`Formula`] binds a computation to a target variable. It evaluates once
//! at bind time and re-evaluates synchronously on every upstream change,
//! cascading through dependent formulas before the original write returns.
//! Disposing the formula reverses every subscription it holds.
//!
//! # Example
//!
//! ```rust,ignore
//! use recalc_core::Variable;
//!
//! let argument1 = Variable::new(2);
//! let argument2 = Variable::new(3);
//! let sum = Variable::new(0);
//!
//! let formula = sum.set_formula({
//!     let (a, b) = (argument1.clone(), argument2.clone());
//!     move || a.get() + b.get()
//! });
//!
//! argument1.set(10);
//! assert_eq!(sum.get(), 13);
//!
//! formula.dispose();
//! argument2.set(100);
//! assert_eq!(sum.get(), 13);
//! ```
//!
//! # Execution model
//!
//! Single-threaded, synchronous, cooperative: a write drives the entire
//! dependent cascade depth-first, in listener registration order, before
//! `set` returns. The engine has no defense against a multi-hop cycle
//! through distinct variables beyond each variable's own reentrancy guard;
//! avoiding such cycles is the caller's responsibility.

mod deps;
mod formula;
mod list;
mod listener;
mod notify;
mod trace;
mod variable;

pub use deps::{DependencySet, DependencySource};
pub use formula::{bind_formula, Formula};
pub use list::VarList;
pub use listener::{Listener, ListenerId};
pub use notify::{ChangeNotifier, SourceId};
pub use trace::TraceScope;
pub use variable::Variable;
