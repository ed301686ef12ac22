//! Observable container of variables.
//!
//! A `VarList` is a sequence of variables whose *membership* can change at
//! runtime. A formula that aggregates over the list depends on two kinds of
//! event: a member's value changing, and the membership itself changing.
//! The list raises the second kind through membership handlers that receive
//! the added and removed members.
//!
//! # Tracked reads
//!
//! The value accessors (`values`, `get`, `len`, `is_empty`) record the list
//! itself as a dependency and read member values untracked. Attaching to the
//! list then covers the membership event plus every current member, so a
//! member is never subscribed twice through one list.
//!
//! When the membership changes under an attached listener, the handler
//! unsubscribes removed members, subscribes added ones, and fires the
//! listener once: the membership change is itself a dependency-relevant
//! event. The same variable may be a member more than once; removing one
//! occurrence keeps the subscription alive until the last occurrence is
//! gone.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::trace;

use crate::deps::DependencySource;
use crate::listener::{Listener, ListenerId};
use crate::notify::SourceId;
use crate::variable::Variable;

/// Callback invoked with the members added and removed by one mutation.
type MembershipHandler<T> = Arc<dyn Fn(&[Variable<T>], &[Variable<T>]) + Send + Sync>;

/// A dynamically mutable collection of variables with membership
/// notification.
///
/// Clones share the same underlying list.
pub struct VarList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    id: SourceId,
    members: Arc<RwLock<Vec<Variable<T>>>>,
    handlers: Arc<RwLock<IndexMap<ListenerId, MembershipHandler<T>>>>,
}

impl<T> VarList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            id: SourceId::new(),
            members: Arc::new(RwLock::new(Vec::new())),
            handlers: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Get the list's source id.
    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Append a variable and raise a membership notification.
    pub fn push(&self, member: Variable<T>) {
        self.members.write().push(member.clone());
        trace!(list = ?self.id, "member added");
        self.notify_membership(&[member], &[]);
    }

    /// Remove the variable at `index` and raise a membership notification.
    ///
    /// Returns the removed variable, or `None` when out of bounds.
    pub fn remove(&self, index: usize) -> Option<Variable<T>> {
        let removed = {
            let mut members = self.members.write();
            if index >= members.len() {
                return None;
            }
            members.remove(index)
        };
        trace!(list = ?self.id, "member removed");
        self.notify_membership(&[], &[removed.clone()]);
        Some(removed)
    }

    /// Remove the given variable (matched by cell identity) if present.
    pub fn remove_member(&self, member: &Variable<T>) -> bool {
        let index = {
            let members = self.members.read();
            members.iter().position(|m| m.id() == member.id())
        };
        match index {
            Some(index) => self.remove(index).is_some(),
            None => false,
        }
    }

    /// Current member values, as a tracked read.
    pub fn values(&self) -> Vec<T> {
        self.record_read();
        self.members
            .read()
            .iter()
            .map(Variable::get_untracked)
            .collect()
    }

    /// Value of the member at `index`, as a tracked read.
    pub fn get(&self, index: usize) -> Option<T> {
        self.record_read();
        self.members
            .read()
            .get(index)
            .map(Variable::get_untracked)
    }

    /// Number of members, as a tracked read.
    pub fn len(&self) -> usize {
        self.record_read();
        self.members.read().len()
    }

    /// Whether the list is empty, as a tracked read.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles to the current members. Not a tracked read.
    pub fn members(&self) -> Vec<Variable<T>> {
        self.members.read().clone()
    }

    fn record_read(&self) {
        if crate::trace::TraceScope::is_active() {
            crate::trace::TraceScope::record(Arc::new(self.clone()));
        }
    }

    fn notify_membership(&self, added: &[Variable<T>], removed: &[Variable<T>]) {
        // Snapshot: a handler's cascade may attach or detach formulas on
        // this same list.
        let snapshot: SmallVec<[MembershipHandler<T>; 2]> =
            self.handlers.read().values().cloned().collect();
        for handler in snapshot {
            handler(added, removed);
        }
    }

    #[cfg(test)]
    fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl<T> DependencySource for VarList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn attach(&self, listener: &Listener) {
        // Keep member subscriptions aligned with membership, then fire: the
        // membership change itself must recompute dependent formulas.
        let forwarded = listener.clone();
        let members = Arc::clone(&self.members);
        let handler: MembershipHandler<T> = Arc::new(move |added, removed| {
            for member in removed {
                // The same variable may occur in the list more than once;
                // the subscription goes only when the last occurrence does.
                let still_present = members
                    .read()
                    .iter()
                    .any(|m| m.id() == member.id());
                if !still_present {
                    member.remove_listener(forwarded.id());
                }
            }
            for member in added {
                member.add_listener(forwarded.clone());
            }
            forwarded.invoke();
        });
        self.handlers.write().insert(listener.id(), handler);

        for member in self.members.read().iter() {
            member.add_listener(listener.clone());
        }
    }

    fn detach(&self, listener: ListenerId) {
        // Release the membership handler and the *live* member set: members
        // added since attach are covered, members removed since are not.
        self.handlers.write().shift_remove(&listener);
        for member in self.members.read().iter() {
            member.remove_listener(listener);
        }
    }
}

impl<T> Default for VarList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for VarList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            members: Arc::clone(&self.members),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<T> FromIterator<Variable<T>> for VarList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = Variable<T>>>(iter: I) -> Self {
        let list = Self::new();
        list.members.write().extend(iter);
        list
    }
}

impl<T> std::fmt::Debug for VarList<T>
where
    T: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarList")
            .field("id", &self.id)
            .field("members", &self.members.read())
            .finish()
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
    fn push_and_remove_report_values() {
        let list: VarList<i32> = [Variable::new(1), Variable::new(2)]
            .into_iter()
            .collect();

        assert_eq!(list.values(), vec![1, 2]);

        list.push(Variable::new(3));
        assert_eq!(list.values(), vec![1, 2, 3]);

        let removed = list.remove(0).unwrap();
        assert_eq!(removed.get_untracked(), 1);
        assert_eq!(list.values(), vec![2, 3]);

        assert!(list.remove(5).is_none());
    }

    #[test]
    fn remove_member_matches_by_identity() {
        let a = Variable::new(1);
        let b = Variable::new(1);
        let list: VarList<i32> = [a.clone(), b.clone()].into_iter().collect();

        assert!(list.remove_member(&b));
        assert_eq!(list.len(), 1);
        assert_eq!(list.members()[0].id(), a.id());

        assert!(!list.remove_member(&b));
    }

    #[test]
    fn attach_subscribes_current_members_and_membership() {
        let a = Variable::new(1);
        let b = Variable::new(2);
        let list: VarList<i32> = [a.clone(), b.clone()].into_iter().collect();

        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let listener = Listener::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        list.attach(&listener);
        assert_eq!(a.listener_count(), 1);
        assert_eq!(b.listener_count(), 1);
        assert_eq!(list.handler_count(), 1);

        a.set(10);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The membership change fires the listener once by itself.
        let c = Variable::new(3);
        list.push(c.clone());
        assert_eq!(count.load(Ordering::SeqCst), 2);

        // ... and the new member is now a live subscription.
        c.set(30);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn removed_members_stop_notifying() {
        let a = Variable::new(1);
        let list: VarList<i32> = [a.clone()].into_iter().collect();

        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let listener = Listener::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        list.attach(&listener);
        list.remove(0);
        let after_removal = count.load(Ordering::SeqCst);

        a.set(100);
        assert_eq!(count.load(Ordering::SeqCst), after_removal);
        assert_eq!(a.listener_count(), 0);
    }

    #[test]
    fn duplicate_member_stays_subscribed_until_last_occurrence_goes() {
        let a = Variable::new(1);
        let list: VarList<i32> = [a.clone(), a.clone()].into_iter().collect();

        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let listener = Listener::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        list.attach(&listener);
        assert_eq!(a.listener_count(), 1);

        // One occurrence remains, so the member still notifies.
        list.remove(0);
        let after_first_removal = count.load(Ordering::SeqCst);
        a.set(10);
        assert_eq!(count.load(Ordering::SeqCst), after_first_removal + 1);

        // Removing the last occurrence drops the subscription.
        list.remove(0);
        let after_second_removal = count.load(Ordering::SeqCst);
        a.set(20);
        assert_eq!(count.load(Ordering::SeqCst), after_second_removal);
        assert_eq!(a.listener_count(), 0);
    }

    #[test]
    fn detach_releases_the_live_member_set() {
        let a = Variable::new(1);
        let list: VarList<i32> = [a.clone()].into_iter().collect();

        let listener = Listener::new(|| {});
        list.attach(&listener);

        // b joins after attach; detach must still release it.
        let b = Variable::new(2);
        list.push(b.clone());
        assert_eq!(b.listener_count(), 1);

        list.detach(listener.id());
        assert_eq!(a.listener_count(), 0);
        assert_eq!(b.listener_count(), 0);
        assert_eq!(list.handler_count(), 0);
    }

    #[test]
    fn detach_removes_the_membership_handler() {
        let list: VarList<i32> = VarList::new();

        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let listener = Listener::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        list.attach(&listener);
        list.detach(listener.id());

        list.push(Variable::new(1));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tracked_reads_record_the_list_not_the_members() {
        use crate::deps::DependencySet;

        let list: VarList<i32> = [Variable::new(4), Variable::new(9)]
            .into_iter()
            .collect();

        let (max, deps) =
            DependencySet::trace(|| list.values().into_iter().max().unwrap_or(0));
        assert_eq!(max, 9);
        assert_eq!(deps.len(), 1);
    }
}
