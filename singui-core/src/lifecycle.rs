//! Lifecycle Registry
//!
//! Every node the builder knows about can carry four hook sets, one per
//! transition: before/after attach and before/after detach.
//!
//! # How Transitions Fire
//!
//! [`Lifecycle::attach_with`] runs the "before" hooks, performs the tree
//! mutation, then runs the "after" hooks. Both sets run even when empty. If
//! the mutation fails, the "after" hooks are skipped and the error is
//! returned as is.
//!
//! # Ownership
//!
//! [`LifecycleRegistry`] keys records by node handle and creates them on
//! first lookup. Records live until [`LifecycleRegistry::release`] is
//! called for the node, which also tears down the node's bindings.
//!
//! # Cascading
//!
//! A lifecycle can forward its transitions to another one
//! ([`Lifecycle::forward_to`]). The builder links every element and region
//! to the context it was created in, so detaching a region detaches
//! everything built inside it. The registry also remembers which region
//! stores were created under which node, so releasing a subtree can reach
//! stores that are not part of the tree.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexSet;

use tracing::{debug, trace};

use crate::bind::BindingTable;
use crate::reactive::{Disconnect, HookSet};

/// A lifecycle transition point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    BeforeAttach,
    AfterAttach,
    BeforeDetach,
    AfterDetach,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::BeforeAttach,
        Phase::AfterAttach,
        Phase::BeforeDetach,
        Phase::AfterDetach,
    ];
}

/// The four hook sets of one node.
///
/// Hook sets persist across any number of attach/detach cycles.
#[derive(Default)]
pub struct Lifecycle {
    before_attach: HookSet<()>,
    after_attach: HookSet<()>,
    before_detach: HookSet<()>,
    after_detach: HookSet<()>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The hook set for `phase`.
    pub fn hooks(&self, phase: Phase) -> &HookSet<()> {
        match phase {
            Phase::BeforeAttach => &self.before_attach,
            Phase::AfterAttach => &self.after_attach,
            Phase::BeforeDetach => &self.before_detach,
            Phase::AfterDetach => &self.after_detach,
        }
    }

    pub fn before_attach(&self) -> &HookSet<()> {
        &self.before_attach
    }

    pub fn after_attach(&self) -> &HookSet<()> {
        &self.after_attach
    }

    pub fn before_detach(&self) -> &HookSet<()> {
        &self.before_detach
    }

    pub fn after_detach(&self) -> &HookSet<()> {
        &self.after_detach
    }

    /// Register `hook` for `phase`.
    pub fn on<F>(&self, phase: Phase, hook: F) -> Disconnect
    where
        F: Fn() + 'static,
    {
        self.hooks(phase).add(move |_: &()| hook())
    }

    /// Run the hooks of `phase`.
    pub fn run(&self, phase: Phase) {
        trace!(?phase, hooks = self.hooks(phase).len(), "running lifecycle hooks");
        self.hooks(phase).run(&());
    }

    /// Run `mutate` between the attach hooks.
    pub fn attach_with<T, E>(&self, mutate: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        self.transition(Phase::BeforeAttach, Phase::AfterAttach, mutate)
    }

    /// Run `mutate` between the detach hooks.
    pub fn detach_with<T, E>(&self, mutate: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        self.transition(Phase::BeforeDetach, Phase::AfterDetach, mutate)
    }

    fn transition<T, E>(
        &self,
        before: Phase,
        after: Phase,
        mutate: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        self.run(before);
        let out = mutate()?;
        self.run(after);
        Ok(out)
    }

    /// Run every transition of `self` on `child` as well, until the
    /// returned handle is disconnected. `child` is held weakly.
    pub fn forward_to(&self, child: &Rc<Lifecycle>) -> Disconnect {
        if std::ptr::eq(self, Rc::as_ptr(child)) {
            return Disconnect::noop();
        }
        Disconnect::all(Phase::ALL.map(|phase| {
            let child = Rc::downgrade(child);
            self.on(phase, move || {
                if let Some(child) = child.upgrade() {
                    child.run(phase);
                }
            })
        }))
    }

    /// Drop every registered hook.
    pub fn clear(&self) {
        self.before_attach.clear();
        self.after_attach.clear();
        self.before_detach.clear();
        self.after_detach.clear();
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("before_attach", &self.before_attach.len())
            .field("after_attach", &self.after_attach.len())
            .field("before_detach", &self.before_detach.len())
            .field("after_detach", &self.after_detach.len())
            .finish()
    }
}

/// Everything the builder tracks for one node.
#[derive(Debug, Clone, Default)]
pub struct NodeRecord {
    pub lifecycle: Rc<Lifecycle>,
    pub bindings: Rc<BindingTable>,
}

/// Node-keyed table of [`NodeRecord`]s.
pub struct LifecycleRegistry<N> {
    records: RefCell<HashMap<N, NodeRecord>>,
    owned: RefCell<HashMap<N, IndexSet<N>>>,
    owners: RefCell<HashMap<N, N>>,
}

impl<N> LifecycleRegistry<N>
where
    N: Clone + Eq + Hash + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            records: RefCell::new(HashMap::new()),
            owned: RefCell::new(HashMap::new()),
            owners: RefCell::new(HashMap::new()),
        }
    }

    /// The record for `node`, created if absent.
    pub fn record(&self, node: &N) -> NodeRecord {
        self.records
            .borrow_mut()
            .entry(node.clone())
            .or_default()
            .clone()
    }

    pub fn lifecycle(&self, node: &N) -> Rc<Lifecycle> {
        self.record(node).lifecycle
    }

    pub fn bindings(&self, node: &N) -> Rc<BindingTable> {
        self.record(node).bindings
    }

    /// The record for `node` if one was created.
    pub fn get(&self, node: &N) -> Option<NodeRecord> {
        self.records.borrow().get(node).cloned()
    }

    pub fn contains(&self, node: &N) -> bool {
        self.records.borrow().contains_key(node)
    }

    /// Forget `node`: disconnect its bindings and drop its hooks.
    ///
    /// Returns whether a record existed. Handles to the lifecycle obtained
    /// earlier stay usable but are no longer reachable from the registry.
    pub fn release(&self, node: &N) -> bool {
        let removed = self.records.borrow_mut().remove(node);
        let Some(record) = removed else {
            return false;
        };
        debug!(?node, bindings = record.bindings.len(), "releasing node");
        record.bindings.clear();
        record.lifecycle.clear();
        true
    }

    /// Record that `store` was created under `owner`.
    pub fn own(&self, owner: &N, store: &N) {
        self.owned
            .borrow_mut()
            .entry(owner.clone())
            .or_default()
            .insert(store.clone());
        self.owners.borrow_mut().insert(store.clone(), owner.clone());
    }

    /// Take the stores owned by `node` and detach `node` from its own owner.
    pub fn disown(&self, node: &N) -> Vec<N> {
        if let Some(owner) = self.owners.borrow_mut().remove(node) {
            let mut owned = self.owned.borrow_mut();
            if let Some(siblings) = owned.get_mut(&owner) {
                siblings.shift_remove(node);
                if siblings.is_empty() {
                    owned.remove(&owner);
                }
            }
        }
        let stores = self.owned.borrow_mut().remove(node).unwrap_or_default();
        for store in &stores {
            self.owners.borrow_mut().remove(store);
        }
        stores.into_iter().collect()
    }

    /// Number of stores recorded under `owner`.
    pub fn owned_count(&self, owner: &N) -> usize {
        self.owned.borrow().get(owner).map_or(0, IndexSet::len)
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl<N> Default for LifecycleRegistry<N>
where
    N: Clone + Eq + Hash + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<N> fmt::Debug for LifecycleRegistry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleRegistry")
            .field("records", &self.records.borrow().len())
            .field("owners", &self.owned.borrow().len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, entry: &'static str) -> impl Fn() + 'static {
        let log = log.clone();
        move || log.borrow_mut().push(entry)
    }

    #[test]
    fn attach_runs_hooks_around_the_mutation() {
        let lc = Lifecycle::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        lc.on(Phase::BeforeAttach, recorder(&log, "before"));
        lc.on(Phase::AfterAttach, recorder(&log, "after"));

        let inner = log.clone();
        let out: Result<u8, ()> = lc.attach_with(|| {
            inner.borrow_mut().push("mutate");
            Ok(7)
        });

        assert_eq!(out, Ok(7));
        assert_eq!(*log.borrow(), vec!["before", "mutate", "after"]);
    }

    #[test]
    fn failed_mutation_skips_after_hooks() {
        let lc = Lifecycle::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        lc.on(Phase::BeforeDetach, recorder(&log, "before"));
        lc.on(Phase::AfterDetach, recorder(&log, "after"));

        let out: Result<(), &str> = lc.detach_with(|| Err("backend"));

        assert_eq!(out, Err("backend"));
        assert_eq!(*log.borrow(), vec!["before"]);
    }

    #[test]
    fn empty_transitions_are_fine() {
        let lc = Lifecycle::new();
        let ran = Cell::new(false);
        let out: Result<(), ()> = lc.attach_with(|| {
            ran.set(true);
            Ok(())
        });
        assert!(out.is_ok());
        assert!(ran.get());
    }

    #[test]
    fn hooks_survive_repeated_cycles() {
        let lc = Lifecycle::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        lc.on(Phase::AfterAttach, move || c.set(c.get() + 1));

        for _ in 0..3 {
            let _: Result<(), ()> = lc.attach_with(|| Ok(()));
            let _: Result<(), ()> = lc.detach_with(|| Ok(()));
        }

        assert_eq!(count.get(), 3);
    }

    #[test]
    fn registry_creates_lazily_and_releases() {
        let registry: LifecycleRegistry<u32> = LifecycleRegistry::new();
        assert!(registry.get(&1).is_none());

        let first = registry.lifecycle(&1);
        let again = registry.lifecycle(&1);
        assert!(Rc::ptr_eq(&first, &again));
        assert_eq!(registry.len(), 1);

        first.on(Phase::BeforeAttach, || {});
        assert!(registry.release(&1));
        assert!(!registry.release(&1));
        assert!(first.before_attach().is_empty());
        assert!(!Rc::ptr_eq(&first, &registry.lifecycle(&1)));
    }

    #[test]
    fn forwarding_cascades_until_disconnected() {
        let parent = Lifecycle::new();
        let child = Rc::new(Lifecycle::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        child.on(Phase::BeforeDetach, recorder(&log, "before"));
        child.on(Phase::AfterDetach, recorder(&log, "after"));

        let link = parent.forward_to(&child);
        let _: Result<(), ()> = parent.detach_with(|| Ok(()));
        assert_eq!(*log.borrow(), vec!["before", "after"]);

        link.disconnect();
        assert!(parent.before_detach().is_empty());
        let _: Result<(), ()> = parent.detach_with(|| Ok(()));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn forwarding_to_itself_is_inert() {
        let lc = Rc::new(Lifecycle::new());
        let link = lc.forward_to(&lc);
        assert!(!link.is_connected());
        assert!(lc.after_attach().is_empty());
    }

    #[test]
    fn disown_unlinks_both_directions() {
        let registry: LifecycleRegistry<u32> = LifecycleRegistry::new();
        registry.own(&1, &10);
        registry.own(&1, &11);
        registry.own(&10, &20);

        assert_eq!(registry.disown(&10), vec![20]);
        assert_eq!(registry.owned_count(&1), 1);
        assert_eq!(registry.disown(&1), vec![11]);
        assert_eq!(registry.owned_count(&1), 0);
        assert!(registry.disown(&20).is_empty());
    }
}
