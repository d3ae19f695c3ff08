//! Hook sets for the reactive system.
//!
//! A [`HookSet`] is the one primitive every other part of the crate uses to
//! deliver notifications: signal subscribers, mux consumers and the four
//! lifecycle phases are all hook sets. Adding a hook hands back a
//! [`Disconnect`] that removes it again; removal is idempotent.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Key of a hook inside its [`HookSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl HookId {
    pub(crate) fn next() -> Self {
        Self(super::id::next())
    }
}

type Hook<A> = Rc<dyn Fn(&A)>;
type HookMap<A> = RefCell<IndexMap<HookId, Hook<A>>>;

/// An insertion-ordered set of callbacks taking `&A`.
///
/// Clones share the same set.
pub struct HookSet<A: ?Sized + 'static> {
    hooks: Rc<HookMap<A>>,
}

impl<A: ?Sized + 'static> HookSet<A> {
    /// Create an empty hook set.
    pub fn new() -> Self {
        Self {
            hooks: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    /// Register a hook. The returned [`Disconnect`] removes it.
    pub fn add<F>(&self, hook: F) -> Disconnect
    where
        F: Fn(&A) + 'static,
    {
        let id = HookId::next();
        self.hooks.borrow_mut().insert(id, Rc::new(hook));

        let weak: Weak<HookMap<A>> = Rc::downgrade(&self.hooks);
        Disconnect::new(move || {
            if let Some(hooks) = weak.upgrade() {
                hooks.borrow_mut().shift_remove(&id);
            }
        })
    }

    /// Invoke every hook with `arg`, in registration order.
    ///
    /// The set is snapshotted first, so hooks may add or remove hooks while
    /// running. A hook removed by an earlier hook of the same run is skipped.
    pub fn run(&self, arg: &A) {
        let snapshot: SmallVec<[(HookId, Hook<A>); 4]> = self
            .hooks
            .borrow()
            .iter()
            .map(|(id, hook)| (*id, Rc::clone(hook)))
            .collect();

        for (id, hook) in snapshot {
            if !self.hooks.borrow().contains_key(&id) {
                continue;
            }
            hook(arg);
        }
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.borrow().len()
    }

    /// Whether no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.borrow().is_empty()
    }

    /// Remove every hook.
    pub fn clear(&self) {
        self.hooks.borrow_mut().clear();
    }
}

impl<A: ?Sized + 'static> Default for HookSet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized + 'static> Clone for HookSet<A> {
    fn clone(&self) -> Self {
        Self {
            hooks: Rc::clone(&self.hooks),
        }
    }
}

impl<A: ?Sized + 'static> fmt::Debug for HookSet<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet").field("len", &self.len()).finish()
    }
}

/// Handle that undoes a registration.
///
/// Calling [`Disconnect::disconnect`] more than once is harmless. Dropping a
/// `Disconnect` does *not* disconnect: a subscription without a kept handle
/// simply lives as long as its source.
#[derive(Clone)]
pub struct Disconnect {
    action: Rc<Cell<Option<Box<dyn FnOnce()>>>>,
}

impl Disconnect {
    /// Wrap a teardown action.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            action: Rc::new(Cell::new(Some(Box::new(action)))),
        }
    }

    /// A handle with nothing to undo.
    pub fn noop() -> Self {
        Self {
            action: Rc::new(Cell::new(None)),
        }
    }

    /// Merge several handles into one.
    pub fn all<I>(handles: I) -> Self
    where
        I: IntoIterator<Item = Disconnect>,
    {
        let handles: Vec<Disconnect> = handles.into_iter().collect();
        Self::new(move || {
            for handle in handles {
                handle.disconnect();
            }
        })
    }

    /// Run the teardown action, once.
    pub fn disconnect(&self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }

    /// Whether the teardown action has not run yet.
    pub fn is_connected(&self) -> bool {
        let action = self.action.take();
        let connected = action.is_some();
        self.action.set(action);
        connected
    }
}

impl fmt::Debug for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disconnect")
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
