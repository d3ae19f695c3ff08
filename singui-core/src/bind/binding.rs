//! Binding Slots
//!
//! A binding connects one source to one property or attribute of one node.
//! The table owns the bindings; lifecycle hooks and deferred tasks only hold
//! weak references, so dropping a binding from the table cancels both.
//!
//! # Activation
//!
//! A binding is live when it holds a subscription to its source. It goes
//! live on whichever comes first:
//!
//! - the node's `before_attach` hooks, or
//! - the deferred task queued when the binding was made.
//!
//! Going live twice is a no-op. `after_detach` drops the subscription and
//! bumps the binding's generation; a deferred task only activates if the
//! generation it captured is still current, so a detach that happens before
//! the queue is flushed keeps the binding dormant until the next attach.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::deferred::DeferredQueue;
use crate::dom::namespace;
use crate::lifecycle::{Lifecycle, Phase};
use crate::reactive::{Disconnect, SourceId};

/// What a binding writes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Property(String),
    Attribute {
        namespace: Option<String>,
        name: String,
    },
}

impl SlotKey {
    pub fn property(name: &str) -> Self {
        SlotKey::Property(name.to_string())
    }

    /// An attribute slot. The namespace is keyed by its resolved URI, so
    /// an alias and its URI name the same slot.
    pub fn attribute(name: &str, namespace: Option<&str>) -> Self {
        SlotKey::Attribute {
            namespace: namespace.map(|ns| namespace::resolve(ns).to_string()),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Property(name) => write!(f, ".{name}"),
            SlotKey::Attribute {
                namespace: Some(ns),
                name,
            } => write!(f, "[{ns}:{name}]"),
            SlotKey::Attribute { namespace: None, name } => write!(f, "[{name}]"),
        }
    }
}

/// Opens a subscription that writes the source through to the slot.
pub(crate) type Connector = Box<dyn Fn() -> Disconnect>;

struct Binding {
    key: SlotKey,
    source: SourceId,
    connect: Connector,
    subscription: RefCell<Option<Disconnect>>,
    generation: Cell<u64>,
    hooks: RefCell<Vec<Disconnect>>,
}

impl Binding {
    fn is_active(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    fn activate(&self) {
        if self.is_active() {
            return;
        }
        debug!(slot = %self.key, source = self.source.raw(), "activating binding");
        let subscription = (self.connect)();
        *self.subscription.borrow_mut() = Some(subscription);
    }

    fn deactivate(&self) {
        self.generation.set(self.generation.get() + 1);
        let subscription = self.subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            debug!(slot = %self.key, source = self.source.raw(), "deactivating binding");
            subscription.disconnect();
        }
    }

    fn teardown(&self) {
        self.deactivate();
        let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
        for hook in hooks {
            hook.disconnect();
        }
    }
}

/// The bindings of one node, one per slot.
#[derive(Default)]
pub struct BindingTable {
    slots: RefCell<HashMap<SlotKey, Rc<Binding>>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive `key` from the source `source`.
    ///
    /// Binding the source already driving the slot does nothing and returns
    /// `false`. Otherwise the previous binding is torn down, activation is
    /// wired to `lifecycle` (when given) and queued on `deferred`.
    pub(crate) fn bind(
        &self,
        key: SlotKey,
        source: SourceId,
        connect: Connector,
        lifecycle: Option<&Lifecycle>,
        deferred: &DeferredQueue,
    ) -> bool {
        if self.source(&key) == Some(source) {
            return false;
        }
        self.unbind(&key);

        let binding = Rc::new(Binding {
            key: key.clone(),
            source,
            connect,
            subscription: RefCell::new(None),
            generation: Cell::new(0),
            hooks: RefCell::new(Vec::new()),
        });

        if let Some(lifecycle) = lifecycle {
            let weak = Rc::downgrade(&binding);
            let on_attach = lifecycle.on(Phase::BeforeAttach, move || {
                if let Some(binding) = weak.upgrade() {
                    binding.activate();
                }
            });
            let weak = Rc::downgrade(&binding);
            let on_detach = lifecycle.on(Phase::AfterDetach, move || {
                if let Some(binding) = weak.upgrade() {
                    binding.deactivate();
                }
            });
            binding.hooks.borrow_mut().extend([on_attach, on_detach]);
        }

        let weak: Weak<Binding> = Rc::downgrade(&binding);
        let generation = binding.generation.get();
        deferred.schedule(move || {
            if let Some(binding) = weak.upgrade() {
                if binding.generation.get() == generation {
                    binding.activate();
                }
            }
        });

        self.slots.borrow_mut().insert(key, binding);
        true
    }

    /// Tear down the binding on `key`. Returns whether there was one.
    pub fn unbind(&self, key: &SlotKey) -> bool {
        let removed = self.slots.borrow_mut().remove(key);
        match removed {
            Some(binding) => {
                binding.teardown();
                true
            }
            None => false,
        }
    }

    /// The source currently driving `key`.
    pub fn source(&self, key: &SlotKey) -> Option<SourceId> {
        self.slots.borrow().get(key).map(|b| b.source)
    }

    pub fn is_bound(&self, key: &SlotKey) -> bool {
        self.slots.borrow().contains_key(key)
    }

    /// Whether the binding on `key` currently holds a subscription.
    pub fn is_active(&self, key: &SlotKey) -> bool {
        self.slots.borrow().get(key).is_some_and(|b| b.is_active())
    }

    /// Bring every binding live now.
    pub fn activate_all(&self) {
        let bindings: Vec<Rc<Binding>> = self.slots.borrow().values().cloned().collect();
        for binding in bindings {
            binding.activate();
        }
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Tear down every binding.
    pub fn clear(&self) {
        let drained: Vec<Rc<Binding>> = self.slots.borrow_mut().drain().map(|(_, b)| b).collect();
        for binding in drained {
            binding.teardown();
        }
    }
}

impl fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.borrow();
        f.debug_struct("BindingTable")
            .field("slots", &slots.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
