//! Signal Implementation
//!
//! A Signal is the atomic reactive cell. It holds a value and a hook set of
//! subscribers.
//!
//! # How Signals Work
//!
//! 1. `get` reads the value.
//!
//! 2. `set` compares the new value with the held one. Equal values are
//!    dropped without notifying anyone.
//!
//! 3. `connect` calls the handler with the current value straight away and
//!    then after every change, until the returned [`Disconnect`] is used.
//!
//! # Reentrancy
//!
//! No borrow of the value is held while subscribers run, so a subscriber
//! may read the signal or write to it (including writing to the signal that
//! is currently notifying).

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::hooks::{Disconnect, HookSet};
use super::source::{Source, SourceId};

struct SignalInner<T: 'static> {
    id: SourceId,
    value: RefCell<T>,
    subscribers: HookSet<T>,
}

/// A reactive cell holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The stored value. `PartialEq` drives change detection.
///
/// # Example
///
/// ```rust
/// use singui_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// let stop = count.connect(|v| println!("count = {v}"));
///
/// count.set(5);            // prints "count = 5"
/// count.set(5);            // same value, nothing printed
/// count.update(|v| v + 1); // prints "count = 6"
/// stop.disconnect();
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: SourceId::new(),
                value: RefCell::new(value),
                subscribers: HookSet::new(),
            }),
        }
    }

    /// Get the signal's identity.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Run `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store a new value and notify subscribers.
    ///
    /// Returns `false`, without notifying, when the value equals the
    /// current one.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }

        self.inner.subscribers.run(&value);
        true
    }

    /// Update the value using a function of the old value.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.inner.value.borrow());
        self.set(next)
    }

    /// Subscribe to changes.
    ///
    /// The handler runs once immediately with the current value, so a new
    /// subscriber is never stale.
    pub fn connect<F>(&self, handler: F) -> Disconnect
    where
        F: Fn(&T) + 'static,
    {
        let current = self.get();
        handler(&current);
        self.inner.subscribers.add(handler)
    }

    /// Subscribe several handlers at once; the result disconnects all of them.
    pub fn connect_each<I, F>(&self, handlers: I) -> Disconnect
    where
        I: IntoIterator<Item = F>,
        F: Fn(&T) + 'static,
    {
        Disconnect::all(handlers.into_iter().map(|h| self.connect(h)))
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T> Source for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    type Value = T;

    fn id(&self) -> SourceId {
        Signal::id(self)
    }

    fn get(&self) -> T {
        Signal::get(self)
    }

    fn connect<F>(&self, handler: F) -> Disconnect
    where
        F: Fn(&T) + 'static,
    {
        Signal::connect(self, handler)
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
