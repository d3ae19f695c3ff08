//! Process-wide builder handle.
//!
//! Code that cannot thread a [`Builder`] through its call chain can park one
//! here. Nothing is installed by default and nothing falls back to a
//! default builder: [`global`] returns `None` until [`set_global`] is
//! called with a builder of the requested backend type.
//!
//! Builders are `Rc`-based, so the handle is per thread.

use std::any::Any;
use std::cell::RefCell;

use crate::builder::Builder;
use crate::dom::Env;

thread_local! {
    static GLOBAL: RefCell<Option<Box<dyn Any>>> = const { RefCell::new(None) };
}

/// Install `builder` as this thread's global builder, replacing any other.
pub fn set_global<E: Env>(builder: Builder<E>) {
    GLOBAL.with(|slot| *slot.borrow_mut() = Some(Box::new(builder)));
}

/// The global builder, if one for backend `E` is installed.
pub fn global<E: Env>() -> Option<Builder<E>> {
    GLOBAL.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|any| any.downcast_ref::<Builder<E>>())
            .cloned()
    })
}

/// Remove the global builder. Returns whether one was installed.
pub fn clear_global() -> bool {
    GLOBAL.with(|slot| slot.borrow_mut().take().is_some())
}
