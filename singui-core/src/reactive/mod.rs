//! Reactive Primitives
//!
//! This module implements the state side of the crate: hook sets, signals
//! and muxes. The tree side (bindings, lifecycle, builder) is built on top.
//!
//! # Concepts
//!
//! ## Hook sets
//!
//! A [`HookSet`] is an ordered set of callbacks. Adding a callback returns a
//! [`Disconnect`]; using it twice is harmless.
//!
//! ## Signals
//!
//! A [`Signal`] is a mutable cell. Writing an equal value is a no-op; any
//! other write notifies every subscriber. New subscribers are called
//! immediately with the current value.
//!
//! ## Muxes
//!
//! A [`Mux`] concatenates literal text with the current values of other
//! sources. It subscribes to those sources only while someone is listening
//! to it, and can be paused so a burst of source changes produces one
//! notification.
//!
//! # Implementation Notes
//!
//! Everything here is single-threaded (`Rc`, `Cell`, `RefCell`). Nothing
//! holds a borrow while user callbacks run, so callbacks may freely read
//! and write other reactive values.

mod hooks;
mod id;
mod mux;
mod signal;
mod source;

pub use hooks::{Disconnect, HookId, HookSet};
pub use mux::{mux, BatchGuard, Mux, MuxInput, TrackedInput};
pub use signal::Signal;
pub use source::{Source, SourceId};
