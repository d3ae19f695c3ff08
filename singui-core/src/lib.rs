//! Singui Core
//!
//! This crate builds DOM-like trees declaratively from nested closures and
//! keeps them in sync with reactive state. It implements:
//!
//! - Reactive primitives (signals and string muxes)
//! - A scope stack for implicit "where does this go" targeting
//! - Anchored regions that can be detached, moved and refilled as a unit
//! - Per-node lifecycle hooks around attach and detach
//! - Property and attribute bindings that follow the node's lifecycle
//!
//! The tree itself lives behind the [`dom::Env`] trait; [`dom::VirtualDom`]
//! is an in-memory implementation for server-side rendering and tests.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: hook sets, signals and muxes
//! - `scope`: current-target and current-namespace stacks
//! - `lifecycle`: per-node attach/detach hooks
//! - `bind`: property and attribute views with source bindings
//! - `deferred`: queue for "as soon as possible" binding activation
//! - `builder`: the tree builder, regions, fragments and element handles
//! - `dom`: backend trait, values, namespaces and the virtual tree
//! - `global`: optional per-thread builder handle
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use singui_core::builder::Builder;
//! use singui_core::dom::{Env, VirtualDom};
//!
//! let dom = Rc::new(VirtualDom::new());
//! let root = dom.create_element("ul", None).unwrap();
//! let builder = Builder::with_root(dom.clone(), root);
//!
//! let list = builder.fragment().unwrap();
//! list.append(|ctx| ctx.li(|li| li.text("first").map(|_| ()))).unwrap();
//! list.set(|ctx| ctx.li(|li| li.text("second").map(|_| ()))).unwrap();
//!
//! assert_eq!(dom.to_html(root), "<ul><li>second</li></ul>");
//! ```

pub mod bind;
pub mod builder;
pub mod deferred;
pub mod dom;
pub mod global;
pub mod lifecycle;
pub mod reactive;
pub mod scope;

pub use builder::{Builder, Built, Ctx, ElementHandle, Fragment, Region};
pub use reactive::{mux, Mux, Signal, Source};
