//! Tree backends.
//!
//! [`Env`] is the seam between the builder and a concrete tree;
//! [`VirtualDom`] is the in-memory implementation shipped with the crate.

mod env;
mod error;
pub mod namespace;
mod value;
mod virtual_dom;

pub use env::{Env, Listener};
pub use error::DomError;
pub use value::Value;
pub use virtual_dom::{NodeId, NodeKind, Snapshot, VirtualDom, VirtualEvent};
