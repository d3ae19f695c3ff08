//! The environment adapter.
//!
//! The builder never touches a concrete tree. Everything it does goes
//! through an [`Env`]: a browser DOM binding, the in-crate
//! [`VirtualDom`](super::VirtualDom), or anything else with the same
//! primitives.

use std::error::Error;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use super::value::Value;

/// An event listener as registered with a backend.
///
/// Listeners are removed by pointer identity, so keep the `Rc` returned by
/// registration around.
pub type Listener<Ev> = Rc<dyn Fn(&Ev)>;

/// Tree primitives supplied by a backend.
///
/// Operations are synchronous. Errors are passed through the builder
/// untouched.
///
/// Every backend must give document fragments their DOM meaning: appending
/// or inserting a fragment moves its children, in order, and leaves the
/// fragment empty.
pub trait Env: 'static {
    /// Handle to a node. Equality is node identity.
    type Node: Clone + Eq + Hash + Debug + 'static;
    /// Payload handed to event listeners.
    type Event: 'static;
    /// Failure reported by the backend.
    type Error: Error + 'static;

    /// Create an element, optionally in a namespace (alias or URI).
    fn create_element(&self, tag: &str, namespace: Option<&str>) -> Result<Self::Node, Self::Error>;

    fn create_text_node(&self, text: &str) -> Result<Self::Node, Self::Error>;

    fn create_comment(&self, text: &str) -> Result<Self::Node, Self::Error>;

    fn create_document_fragment(&self) -> Result<Self::Node, Self::Error>;

    /// Copy a node, with its subtree when `deep`.
    fn clone_element(&self, node: &Self::Node, deep: bool) -> Result<Self::Node, Self::Error>;

    /// Append `child` as the last child of `parent`, moving it if attached.
    fn append_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), Self::Error>;

    /// Insert `node` right before `anchor`, under `anchor`'s parent.
    fn insert_before(&self, anchor: &Self::Node, node: &Self::Node) -> Result<(), Self::Error>;

    /// Insert `node` right after `anchor`, under `anchor`'s parent.
    fn insert_after(&self, anchor: &Self::Node, node: &Self::Node) -> Result<(), Self::Error>;

    /// Take `node` out of its parent. A node without a parent is left alone.
    fn remove(&self, node: &Self::Node) -> Result<(), Self::Error>;

    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn get_attribute(&self, node: &Self::Node, name: &str, namespace: Option<&str>) -> Option<String>;

    fn set_attribute(
        &self,
        node: &Self::Node,
        name: &str,
        value: &str,
        namespace: Option<&str>,
    ) -> Result<(), Self::Error>;

    fn remove_attribute(
        &self,
        node: &Self::Node,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<(), Self::Error>;

    /// Read a property of the node object (`textContent`, `value`, ...).
    fn get_property(&self, node: &Self::Node, name: &str) -> Option<Value>;

    fn set_property(&self, node: &Self::Node, name: &str, value: Value) -> Result<(), Self::Error>;

    fn add_event_listener(
        &self,
        node: &Self::Node,
        event: &str,
        listener: &Listener<Self::Event>,
    ) -> Result<(), Self::Error>;

    fn remove_event_listener(
        &self,
        node: &Self::Node,
        event: &str,
        listener: &Listener<Self::Event>,
    ) -> Result<(), Self::Error>;

    /// Free a subtree the builder is done with. Handles to it must not be
    /// used afterwards. Backends with their own garbage collection can keep
    /// the default, which does nothing.
    fn dispose(&self, _node: &Self::Node) -> Result<(), Self::Error> {
        Ok(())
    }
}
