//! Reactive Bindings
//!
//! [`Props`] and [`Attrs`] are typed views of one node's properties and
//! attributes. Plain writes go straight to the backend. Binding a
//! [`Source`](crate::reactive::Source) makes the slot follow it: the value
//! is written on activation and after every change, for as long as the
//! node is attached.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use singui_core::bind;
//! use singui_core::deferred::DeferredQueue;
//! use singui_core::dom::{Env, Value, VirtualDom};
//! use singui_core::reactive::Signal;
//!
//! let dom = Rc::new(VirtualDom::new());
//! let node = dom.create_text_node("").unwrap();
//! let queue = DeferredQueue::new();
//!
//! let count = Signal::new(1);
//! let props = bind::wrap(dom.clone(), node, None, &queue);
//! props.bind("textContent", &count);
//! queue.flush();
//! assert_eq!(props.get("textContent"), Some(Value::from("1")));
//!
//! count.set(2);
//! assert_eq!(dom.text_content(node), "2");
//! ```

mod attrs;
mod binding;
mod props;

use std::fmt;
use std::rc::Rc;

pub use attrs::Attrs;
pub use binding::{BindingTable, SlotKey};
pub use props::Props;

use crate::deferred::DeferredQueue;
use crate::dom::{Env, Value};
use crate::lifecycle::Lifecycle;
use crate::reactive::{Source, SourceId};
use binding::Connector;

/// Rewrites a value before a setter writes it: `(new, current, name)`.
pub type Transform = Rc<dyn Fn(Value, Option<Value>, &str) -> Value>;

/// Computes a getter's result from `(name, view)`.
pub type Getter<V> = Rc<dyn Fn(&str, &V) -> Value>;

/// Wrap `node` in a property view with its own binding table.
///
/// Bindings made through the view activate on `lifecycle`'s attach hooks
/// and on the next flush of `deferred`.
pub fn wrap<E: Env>(
    env: Rc<E>,
    node: E::Node,
    lifecycle: Option<Rc<Lifecycle>>,
    deferred: &DeferredQueue,
) -> Props<E> {
    Props::new(Target {
        env,
        node,
        lifecycle,
        bindings: Rc::new(BindingTable::new()),
        deferred: deferred.clone(),
    })
}

/// The node a view writes to, plus what its bindings hang off.
pub(crate) struct Target<E: Env> {
    pub(crate) env: Rc<E>,
    pub(crate) node: E::Node,
    pub(crate) lifecycle: Option<Rc<Lifecycle>>,
    pub(crate) bindings: Rc<BindingTable>,
    pub(crate) deferred: DeferredQueue,
}

impl<E: Env> Target<E> {
    fn bind_slot(&self, key: SlotKey, source: SourceId, connect: Connector) -> bool {
        self.bindings
            .bind(key, source, connect, self.lifecycle.as_deref(), &self.deferred)
    }

    /// A connector that subscribes `source` and hands each value to `write`.
    fn connector<S, W>(&self, source: &S, write: W) -> Connector
    where
        S: Source,
        S::Value: Into<Value>,
        W: Fn(&E, &E::Node, Value) + 'static,
    {
        let env = Rc::clone(&self.env);
        let node = self.node.clone();
        let source = source.clone();
        let write = Rc::new(write);
        Box::new(move || {
            let (env, node, write) = (Rc::clone(&env), node.clone(), Rc::clone(&write));
            source.connect(move |value: &S::Value| write(env.as_ref(), &node, value.clone().into()))
        })
    }
}

impl<E: Env> Clone for Target<E> {
    fn clone(&self) -> Self {
        Self {
            env: Rc::clone(&self.env),
            node: self.node.clone(),
            lifecycle: self.lifecycle.clone(),
            bindings: Rc::clone(&self.bindings),
            deferred: self.deferred.clone(),
        }
    }
}

impl<E: Env> fmt::Debug for Target<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("node", &self.node)
            .field("bindings", &self.bindings)
            .finish()
    }
}
