use std::fmt;

use tracing::warn;

use super::{Attrs, Getter, SlotKey, Target, Transform};
use crate::dom::{Env, Value};
use crate::lifecycle::Lifecycle;
use crate::reactive::Source;

/// Property view of one node.
pub struct Props<E: Env> {
    target: Target<E>,
}

impl<E: Env> Props<E> {
    pub(crate) fn new(target: Target<E>) -> Self {
        Self { target }
    }

    pub fn node(&self) -> &E::Node {
        &self.target.node
    }

    /// The lifecycle bindings made through this view follow.
    pub fn lifecycle(&self) -> Option<&Lifecycle> {
        self.target.lifecycle.as_deref()
    }

    /// Attribute view of the same node, sharing its bindings.
    pub fn attrs(&self) -> Attrs<E> {
        Attrs::new(self.target.clone())
    }

    /// Read a property from the backend.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.target.env.get_property(&self.target.node, name)
    }

    /// Write a property, dropping any binding on it.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), E::Error> {
        self.target.bindings.unbind(&SlotKey::property(name));
        self.target
            .env
            .set_property(&self.target.node, name, value.into())
    }

    /// Make property `name` follow `source`.
    ///
    /// Returns `false` when `source` already drives the property.
    pub fn bind<S>(&self, name: &str, source: &S) -> bool
    where
        S: Source,
        S::Value: Into<Value>,
    {
        let property = name.to_string();
        let connect = self.target.connector(source, move |env: &E, node, value| {
            if let Err(err) = env.set_property(node, &property, value) {
                warn!(property = %property, error = %err, "failed to write bound property");
            }
        });
        self.target
            .bind_slot(SlotKey::property(name), source.id(), connect)
    }

    /// Drop the binding on `name`, leaving the current value in place.
    pub fn unbind(&self, name: &str) -> bool {
        self.target.bindings.unbind(&SlotKey::property(name))
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.target.bindings.is_bound(&SlotKey::property(name))
    }

    /// A closure writing `name`, optionally through `transform`.
    pub fn setter(
        &self,
        name: &str,
        transform: Option<Transform>,
    ) -> impl Fn(Value) -> Result<(), E::Error> + 'static {
        let props = self.clone();
        let name = name.to_string();
        move |value: Value| {
            let value = match &transform {
                Some(transform) => transform(value, props.get(&name), &name),
                None => value,
            };
            props.set(&name, value)
        }
    }

    /// A closure reading `name`, or asking `handler` instead.
    ///
    /// Without a handler, an absent property reads as [`Value::Null`].
    pub fn getter(&self, name: &str, handler: Option<Getter<Self>>) -> impl Fn() -> Value + 'static {
        let props = self.clone();
        let name = name.to_string();
        move || match &handler {
            Some(handler) => handler(&name, &props),
            None => props.get(&name).unwrap_or_default(),
        }
    }
}

impl<E: Env> Clone for Props<E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<E: Env> fmt::Debug for Props<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Props").field(&self.target).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
