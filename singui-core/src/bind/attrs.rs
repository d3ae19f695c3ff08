use std::fmt;

use tracing::warn;

use super::{Getter, Props, SlotKey, Target, Transform};
use crate::dom::{Env, Value};
use crate::reactive::Source;

/// Attribute view of one node.
///
/// Writing [`Value::Null`] removes the attribute. Every operation has a
/// namespaced form taking a namespace alias or URI.
pub struct Attrs<E: Env> {
    target: Target<E>,
}

fn write<E: Env>(
    env: &E,
    node: &E::Node,
    name: &str,
    namespace: Option<&str>,
    value: &Value,
) -> Result<(), E::Error> {
    match value.to_attribute() {
        Some(text) => env.set_attribute(node, name, &text, namespace),
        None => env.remove_attribute(node, name, namespace),
    }
}

impl<E: Env> Attrs<E> {
    pub(crate) fn new(target: Target<E>) -> Self {
        Self { target }
    }

    pub fn node(&self) -> &E::Node {
        &self.target.node
    }

    /// Property view of the same node, sharing its bindings.
    pub fn props(&self) -> Props<E> {
        Props::new(self.target.clone())
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.get_ns(name, None)
    }

    pub fn get_ns(&self, name: &str, namespace: Option<&str>) -> Option<String> {
        self.target
            .env
            .get_attribute(&self.target.node, name, namespace)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), E::Error> {
        self.set_ns(name, None, value)
    }

    /// Write an attribute, dropping any binding on it.
    pub fn set_ns(
        &self,
        name: &str,
        namespace: Option<&str>,
        value: impl Into<Value>,
    ) -> Result<(), E::Error> {
        self.target
            .bindings
            .unbind(&SlotKey::attribute(name, namespace));
        write(
            self.target.env.as_ref(),
            &self.target.node,
            name,
            namespace,
            &value.into(),
        )
    }

    pub fn remove(&self, name: &str) -> Result<(), E::Error> {
        self.set_ns(name, None, Value::Null)
    }

    pub fn remove_ns(&self, name: &str, namespace: Option<&str>) -> Result<(), E::Error> {
        self.set_ns(name, namespace, Value::Null)
    }

    pub fn bind<S>(&self, name: &str, source: &S) -> bool
    where
        S: Source,
        S::Value: Into<Value>,
    {
        self.bind_ns(name, None, source)
    }

    /// Make attribute `name` follow `source`. A null value removes it.
    ///
    /// Returns `false` when `source` already drives the attribute.
    pub fn bind_ns<S>(&self, name: &str, namespace: Option<&str>, source: &S) -> bool
    where
        S: Source,
        S::Value: Into<Value>,
    {
        let attribute = name.to_string();
        let ns = namespace.map(str::to_string);
        let connect = self.target.connector(source, move |env: &E, node, value| {
            if let Err(err) = write(env, node, &attribute, ns.as_deref(), &value) {
                warn!(attribute = %attribute, error = %err, "failed to write bound attribute");
            }
        });
        self.target
            .bind_slot(SlotKey::attribute(name, namespace), source.id(), connect)
    }

    pub fn unbind(&self, name: &str) -> bool {
        self.unbind_ns(name, None)
    }

    /// Drop the binding on `name`, leaving the current value in place.
    pub fn unbind_ns(&self, name: &str, namespace: Option<&str>) -> bool {
        self.target
            .bindings
            .unbind(&SlotKey::attribute(name, namespace))
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.is_bound_ns(name, None)
    }

    pub fn is_bound_ns(&self, name: &str, namespace: Option<&str>) -> bool {
        self.target
            .bindings
            .is_bound(&SlotKey::attribute(name, namespace))
    }

    /// A closure writing `name`, optionally through `transform`.
    pub fn setter(
        &self,
        name: &str,
        transform: Option<Transform>,
    ) -> impl Fn(Value) -> Result<(), E::Error> + 'static {
        let attrs = self.clone();
        let name = name.to_string();
        move |value: Value| {
            let value = match &transform {
                Some(transform) => transform(value, attrs.get(&name).map(Value::Text), &name),
                None => value,
            };
            attrs.set(&name, value)
        }
    }

    /// A closure reading `name`, or asking `handler` instead.
    pub fn getter(&self, name: &str, handler: Option<Getter<Self>>) -> impl Fn() -> Value + 'static {
        let attrs = self.clone();
        let name = name.to_string();
        move || match &handler {
            Some(handler) => handler(&name, &attrs),
            None => attrs.get(&name).map(Value::Text).unwrap_or_default(),
        }
    }
}

impl<E: Env> Clone for Attrs<E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<E: Env> fmt::Debug for Attrs<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Attrs").field(&self.target).finish()
    }
}
