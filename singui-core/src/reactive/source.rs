//! The capability shared by everything that can drive a binding.

use super::hooks::Disconnect;

/// Identity of a reactive source.
///
/// Clones of a [`Signal`](super::Signal) or [`Mux`](super::Mux) share their
/// ID, which is how a binding recognises "the same source assigned again".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    /// Generate a new unique source ID.
    pub fn new() -> Self {
        Self(super::id::next())
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// A readable value that notifies connected handlers when it changes.
pub trait Source: Clone + 'static {
    /// The value type delivered to handlers.
    type Value: Clone + PartialEq + 'static;

    /// Identity shared by all clones of this source.
    fn id(&self) -> SourceId;

    /// Read the current value.
    fn get(&self) -> Self::Value;

    /// Call `handler` with the current value now and again after every change.
    fn connect<F>(&self, handler: F) -> Disconnect
    where
        F: Fn(&Self::Value) + 'static;
}
