//! Scope Stack
//!
//! The scope stack records which node implicit builder calls target and
//! which namespace new elements are created in.
//!
//! # Implementation
//!
//! Two stacks of optional entries, pushed by [`ScopeStack::enter`] and
//! [`ScopeStack::enter_namespace`] and popped when the returned guard is
//! dropped. A `None` entry masks the outer scope, which is how detached
//! builds suppress implicit insertion.
//!
//! Guards pop on drop, so the stack is restored even when a builder
//! callback panics or returns early with `?`.

use std::cell::RefCell;
use std::fmt;

/// Current-node and current-namespace stacks.
pub struct ScopeStack<N> {
    nodes: RefCell<Vec<Option<N>>>,
    namespaces: RefCell<Vec<Option<String>>>,
}

impl<N: Clone> ScopeStack<N> {
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(Vec::new()),
            namespaces: RefCell::new(Vec::new()),
        }
    }

    /// Make `node` the current scope until the guard drops.
    pub fn enter(&self, node: Option<N>) -> ScopeGuard<'_, N> {
        self.nodes.borrow_mut().push(node);
        ScopeGuard { stack: self }
    }

    /// Make `namespace` current until the guard drops.
    pub fn enter_namespace(&self, namespace: Option<String>) -> NamespaceGuard<'_, N> {
        self.namespaces.borrow_mut().push(namespace);
        NamespaceGuard { stack: self }
    }

    /// Top of the node stack, `None` when empty or masked.
    pub fn current_node(&self) -> Option<N> {
        self.nodes.borrow().last().cloned().flatten()
    }

    pub fn current_namespace(&self) -> Option<String> {
        self.namespaces.borrow().last().cloned().flatten()
    }

    /// Number of node entries currently pushed.
    pub fn depth(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn namespace_depth(&self) -> usize {
        self.namespaces.borrow().len()
    }
}

impl<N: Clone> Default for ScopeStack<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: fmt::Debug> fmt::Debug for ScopeStack<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeStack")
            .field("nodes", &self.nodes.borrow())
            .field("namespaces", &self.namespaces.borrow())
            .finish()
    }
}

/// Pops the node entry pushed by [`ScopeStack::enter`].
#[must_use = "the scope ends when the guard is dropped"]
pub struct ScopeGuard<'a, N> {
    stack: &'a ScopeStack<N>,
}

impl<N> Drop for ScopeGuard<'_, N> {
    fn drop(&mut self) {
        self.stack.nodes.borrow_mut().pop();
    }
}

/// Pops the namespace entry pushed by [`ScopeStack::enter_namespace`].
#[must_use = "the namespace ends when the guard is dropped"]
pub struct NamespaceGuard<'a, N> {
    stack: &'a ScopeStack<N>,
}

impl<N> Drop for NamespaceGuard<'_, N> {
    fn drop(&mut self) {
        self.stack.namespaces.borrow_mut().pop();
    }
}
