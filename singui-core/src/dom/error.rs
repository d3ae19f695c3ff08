//! Errors reported by the in-memory backend.

use thiserror::Error;

use super::virtual_dom::NodeId;

/// Failure of a [`VirtualDom`](super::VirtualDom) operation.
#[derive(Debug, Error)]
pub enum DomError {
    /// The handle does not belong to this tree.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A sibling-relative insertion was asked of a node without a parent.
    #[error("node {0} has no parent")]
    NoParent(NodeId),

    /// The insertion would make a node its own ancestor.
    #[error("cannot insert {child} under {parent}: node would contain itself")]
    Hierarchy { parent: NodeId, child: NodeId },

    /// Attribute and property operations that need an element.
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("invalid tag name {0:?}")]
    InvalidTag(String),

    #[error("failed to serialize tree")]
    Serialize(#[from] serde_json::Error),
}
