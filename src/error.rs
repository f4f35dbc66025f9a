use thiserror::Error;

use crate::NodeId;

/// Failures of nested set operations.
///
/// Operations return [`anyhow::Result`], so store level failures pass through
/// unchanged. Use [`anyhow::Error::downcast_ref`] to tell these apart.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NestedSetError {
    /// No row exists for the given node id.
    #[error("node {0} not found")]
    NotFound(NodeId),

    /// A structurally nonsensical request, e.g. moving a node into itself.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl NestedSetError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }
}
