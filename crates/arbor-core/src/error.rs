//! Error types for tree construction and queries.

use std::fmt;
use thiserror::Error;

/// Errors raised while building or querying an arbor.
///
/// Structural problems are reported where they are detected instead of
/// surfacing later as missing values.
#[derive(Error, Debug)]
pub enum ArborError {
    /// The input does not describe edges at all (odd-length pair list,
    /// self-loop, empty path, unreadable row).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Every node has a parent, so there is nothing to start from.
    #[error("no root found: every node has a parent")]
    NoRootFound,

    /// More than one parentless node, or nodes unreachable from the root.
    #[error("disconnected tree: {} candidate roots ({})", .roots.len(), .roots.join(", "))]
    DisconnectedTree { roots: Vec<String> },

    /// Following parent pointers did not terminate.
    #[error("cyclic structure detected at node {node}")]
    CyclicStructure { node: String },

    /// A node that is not part of the arbor was referenced.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArborError {
    /// Builds a `NodeNotFound` from any debuggable key.
    pub fn node_not_found(node: impl fmt::Debug) -> Self {
        ArborError::NodeNotFound(format!("{:?}", node))
    }

    /// Builds a `CyclicStructure` from any debuggable key.
    pub fn cyclic(node: impl fmt::Debug) -> Self {
        ArborError::CyclicStructure {
            node: format!("{:?}", node),
        }
    }

    /// Builds a `DisconnectedTree` listing the competing roots.
    pub fn disconnected<I, K>(roots: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: fmt::Debug,
    {
        ArborError::DisconnectedTree {
            roots: roots.into_iter().map(|r| format!("{:?}", r)).collect(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        ArborError::MalformedInput(msg.into())
    }
}

/// Result type for Arbor operations.
pub type Result<T> = std::result::Result<T, ArborError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_node() {
        let err = ArborError::node_not_found(42);
        assert_eq!(err.to_string(), "node not found: 42");

        let err = ArborError::cyclic("a");
        assert_eq!(err.to_string(), "cyclic structure detected at node \"a\"");
    }

    #[test]
    fn test_disconnected_lists_roots() {
        let err = ArborError::disconnected([1, 9]);
        assert_eq!(err.to_string(), "disconnected tree: 2 candidate roots (1, 9)");
    }
}
