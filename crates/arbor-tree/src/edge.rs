//! Edge export.
//!
//! The arbor keeps its edges in a hash map, which is neither ordered nor
//! friendly to JSON with non-string keys. Exports go through a flat,
//! sorted list of [`Edge`] records instead.

use crate::arbor::Arbor;
use arbor_core::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A child → parent edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge<K> {
    pub child: K,
    pub parent: K,
}

impl<K> Edge<K> {
    pub fn new(child: K, parent: K) -> Self {
        Self { child, parent }
    }
}

impl<K: fmt::Display> fmt::Display for Edge<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.child, self.parent)
    }
}

/// A serializable snapshot of an arbor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArborExport<K> {
    pub root: Option<K>,
    pub edges: Vec<Edge<K>>,
}

impl<K: NodeId> Arbor<K> {
    /// All edges, sorted by child.
    pub fn export_edges(&self) -> Vec<Edge<K>> {
        let mut edges: Vec<Edge<K>> = self
            .edges
            .iter()
            .map(|(child, parent)| Edge::new(child.clone(), parent.clone()))
            .collect();
        edges.sort();
        edges
    }

    /// Root and sorted edges, ready for serialization.
    pub fn export(&self) -> ArborExport<K> {
        ArborExport {
            root: self.root.clone(),
            edges: self.export_edges(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::arbor::tests::five_node;

    #[test]
    fn test_export_edges_sorted() {
        let edges = five_node().export_edges();
        let pairs: Vec<(u64, u64)> = edges.iter().map(|e| (e.child, e.parent)).collect();
        assert_eq!(pairs, vec![(2, 1), (3, 1), (4, 2), (5, 2)]);
        assert_eq!(edges[2].to_string(), "4 -> 2");
    }

    #[test]
    fn test_export_json() {
        let json = serde_json::to_value(five_node().export()).unwrap();
        assert_eq!(json["root"], 1);
        assert_eq!(json["edges"][0]["child"], 2);
        assert_eq!(json["edges"][0]["parent"], 1);
        assert_eq!(json["edges"].as_array().map(Vec::len), Some(4));
    }
}
