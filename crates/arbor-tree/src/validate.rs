//! Structural validation.
//!
//! Edge input is trusted by most algorithms in this crate: a loop would
//! make parent walks spin forever and a second root would silently drop a
//! fragment. Construction therefore checks the whole structure once with a
//! union-find pass.

use crate::arbor::Arbor;
use arbor_core::{ArborError, NodeId, Result};
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;
use tracing::debug;

impl<K: NodeId> Arbor<K> {
    /// Checks that the edges form one tree hanging from `root`.
    ///
    /// Fails with `CyclicStructure` when a loop exists and with
    /// `DisconnectedTree` when a parent is neither a child nor the root.
    pub fn validate(&self) -> Result<()> {
        if self.edges.is_empty() {
            return Ok(());
        }
        let root = self.root.as_ref().ok_or(ArborError::NoRootFound)?;
        if self.edges.contains_key(root) {
            return Err(ArborError::cyclic(root));
        }

        let mut index: HashMap<&K, usize> = HashMap::with_capacity(self.edges.len() + 1);
        index.insert(root, 0);
        for child in self.edges.keys() {
            let next = index.len();
            index.insert(child, next);
        }

        // n nodes and n - 1 edges: without a loop the graph is connected.
        let mut sets = UnionFind::<usize>::new(index.len());
        for (child, parent) in &self.edges {
            let parent_index = match index.get(parent) {
                Some(i) => *i,
                None => return Err(ArborError::disconnected([root, parent])),
            };
            if !sets.union(index[child], parent_index) {
                return Err(ArborError::cyclic(child));
            }
        }

        debug!("Validated arbor of {} nodes", index.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbor::tests::five_node;

    #[test]
    fn test_valid_trees() {
        assert!(five_node().validate().is_ok());
        assert!(Arbor::<u64>::new().validate().is_ok());

        let mut single = Arbor::new();
        single.add_path(&[3u64]).unwrap();
        assert!(single.validate().is_ok());
    }

    #[test]
    fn test_second_root_is_reported() {
        let mut arbor = five_node();
        arbor.edges.insert(10, 11);
        match arbor.validate() {
            Err(ArborError::DisconnectedTree { roots }) => assert_eq!(roots, vec!["1", "11"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_detached_loop_is_reported() {
        let mut arbor = five_node();
        arbor.edges.insert(10, 11);
        arbor.edges.insert(11, 10);
        assert!(matches!(
            arbor.validate(),
            Err(ArborError::CyclicStructure { .. })
        ));
    }

    #[test]
    fn test_root_with_parent_is_a_loop() {
        let mut arbor = five_node();
        arbor.edges.insert(1, 4);
        assert!(matches!(
            arbor.validate(),
            Err(ArborError::CyclicStructure { .. })
        ));
    }
}
