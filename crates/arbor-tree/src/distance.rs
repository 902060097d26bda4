//! Distances from a root, by hop count or by a caller-supplied metric.
//!
//! Both traversals go breadth-first from the given root along successor
//! lists, so nodes that are not downstream of that root are not visited.
//! Reaching a node twice means a loop and fails with `CyclicStructure`.

use crate::arbor::{children_of, Arbor};
use arbor_core::{ArborError, NodeId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Distance of every node downstream of a root, and the largest of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDistances<K: NodeId> {
    pub distances: HashMap<K, f64>,
    /// Distance of the furthest end node.
    pub max: f64,
}

impl<K: NodeId> Arbor<K> {
    /// Level of every node, counting the root as level 1.
    ///
    /// Without an explicit root the arbor's root is looked up with
    /// [`find_root`](Self::find_root).
    pub fn edge_count_to_root(&self, root: Option<&K>) -> Result<HashMap<K, usize>> {
        let start = match root {
            Some(node) if self.contains(node) => node.clone(),
            Some(node) => return Err(ArborError::node_not_found(node)),
            None => self.find_root()?,
        };

        let successors = self.all_successors();
        let mut levels = HashMap::with_capacity(successors.len());
        let mut current_level = vec![start];
        let mut level = 1;

        while !current_level.is_empty() {
            let mut next_level = Vec::new();
            for node in current_level {
                next_level.extend(children_of(&successors, &node).iter().cloned());
                if levels.insert(node.clone(), level).is_some() {
                    return Err(ArborError::cyclic(node));
                }
            }
            current_level = next_level;
            level += 1;
        }

        Ok(levels)
    }

    /// Distance of every node downstream of `root`, where `distance_fn`
    /// receives `(child, parent)` and returns the length of that edge.
    pub fn nodes_distance_to<F>(&self, root: &K, mut distance_fn: F) -> Result<NodeDistances<K>>
    where
        F: FnMut(&K, &K) -> f64,
    {
        if !self.contains(root) {
            return Err(ArborError::node_not_found(root));
        }

        let successors = self.all_successors();
        let mut distances = HashMap::with_capacity(successors.len());
        let mut max = 0.0_f64;
        let mut open = VecDeque::from([(root, 0.0)]);

        while let Some((mut parent, mut dist)) = open.pop_front() {
            if distances.insert(parent.clone(), dist).is_some() {
                return Err(ArborError::cyclic(parent));
            }
            let mut succ = children_of(&successors, parent);
            // Walk slabs without going through the queue
            while let [child] = succ {
                dist += distance_fn(child, parent);
                if distances.insert(child.clone(), dist).is_some() {
                    return Err(ArborError::cyclic(child));
                }
                parent = child;
                succ = children_of(&successors, parent);
            }
            if succ.is_empty() {
                max = max.max(dist);
            } else {
                for child in succ {
                    open.push_back((child, dist + distance_fn(child, parent)));
                }
            }
        }

        Ok(NodeDistances { distances, max })
    }

    /// Hierarchical order of every node downstream of `root`, with `root`
    /// at order 0.
    pub fn nodes_order_from(&self, root: &K) -> Result<HashMap<K, usize>> {
        let orders = self.nodes_distance_to(root, |_, _| 1.0)?;
        Ok(orders
            .distances
            .into_iter()
            .map(|(node, d)| (node, d as usize))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::arbor::tests::{chain, five_node};

    #[test]
    fn test_edge_count_to_root() {
        let levels = five_node().edge_count_to_root(None).unwrap();
        assert_eq!(levels[&1], 1);
        assert_eq!(levels[&2], 2);
        assert_eq!(levels[&3], 2);
        assert_eq!(levels[&4], 3);
        assert_eq!(levels[&5], 3);
        assert_eq!(levels.len(), 5);
    }

    #[test]
    fn test_edge_count_from_inner_node() {
        let levels = five_node().edge_count_to_root(Some(&2)).unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[&2], 1);
        assert_eq!(levels[&4], 2);

        assert!(five_node().edge_count_to_root(Some(&9)).is_err());
    }

    #[test]
    fn test_nodes_distance_to() {
        // Every edge is as long as the child's key
        let result = five_node()
            .nodes_distance_to(&1, |child, _| *child as f64)
            .unwrap();
        assert_eq!(result.distances[&1], 0.0);
        assert_eq!(result.distances[&2], 2.0);
        assert_eq!(result.distances[&3], 3.0);
        assert_eq!(result.distances[&5], 7.0);
        assert_eq!(result.max, 7.0);
    }

    #[test]
    fn test_nodes_distance_along_slab() {
        let result = chain(5).nodes_distance_to(&2, |_, _| 0.5).unwrap();
        assert_eq!(result.distances.len(), 4);
        assert_eq!(result.distances[&5], 1.5);
        assert_eq!(result.max, 1.5);
    }

    #[test]
    fn test_nodes_order_from() {
        let orders = five_node().nodes_order_from(&1).unwrap();
        assert_eq!(orders[&1], 0);
        assert_eq!(orders[&3], 1);
        assert_eq!(orders[&4], 2);
    }
}
