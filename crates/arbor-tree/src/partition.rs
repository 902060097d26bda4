//! Decomposition of an arbor into linear chains.
//!
//! A partition is a list of chains, each starting at an end node and
//! running toward the root until it meets a node already claimed by an
//! earlier chain (a branch node) or reaches the root. That last node is
//! included, so branch nodes and the root may close several chains.
//!
//! Processing chains shortest-first visits every subtree before the chain
//! that carries its branch node further up, which is what the bottom-up
//! accumulations in this crate rely on.

use crate::arbor::Arbor;
use arbor_core::{ArborError, NodeId, Result};
use std::collections::{HashMap, HashSet};
use tracing::debug;

impl<K: NodeId> Arbor<K> {
    /// Splits the arbor into chains, furthest end node first.
    ///
    /// End nodes at equal distance from the root are taken in ascending
    /// key order. An arbor without edges has no chains.
    pub fn partition(&self) -> Result<Vec<Vec<K>>> {
        if self.edges.is_empty() {
            return Ok(Vec::new());
        }

        let levels = self.edge_count_to_root(None)?;
        let mut ends = Vec::new();
        for end in self.find_end_nodes() {
            let level = match levels.get(&end) {
                Some(level) => *level,
                None => return Err(ArborError::disconnected([end])),
            };
            ends.push((level, end));
        }
        ends.sort_by(|(la, a), (lb, b)| lb.cmp(la).then_with(|| a.cmp(b)));

        let mut seen: HashSet<&K> = HashSet::with_capacity(self.edges.len());
        let mut chains = Vec::with_capacity(ends.len());
        for (_, end) in ends {
            let mut parent = self.edges.get(&end);
            let mut chain = vec![end];
            while let Some(node) = parent {
                chain.push(node.clone());
                if !seen.insert(node) {
                    break;
                }
                parent = self.edges.get(node);
            }
            chains.push(chain);
        }

        debug!("Partitioned {} nodes into {} chains", self.count_nodes(), chains.len());
        Ok(chains)
    }

    /// Like [`partition`](Self::partition), with chains ordered from
    /// shortest to longest.
    pub fn partition_sorted(&self) -> Result<Vec<Vec<K>>> {
        let mut chains = self.partition()?;
        chains.sort_by_key(Vec::len);
        Ok(chains)
    }

    /// A new arbor spanning the `keepers`: the kept nodes plus every node
    /// on the paths between them.
    ///
    /// The result is rooted at the keeper closest to this arbor's root,
    /// the smallest key winning a tie.
    pub fn spanning_tree(&self, keepers: &[K]) -> Result<Arbor<K>> {
        if let Some(missing) = keepers.iter().find(|k| !self.contains(k)) {
            return Err(ArborError::node_not_found(missing));
        }

        let mut spanning = Arbor::new();
        let keep: HashSet<&K> = keepers.iter().collect();
        let total = keep.len();
        match total {
            0 => return Ok(spanning),
            1 => {
                spanning.root = Some(keepers[0].clone());
                return Ok(spanning);
            }
            _ => {}
        }

        let chains = self.partition_sorted()?;

        // Kept nodes at or below every node. Chains closing at a branch
        // node leave their count pending until the chain that continues
        // through it comes along.
        let mut pending: HashMap<&K, usize> = HashMap::new();
        let mut below: HashMap<&K, usize> = HashMap::with_capacity(self.edges.len() + 1);
        for chain in &chains {
            let Some((anchor, inner)) = chain.split_last() else {
                continue;
            };
            let mut count = 0;
            for node in inner {
                count += pending.get(node).copied().unwrap_or(0) + usize::from(keep.contains(node));
                below.insert(node, count);
            }
            *pending.entry(anchor).or_insert(0) += count;
        }
        if let Some(root) = &self.root {
            let count = pending.get(root).copied().unwrap_or(0) + usize::from(keep.contains(root));
            below.insert(root, count);
        }

        // The deepest node holding every keeper below it tops the span.
        let mut top = &keepers[0];
        while below.get(top).copied().unwrap_or(0) < total {
            match self.edges.get(top) {
                Some(parent) => top = parent,
                None => break,
            }
        }

        let in_span = |node: &K| {
            let count = below.get(node).copied().unwrap_or(0);
            count > 0 && (count < total || node == top)
        };
        let span_size = below.keys().filter(|node| in_span(**node)).count();

        // Along a chain, the spanned nodes are contiguous.
        for chain in &chains {
            let run: Vec<K> = chain.iter().filter(|node| in_span(*node)).cloned().collect();
            if run.len() > 1 {
                // Runs may attach below parts placed later, so check once at the end.
                spanning.insert_path_reversed(&run);
            }
            if spanning.edges.len() + 1 == span_size {
                break;
            }
        }
        spanning.root = Some(top.clone());
        spanning.validate()?;

        let levels = spanning.edge_count_to_root(Some(top))?;
        let closest = keepers
            .iter()
            .filter_map(|keeper| levels.get(keeper).map(|level| (level, keeper)))
            .min();
        if let Some((_, keeper)) = closest {
            spanning.reroot(keeper)?;
        }

        debug!(
            "Spanning tree of {} keepers has {} nodes",
            total,
            spanning.count_nodes()
        );
        Ok(spanning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbor::tests::{chain, five_node};

    fn edge_set(arbor: &Arbor<u64>) -> Vec<(u64, u64)> {
        let mut edges: Vec<_> = arbor.edges().iter().map(|(c, p)| (*c, *p)).collect();
        edges.sort();
        edges
    }

    /// 1 ← 2 ← 3 ← 4 with side chains 5 → 2 and 6 → 7 → 3
    fn forked() -> Arbor<u64> {
        let mut arbor = chain(4);
        arbor.add_edges([5, 2, 7, 3, 6, 7]).unwrap();
        arbor
    }

    #[test]
    fn test_partition_five_node() {
        let chains = five_node().partition().unwrap();
        assert_eq!(chains, vec![vec![4, 2, 1], vec![5, 2], vec![3, 1]]);
    }

    #[test]
    fn test_partition_sorted() {
        let chains = five_node().partition_sorted().unwrap();
        assert_eq!(chains, vec![vec![5, 2], vec![3, 1], vec![4, 2, 1]]);
    }

    #[test]
    fn test_partition_covers_every_node() {
        let arbor = forked();
        let chains = arbor.partition().unwrap();
        let ends = arbor.find_end_nodes().len();

        let covered: HashSet<u64> = chains.iter().flatten().copied().collect();
        assert_eq!(covered, arbor.nodes());

        // Every chain but the first closes on a node another chain owns
        let total: usize = chains.iter().map(Vec::len).sum();
        assert_eq!(total, arbor.count_nodes() + ends - 1);
    }

    #[test]
    fn test_partition_trivial() {
        assert!(chain(1).partition().unwrap().is_empty());
        assert!(Arbor::<u64>::new().partition().unwrap().is_empty());
        assert_eq!(chain(3).partition().unwrap(), vec![vec![3, 2, 1]]);
    }

    #[test]
    fn test_spanning_tree_single_keeper() {
        let arbor = five_node();
        let spanning = arbor.spanning_tree(&[1]).unwrap();
        assert_eq!(spanning.root(), Some(&1));
        assert!(spanning.edges().is_empty());

        let spanning = arbor.spanning_tree(&[4]).unwrap();
        assert_eq!(spanning.root(), Some(&4));
        assert_eq!(spanning.count_nodes(), 1);
    }

    #[test]
    fn test_spanning_tree_siblings() {
        // Both keepers sit at the same depth: the smaller key wins
        let spanning = five_node().spanning_tree(&[5, 4]).unwrap();
        assert_eq!(spanning.root(), Some(&4));
        assert_eq!(edge_set(&spanning), vec![(2, 4), (5, 2)]);
    }

    #[test]
    fn test_spanning_tree_keeps_connecting_nodes() {
        let spanning = five_node().spanning_tree(&[4, 3]).unwrap();
        assert_eq!(spanning.root(), Some(&3));
        assert_eq!(edge_set(&spanning), vec![(1, 3), (2, 1), (4, 2)]);
        assert!(spanning.validate().is_ok());
    }

    #[test]
    fn test_spanning_tree_rooted_at_a_keeper() {
        let arbor = forked();
        for keepers in [vec![4, 6], vec![5, 6], vec![6, 5, 4], vec![7, 4]] {
            let spanning = arbor.spanning_tree(&keepers).unwrap();
            let root = spanning.root().copied().unwrap();
            assert!(keepers.contains(&root), "root {root} for {keepers:?}");
        }
    }

    #[test]
    fn test_spanning_tree_rooted_at_upstream_keeper() {
        let spanning = forked().spanning_tree(&[2, 6]).unwrap();
        assert_eq!(spanning.root(), Some(&2));
        assert_eq!(edge_set(&spanning), vec![(3, 2), (6, 7), (7, 3)]);
    }

    #[test]
    fn test_spanning_tree_across_branches() {
        let spanning = forked().spanning_tree(&[5, 4, 6]).unwrap();
        assert_eq!(spanning.root(), Some(&5));
        assert_eq!(
            edge_set(&spanning),
            vec![(2, 5), (3, 2), (4, 3), (6, 7), (7, 3)]
        );
    }

    #[test]
    fn test_spanning_tree_edge_cases() {
        let arbor = five_node();
        assert!(arbor.spanning_tree(&[]).unwrap().is_empty());
        assert!(matches!(
            arbor.spanning_tree(&[4, 99]),
            Err(ArborError::NodeNotFound(_))
        ));
        let whole = arbor.spanning_tree(&arbor.nodes_array()).unwrap();
        assert_eq!(edge_set(&whole), edge_set(&arbor));
    }
}
