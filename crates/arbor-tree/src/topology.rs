//! Topological reduction and slabs.

use crate::arbor::{children_of, Arbor};
use arbor_core::NodeId;
use std::collections::VecDeque;

impl<K: NodeId> Arbor<K> {
    /// A new arbor that keeps only the root, branch nodes and end nodes.
    ///
    /// Every slab collapses into one edge between its endpoints. Applying
    /// it twice gives the same arbor as applying it once.
    pub fn topological_copy(&self) -> Arbor<K> {
        let mut topo = Arbor::new();
        let Some(root) = &self.root else {
            return topo;
        };
        topo.root = Some(root.clone());

        let successors = self.all_successors();
        let mut open = VecDeque::from([(root, root)]);
        while let Some((mut child, parent)) = open.pop_front() {
            let mut succ = children_of(&successors, child);
            while let [only] = succ {
                child = only;
                succ = children_of(&successors, child);
            }
            if child != root {
                topo.edges.insert(child.clone(), parent.clone());
            }
            open.extend(succ.iter().map(|s| (s, child)));
        }
        topo
    }

    /// Maximal single-child chains, each running from the root or a branch
    /// node down to a branch node or an end node, both included.
    ///
    /// A single-node arbor has the one slab `[root]`.
    pub fn slabs(&self) -> Vec<Vec<K>> {
        let Some(root) = &self.root else {
            return Vec::new();
        };
        if self.edges.is_empty() {
            return vec![vec![root.clone()]];
        }

        let successors = self.all_successors();
        let mut slabs = Vec::new();
        let mut open: VecDeque<(&K, &K)> = children_of(&successors, root)
            .iter()
            .map(|child| (root, child))
            .collect();

        while let Some((start, first)) = open.pop_front() {
            let mut slab = vec![start.clone(), first.clone()];
            let mut last = first;
            let mut succ = children_of(&successors, last);
            while let [only] = succ {
                slab.push(only.clone());
                last = only;
                succ = children_of(&successors, last);
            }
            open.extend(succ.iter().map(|child| (last, child)));
            slabs.push(slab);
        }
        slabs
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
    fn test_topological_copy() {
        let topo = forked().topological_copy();
        assert_eq!(topo.root(), Some(&1));
        assert_eq!(edge_set(&topo), vec![(2, 1), (3, 2), (4, 3), (5, 2), (6, 3)]);
        assert!(topo.validate().is_ok());
    }

    #[test]
    fn test_topological_copy_is_idempotent() {
        for arbor in [forked(), five_node(), chain(5), chain(1)] {
            let once = arbor.topological_copy();
            assert_eq!(once.topological_copy(), once);
        }
    }

    #[test]
    fn test_topological_copy_of_path() {
        let topo = chain(5).topological_copy();
        assert_eq!(edge_set(&topo), vec![(5, 1)]);

        let single = chain(1).topological_copy();
        assert_eq!(single.root(), Some(&1));
        assert!(single.edges().is_empty());

        assert!(Arbor::<u64>::new().topological_copy().is_empty());
    }

    #[test]
    fn test_slabs() {
        let mut slabs = forked().slabs();
        slabs.sort();
        assert_eq!(
            slabs,
            vec![vec![1, 2], vec![2, 3], vec![2, 5], vec![3, 4], vec![3, 7, 6]]
        );

        let mut slabs = five_node().slabs();
        slabs.sort();
        assert_eq!(slabs, vec![vec![1, 2], vec![1, 3], vec![2, 4], vec![2, 5]]);
    }

    #[test]
    fn test_slabs_of_path() {
        assert_eq!(chain(4).slabs(), vec![vec![1, 2, 3, 4]]);
        assert_eq!(chain(1).slabs(), vec![vec![1]]);
        assert!(Arbor::<u64>::new().slabs().is_empty());
    }
}
