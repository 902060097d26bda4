//! Morphological measurements.
//!
//! Geometry stays with the caller: anything that needs a length takes a
//! `distance_fn(child, parent)` closure, so these work equally on node
//! positions, hop counts or any other edge weight.

use crate::arbor::Arbor;
use arbor_core::{NodeId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Total cable of the terminal segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminalCable {
    /// Cable from every end node up to its nearest branch node or the root.
    pub cable: f64,
    pub n_branches: usize,
    pub n_ends: usize,
}

/// Distribution of subtree asymmetries over all branch nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asymmetry {
    pub mean: f64,
    pub std_dev: f64,
    /// Ten equal bins over `[0, 1]`; a value of exactly 1 lands in the last.
    pub histogram: [u32; 10],
    /// Number of binary splits measured. A trifurcation counts twice.
    pub n_branches: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Accumulations
// ─────────────────────────────────────────────────────────────────────────────

impl<K: NodeId> Arbor<K> {
    /// Amount of arbor downstream of every node, where `amount_fn`
    /// receives `(parent, child)` for each edge. End nodes have 0.
    ///
    /// With `normalize` every value is divided by the root's, unless that
    /// is 0.
    pub fn downstream_amount<F>(&self, mut amount_fn: F, normalize: bool) -> Result<HashMap<K, f64>>
    where
        F: FnMut(&K, &K) -> f64,
    {
        let mut values: HashMap<K, f64> = HashMap::with_capacity(self.count_nodes());
        let mut pending: HashMap<K, f64> = HashMap::new();

        for chain in self.partition_sorted()? {
            let last = chain.len() - 1;
            let mut value = 0.0;
            values.insert(chain[0].clone(), 0.0);
            for (i, pair) in chain.windows(2).enumerate() {
                let (child, parent) = (&pair[0], &pair[1]);
                value += amount_fn(parent, child);
                if i + 1 == last {
                    *pending.entry(parent.clone()).or_insert(0.0) += value;
                } else {
                    value += pending.remove(parent).unwrap_or(0.0);
                    values.insert(parent.clone(), value);
                }
            }
        }

        if let Some(root) = &self.root {
            let total = pending.remove(root).unwrap_or(0.0);
            values.insert(root.clone(), total);
            if normalize && total != 0.0 {
                for value in values.values_mut() {
                    *value /= total;
                }
            }
        }
        Ok(values)
    }

    /// Horton–Strahler order of every node.
    ///
    /// End nodes have order 1. A node takes the highest order among its
    /// children, plus one if two or more children share that order.
    pub fn strahler_analysis(&self) -> Result<HashMap<K, u32>> {
        let mut orders = HashMap::with_capacity(self.count_nodes());
        let mut pending: HashMap<K, Vec<u32>> = HashMap::new();

        for chain in self.partition_sorted()? {
            let Some((anchor, inner)) = chain.split_last() else {
                continue;
            };
            let mut order = 1;
            for node in inner {
                if let Some(mut children) = pending.remove(node) {
                    children.push(order);
                    order = combine_orders(&children);
                }
                orders.insert(node.clone(), order);
            }
            pending.entry(anchor.clone()).or_default().push(order);
        }

        if let Some(root) = &self.root {
            let order = pending
                .remove(root)
                .map(|children| combine_orders(&children))
                .unwrap_or(1);
            orders.insert(root.clone(), order);
        }
        Ok(orders)
    }

    /// Sum of all edge lengths, with `distance_fn(child, parent)`.
    pub fn cable_length<F>(&self, mut distance_fn: F) -> f64
    where
        F: FnMut(&K, &K) -> f64,
    {
        self.edges
            .iter()
            .map(|(child, parent)| distance_fn(child, parent))
            .sum()
    }
}

fn combine_orders(children: &[u32]) -> u32 {
    let max = children.iter().copied().max().unwrap_or(1);
    let at_max = children.iter().filter(|&&o| o == max).count();
    if at_max > 1 {
        max + 1
    } else {
        max
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstream lookups
// ─────────────────────────────────────────────────────────────────────────────

impl<K: NodeId> Arbor<K> {
    /// Path from `node` up to the first strict ancestor found in `stops`,
    /// both included. `None` when the root is passed without a hit.
    pub fn path_to_upstream_node_in(&self, node: &K, stops: &HashSet<K>) -> Result<Option<Vec<K>>> {
        let mut path = self.path_to_root(node)?;
        match path.iter().skip(1).position(|n| stops.contains(n)) {
            Some(i) => {
                path.truncate(i + 2);
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    /// Cable from `node` to the first strict ancestor in `stops`.
    pub fn distance_to_upstream_node_in<F>(
        &self,
        node: &K,
        mut distance_fn: F,
        stops: &HashSet<K>,
    ) -> Result<Option<f64>>
    where
        F: FnMut(&K, &K) -> f64,
    {
        Ok(self
            .path_to_upstream_node_in(node, stops)?
            .map(|path| path.windows(2).map(|pair| distance_fn(&pair[0], &pair[1])).sum()))
    }

    /// Cable of all terminal segments together.
    ///
    /// A terminal segment runs from an end node up to the nearest branch
    /// node, or to the root for an unbranched arbor.
    pub fn terminal_cable_length<F>(&self, mut distance_fn: F) -> Result<TerminalCable>
    where
        F: FnMut(&K, &K) -> f64,
    {
        let be = self.find_branch_and_end_nodes();
        let mut stops: HashSet<K> = be.branches.iter().cloned().collect();
        stops.extend(self.root.iter().cloned());

        let mut cable = 0.0;
        for end in &be.ends {
            cable += self
                .distance_to_upstream_node_in(end, &mut distance_fn, &stops)?
                .unwrap_or(0.0);
        }
        Ok(TerminalCable {
            cable,
            n_branches: be.branches.len(),
            n_ends: be.ends.len(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subtree measurements and asymmetry
// ─────────────────────────────────────────────────────────────────────────────

impl<K: NodeId> Arbor<K> {
    /// For every branch node, one measurement per subtree hanging from it.
    ///
    /// Each chain starts from `initial(end)` and folds its edges in with
    /// `accumulate(value, child, parent)`. Passing a branch node, the
    /// subtrees already measured there are folded in with `merge`. The
    /// root only appears when it has two or more children.
    pub fn subtrees_measurements<T, I, A, M>(
        &self,
        initial: I,
        mut accumulate: A,
        merge: M,
    ) -> Result<HashMap<K, Vec<T>>>
    where
        T: Clone,
        I: Fn(&K) -> T,
        A: FnMut(T, &K, &K) -> T,
        M: Fn(T, &T) -> T,
    {
        let mut branches: HashMap<K, Vec<T>> = HashMap::new();

        for chain in self.partition_sorted()? {
            let Some((anchor, rest)) = chain.split_last() else {
                continue;
            };
            let Some((first, inner)) = rest.split_first() else {
                continue;
            };
            let mut value = initial(first);
            let mut previous = first;
            for node in inner {
                value = accumulate(value, previous, node);
                if let Some(subtrees) = branches.get_mut(node) {
                    let own = value.clone();
                    value = subtrees.iter().fold(value, |acc, m| merge(acc, m));
                    subtrees.push(own);
                }
                previous = node;
            }
            value = accumulate(value, previous, anchor);
            branches.entry(anchor.clone()).or_default().push(value);
        }

        if let Some(root) = &self.root {
            if branches.get(root).is_some_and(|subtrees| subtrees.len() < 2) {
                branches.remove(root);
            }
        }
        Ok(branches)
    }

    /// Number of end nodes in each subtree of every branch node.
    pub fn subtrees_end_count(&self) -> Result<HashMap<K, Vec<u32>>> {
        self.subtrees_measurements(|_| 1, |count, _, _| count, |a, b| a + b)
    }

    /// Load (e.g. input synapses) in each subtree of every branch node,
    /// not counting the branch node's own.
    pub fn subtrees_load(&self, load: &HashMap<K, u32>) -> Result<HashMap<K, Vec<u32>>> {
        let at = |node: &K| load.get(node).copied().unwrap_or(0);
        self.subtrees_measurements(|_| 0, |sum, child, _| sum + at(child), |a, b| a + b)
    }

    /// Cable in each subtree of every branch node, including the edge
    /// that joins the subtree to the branch node.
    pub fn subtrees_cable<F>(&self, mut distance_fn: F) -> Result<HashMap<K, Vec<f64>>>
    where
        F: FnMut(&K, &K) -> f64,
    {
        self.subtrees_measurements(
            |_| 0.0,
            |sum, child, parent| sum + distance_fn(child, parent),
            |a, b| a + b,
        )
    }

    /// Topological asymmetry from the end counts of each subtree.
    pub fn asymmetry_index(&self) -> Result<Option<Asymmetry>> {
        let counts = self.subtrees_end_count()?;
        Ok(asymmetry(&counts, |a, b| {
            if a == b {
                0.0
            } else {
                (a - b).abs() / (a + b - 2.0)
            }
        }))
    }

    /// Asymmetry of the cable in each subtree.
    pub fn cable_asymmetry_index<F>(&self, distance_fn: F) -> Result<Option<Asymmetry>>
    where
        F: FnMut(&K, &K) -> f64,
    {
        let cable = self.subtrees_cable(distance_fn)?;
        Ok(asymmetry(&cable, ratio_asymmetry))
    }

    /// Asymmetry of the load carried by each subtree.
    pub fn load_asymmetry_index(&self, load: &HashMap<K, u32>) -> Result<Option<Asymmetry>> {
        let counts = self.subtrees_load(load)?;
        Ok(asymmetry(&counts, ratio_asymmetry))
    }
}

fn ratio_asymmetry(a: f64, b: f64) -> f64 {
    if a == b {
        0.0
    } else {
        (a - b).abs() / (a + b)
    }
}

/// Mean, deviation and histogram of the asymmetries at every branch node.
///
/// A node with more than two subtrees is treated as nested binary splits:
/// subtrees are taken from largest to smallest, each one compared against
/// the sum of those before it. Returns `None` when there is nothing to
/// measure.
pub fn asymmetry<K, T, F>(measurements: &HashMap<K, Vec<T>>, asymmetry_fn: F) -> Option<Asymmetry>
where
    T: Copy + Into<f64>,
    F: Fn(f64, f64) -> f64,
{
    let mut values = Vec::new();
    for subtrees in measurements.values() {
        let mut subtrees: Vec<f64> = subtrees.iter().map(|&m| m.into()).collect();
        if let [a, b] = subtrees.as_slice() {
            values.push(asymmetry_fn(*a, *b));
            continue;
        }
        subtrees.sort_by(|a, b| b.total_cmp(a));
        let Some((&largest, rest)) = subtrees.split_first() else {
            continue;
        };
        let mut sum = largest;
        for &sub in rest {
            values.push(asymmetry_fn(sum, sub));
            sum += sub;
        }
    }

    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let mut histogram = [0u32; 10];
    let mut sum_sq_diffs = 0.0;
    for value in &values {
        let bin = ((value * 10.0) as usize).min(9);
        histogram[bin] += 1;
        sum_sq_diffs += (value - mean).powi(2);
    }

    Some(Asymmetry {
        mean,
        std_dev: (sum_sq_diffs / n).sqrt(),
        histogram,
        n_branches: values.len(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Pruning
// ─────────────────────────────────────────────────────────────────────────────

impl<K: NodeId> Arbor<K> {
    /// Removes terminal segments in which no node carries load.
    ///
    /// A segment runs from an end node up to, but excluding, the nearest
    /// branch node. An unbranched arbor is left alone. Returns the number of
    /// nodes removed.
    pub fn prune_bare_terminal_segments(&mut self, load: &HashMap<K, u32>) -> usize {
        let be = self.find_branch_and_end_nodes();
        let branches: HashSet<&K> = be.branches.iter().collect();
        let loaded = |node: &K| load.get(node).is_some_and(|&n| n > 0);

        let mut doomed = Vec::new();
        'ends: for end in &be.ends {
            let mut segment = Vec::new();
            let mut node = end;
            while !branches.contains(node) {
                if loaded(node) {
                    continue 'ends;
                }
                match self.edges.get(node) {
                    Some(parent) => {
                        segment.push(node.clone());
                        node = parent;
                    }
                    // Reached the root without meeting a branch
                    None => continue 'ends,
                }
            }
            doomed.extend(segment);
        }

        for node in &doomed {
            self.edges.remove(node);
        }
        debug!("Pruned {} nodes from bare terminal segments", doomed.len());
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbor::tests::{chain, five_node};

    /// 1 ← 2 ← 3 ← 4 with side chains 5 → 2 and 6 → 7 → 3
    fn forked() -> Arbor<u64> {
        let mut arbor = chain(4);
        arbor.add_edges([5, 2, 7, 3, 6, 7]).unwrap();
        arbor
    }

    /// Root 1 with three children 2, 3 and 4; 5 hangs from 4.
    fn trifurcated() -> Arbor<u64> {
        let mut arbor = Arbor::new();
        arbor.add_edges([2, 1, 3, 1, 4, 1, 5, 4]).unwrap();
        arbor
    }

    fn sorted<T: PartialOrd>(mut v: Vec<T>) -> Vec<T> {
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        v
    }

    #[test]
    fn test_downstream_node_count() {
        let counts = five_node().downstream_amount(|_, _| 1.0, false).unwrap();
        assert_eq!(counts[&1], 4.0);
        assert_eq!(counts[&2], 2.0);
        assert_eq!(counts[&3], 0.0);
        assert_eq!(counts[&4], 0.0);

        let counts = trifurcated().downstream_amount(|_, _| 1.0, false).unwrap();
        assert_eq!(counts[&1], 4.0);
        assert_eq!(counts[&4], 1.0);
    }

    #[test]
    fn test_downstream_amount_per_edge() {
        // Edge length is the child's key
        let cable = forked().downstream_amount(|_, child| *child as f64, true).unwrap();
        let total = (2 + 3 + 4 + 5 + 6 + 7) as f64;
        assert_eq!(cable[&1], 1.0);
        assert_eq!(cable[&3], (4 + 6 + 7) as f64 / total);
        assert_eq!(cable[&7], 6.0 / total);

        let single = chain(1).downstream_amount(|_, _| 1.0, true).unwrap();
        assert_eq!(single[&1], 0.0);
    }

    #[test]
    fn test_strahler() {
        let orders = five_node().strahler_analysis().unwrap();
        assert_eq!(orders[&4], 1);
        assert_eq!(orders[&2], 2);
        assert_eq!(orders[&3], 1);
        assert_eq!(orders[&1], 2);

        // 3 joins two order-1 subtrees; 2 adds only a single end node to that
        let orders = forked().strahler_analysis().unwrap();
        assert_eq!(orders[&7], 1);
        assert_eq!(orders[&3], 2);
        assert_eq!(orders[&2], 2);
        assert_eq!(orders[&1], 2);

        assert_eq!(chain(1).strahler_analysis().unwrap()[&1], 1);
        assert_eq!(chain(4).strahler_analysis().unwrap()[&1], 1);
    }

    #[test]
    fn test_combine_orders() {
        assert_eq!(combine_orders(&[1, 1]), 2);
        assert_eq!(combine_orders(&[2, 1]), 2);
        assert_eq!(combine_orders(&[2, 2, 1]), 3);
        assert_eq!(combine_orders(&[3]), 3);
    }

    #[test]
    fn test_cable_length() {
        assert_eq!(five_node().cable_length(|_, _| 1.5), 6.0);
        assert_eq!(chain(1).cable_length(|_, _| 1.0), 0.0);
    }

    #[test]
    fn test_path_to_upstream_node_in() {
        let arbor = forked();
        let stops = HashSet::from([2u64]);
        assert_eq!(
            arbor.path_to_upstream_node_in(&6, &stops).unwrap(),
            Some(vec![6, 7, 3, 2])
        );
        // The start node itself does not count as a stop
        assert_eq!(
            arbor.path_to_upstream_node_in(&2, &stops).unwrap(),
            None
        );
        assert!(arbor.path_to_upstream_node_in(&99, &stops).is_err());

        let distance = arbor
            .distance_to_upstream_node_in(&6, |_, _| 2.0, &stops)
            .unwrap();
        assert_eq!(distance, Some(6.0));
    }

    #[test]
    fn test_terminal_cable_length() {
        let terminal = forked().terminal_cable_length(|_, _| 1.0).unwrap();
        // 4 → 3, 6 → 7 → 3, 5 → 2
        assert_eq!(terminal.cable, 4.0);
        assert_eq!(terminal.n_branches, 2);
        assert_eq!(terminal.n_ends, 3);

        let path = chain(4).terminal_cable_length(|_, _| 1.0).unwrap();
        assert_eq!(path.cable, 3.0);
        assert_eq!(path.n_branches, 0);
    }

    #[test]
    fn test_subtrees_end_count() {
        let counts = five_node().subtrees_end_count().unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(sorted(counts[&2].clone()), vec![1, 1]);
        assert_eq!(sorted(counts[&1].clone()), vec![1, 2]);

        let counts = forked().subtrees_end_count().unwrap();
        // Root 1 has a single child and is not a branch
        assert!(!counts.contains_key(&1));
        assert_eq!(sorted(counts[&2].clone()), vec![1, 2]);
        assert_eq!(sorted(counts[&3].clone()), vec![1, 1]);

        let counts = trifurcated().subtrees_end_count().unwrap();
        assert_eq!(counts[&1], vec![1, 1, 1]);
    }

    #[test]
    fn test_subtrees_load_and_cable() {
        let load = HashMap::from([(4u64, 3), (2, 5), (6, 1)]);
        let loads = forked().subtrees_load(&load).unwrap();
        // The branch node's own load stays out of its subtrees
        assert_eq!(sorted(loads[&3].clone()), vec![1, 3]);
        assert_eq!(sorted(loads[&2].clone()), vec![0, 4]);

        let cable = forked().subtrees_cable(|_, _| 1.0).unwrap();
        assert_eq!(sorted(cable[&3].clone()), vec![1.0, 2.0]);
        assert_eq!(sorted(cable[&2].clone()), vec![1.0, 4.0]);
    }

    #[test]
    fn test_asymmetry_index() {
        let balanced = five_node();
        let a = balanced.asymmetry_index().unwrap().unwrap();
        // Node 2: 1 vs 1 → 0. Node 1: 1 vs 2 → 1 / 1
        assert_eq!(a.n_branches, 2);
        assert_eq!(a.mean, 0.5);
        assert_eq!(a.std_dev, 0.5);
        assert_eq!(a.histogram[0], 1);
        assert_eq!(a.histogram[9], 1);

        assert!(chain(5).asymmetry_index().unwrap().is_none());
    }

    #[test]
    fn test_asymmetry_nested_binary() {
        let m = HashMap::from([(1u64, vec![3.0, 1.0, 2.0])]);
        let a = asymmetry(&m, ratio_asymmetry).unwrap();
        // 3 vs 2 → 0.2, then 5 vs 1 → 4 / 6
        assert_eq!(a.n_branches, 2);
        assert!((a.mean - (0.2 + 4.0 / 6.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_cable_and_load_asymmetry() {
        let cable = forked().cable_asymmetry_index(|_, _| 1.0).unwrap().unwrap();
        // 3: 1 vs 2 → 1/3. 2: 1 vs 4 → 3/5
        assert!((cable.mean - (1.0 / 3.0 + 0.6) / 2.0).abs() < 1e-12);

        let load = HashMap::from([(4u64, 1), (5, 1)]);
        let a = five_node().load_asymmetry_index(&load).unwrap().unwrap();
        assert_eq!(a.n_branches, 2);
        // 2: 1 vs 1 → 0. 1: 0 vs 2 → 1
        assert_eq!(a.mean, 0.5);
    }

    #[test]
    fn test_prune_bare_terminal_segments() {
        let mut arbor = five_node();
        let load = HashMap::from([(4u64, 1)]);
        assert_eq!(arbor.prune_bare_terminal_segments(&load), 2);
        assert_eq!(arbor.count_nodes(), 3);
        assert!(!arbor.contains(&3));
        assert!(!arbor.contains(&5));
        assert_eq!(arbor.root(), Some(&1));
        assert!(arbor.validate().is_ok());
    }

    #[test]
    fn test_prune_keeps_loaded_and_unbranched() {
        let mut arbor = forked();
        let load = HashMap::from([(7u64, 2)]);
        // 6 → 7 carries load at 7; 4 and 5 are bare
        assert_eq!(arbor.prune_bare_terminal_segments(&load), 2);
        assert!(arbor.contains(&6));
        assert!(arbor.contains(&7));

        let mut path = chain(3);
        assert_eq!(path.prune_bare_terminal_segments(&HashMap::new()), 0);
        assert_eq!(path.count_nodes(), 3);
    }
}
