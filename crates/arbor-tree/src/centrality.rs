//! Centrality measures over the undirected tree.
//!
//! All three measures are driven by [`partition_sorted`], so every subtree
//! is summed before the chain that carries its branch node further up.
//!
//! [`partition_sorted`]: Arbor::partition_sorted

use crate::arbor::Arbor;
use arbor_core::{NodeId, Result};
use std::collections::HashMap;
use tracing::debug;

impl<K: NodeId> Arbor<K> {
    /// Number of paths between other nodes that travel through each node.
    ///
    /// Edges are treated as undirected. A slab node with `c` nodes below
    /// it lies on `c · (n − c − 1)` paths; a branch node lies on every path
    /// joining two of its groups (each subtree plus the upstream part).
    /// The root is always reported as 0.
    ///
    /// With `normalized` every value is scaled by `1 / ((n − 1)(n − 2))`,
    /// which is skipped for arbors of fewer than three nodes.
    pub fn betweenness_centrality(&self, normalized: bool) -> Result<HashMap<K, f64>> {
        let n_nodes = self.count_nodes() as u64;
        let mut centrality: HashMap<K, f64> = HashMap::with_capacity(self.count_nodes());

        // Sizes of the subtrees hanging from a node, filled in by the
        // shorter chains that close on it.
        let mut groups: HashMap<K, Vec<u64>> = HashMap::new();

        for mut chain in self.partition_sorted()? {
            let Some(anchor) = chain.pop() else {
                continue;
            };
            let mut cumulative = 0u64;
            for node in chain {
                let paths = match groups.get_mut(&node) {
                    Some(group) => {
                        let other: u64 = group.iter().sum();
                        group.push(cumulative);
                        group.push(n_nodes - cumulative - other - 1);
                        cumulative += other;
                        pair_products(group)
                    }
                    None => cumulative * (n_nodes - cumulative - 1),
                };
                centrality.insert(node, paths as f64);
                cumulative += 1;
            }
            groups.entry(anchor).or_default().push(cumulative);
        }

        if normalized && n_nodes > 2 {
            let k = 1.0 / ((n_nodes - 1) * (n_nodes - 2)) as f64;
            for value in centrality.values_mut() {
                *value *= k;
            }
        }
        if let Some(root) = &self.root {
            centrality.insert(root.clone(), 0.0);
        }

        debug!("Betweenness centrality over {} nodes", n_nodes);
        Ok(centrality)
    }

    /// Approximate centrality computed on the [`topological_copy`].
    ///
    /// Every node of a slab except its first takes the mean of the slab's
    /// endpoint centralities, so a branch node carries the value of the
    /// slab ending at it. The root is always 0.
    ///
    /// [`topological_copy`]: Self::topological_copy
    pub fn slab_centrality(&self, normalized: bool) -> Result<HashMap<K, f64>> {
        let topo = self.topological_copy();
        let tc = topo.betweenness_centrality(normalized)?;
        let at = |node: &K| tc.get(node).copied().unwrap_or(0.0);

        let mut sc = HashMap::with_capacity(self.count_nodes());
        for slab in self.slabs() {
            let (Some(first), Some(last)) = (slab.first(), slab.last()) else {
                continue;
            };
            let c = (at(first) + at(last)) / 2.0;
            for node in slab.iter().skip(1) {
                sc.insert(node.clone(), c);
            }
        }
        if let Some(root) = &self.root {
            sc.insert(root.clone(), 0.0);
        }

        debug!(
            "Slab centrality over {} nodes from {} topological nodes",
            sc.len(),
            topo.count_nodes()
        );
        Ok(sc)
    }

    /// Synaptic flow across the edge above each node: the number of
    /// input → output paths crossing it, divided by the number of outputs.
    ///
    /// `outputs` and `inputs` map nodes to their synapse counts. Returns
    /// `None` when either total is zero. When the root is a branch node the
    /// computation runs on a copy rerooted at the smallest end node, so
    /// that the old root gets an edge of its own.
    pub fn flow_centrality(
        &self,
        outputs: &HashMap<K, u32>,
        inputs: &HashMap<K, u32>,
    ) -> Result<Option<HashMap<K, f64>>> {
        let total_outputs: u64 = outputs.values().map(|&n| u64::from(n)).sum();
        let total_inputs: u64 = inputs.values().map(|&n| u64::from(n)).sum();
        if total_outputs == 0 || total_inputs == 0 {
            debug!(
                "Flow centrality not computable: {} outputs, {} inputs",
                total_outputs, total_inputs
            );
            return Ok(None);
        }

        let rerooted;
        let mut arbor = self;
        if let Some(root) = &self.root {
            let be = self.find_branch_and_end_nodes();
            if be.branches.contains(root) {
                if let Some(end) = be.ends.iter().min() {
                    let mut copy = self.clone();
                    copy.reroot(end)?;
                    rerooted = copy;
                    arbor = &rerooted;
                }
            }
        }

        let own = |node: &K| {
            let count = |map: &HashMap<K, u32>| u64::from(map.get(node).copied().unwrap_or(0));
            (count(inputs), count(outputs))
        };
        let flow = |(seen_in, seen_out): (u64, u64)| {
            let paths = seen_in * (total_outputs - seen_out) + seen_out * (total_inputs - seen_in);
            paths as f64 / total_outputs as f64
        };

        let chains = arbor.partition_sorted()?;
        let mut pending: HashMap<&K, (u64, u64)> = HashMap::new();
        let mut centrality = HashMap::with_capacity(arbor.count_nodes());
        for chain in &chains {
            let Some((anchor, inner)) = chain.split_last() else {
                continue;
            };
            let mut seen = (0, 0);
            for node in inner {
                let (i, o) = own(node);
                let (pi, po) = pending.get(node).copied().unwrap_or((0, 0));
                seen = (seen.0 + i + pi, seen.1 + o + po);
                centrality.insert(node.clone(), flow(seen));
            }
            let entry = pending.entry(anchor).or_insert((0, 0));
            entry.0 += seen.0;
            entry.1 += seen.1;
        }
        if let Some(root) = &arbor.root {
            let (i, o) = own(root);
            let (pi, po) = pending.get(root).copied().unwrap_or((0, 0));
            centrality.insert(root.clone(), flow((i + pi, o + po)));
        }

        Ok(Some(centrality))
    }
}

/// Sum of `g[i] * g[k]` over all pairs `i < k`.
fn pair_products(group: &[u64]) -> u64 {
    let sum: u64 = group.iter().sum();
    let squares: u64 = group.iter().map(|g| g * g).sum();
    (sum * sum - squares) / 2
}
