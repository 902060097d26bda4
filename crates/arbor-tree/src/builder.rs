//! Builder for turning compact-skeleton payloads into arbors.
//!
//! The builder collects treenode and connector rows, possibly from several
//! payloads, and builds the arbor in one validating pass at the end.

use crate::arbor::Arbor;
use arbor_core::{CompactSkeleton, Point3, Result, SynapseCounts, TreenodeId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// An arbor together with what the payload said about its nodes.
#[derive(Debug, Clone)]
pub struct ParsedSkeleton {
    pub arbor: Arbor<TreenodeId>,
    pub positions: HashMap<TreenodeId, Point3>,
    pub synapses: SynapseCounts,
}

impl ParsedSkeleton {
    /// Euclidean distance between two treenodes, 0 when either position is
    /// unknown.
    pub fn distance(&self, a: &TreenodeId, b: &TreenodeId) -> f64 {
        match (self.positions.get(a), self.positions.get(b)) {
            (Some(pa), Some(pb)) => pa.distance_to(pb),
            _ => 0.0,
        }
    }

    /// Total cable length of the arbor.
    pub fn cable_length(&self) -> f64 {
        self.arbor.cable_length(|child, parent| self.distance(child, parent))
    }

    /// Inputs and outputs added up per treenode.
    pub fn synapse_map(&self) -> HashMap<TreenodeId, u32> {
        let mut map = self.synapses.inputs.clone();
        for (node, count) in &self.synapses.outputs {
            *map.entry(*node).or_insert(0) += count;
        }
        map
    }
}

/// Builds an [`Arbor`] from compact-skeleton rows.
pub struct ArborBuilder {
    parents: Vec<(TreenodeId, Option<TreenodeId>)>,
    positions: HashMap<TreenodeId, Point3>,
    synapses: SynapseCounts,
    /// Drop synapses on treenodes that did not make it into the arbor.
    only_in_arbor: bool,
}

impl Default for ArborBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArborBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            parents: Vec::new(),
            positions: HashMap::new(),
            synapses: SynapseCounts::default(),
            only_in_arbor: false,
        }
    }

    /// Only count synapses on treenodes that belong to the built arbor.
    pub fn with_synapses_in_arbor_only(mut self) -> Self {
        self.only_in_arbor = true;
        self
    }

    /// Adds the rows of one payload.
    pub fn add_skeleton(&mut self, skeleton: &CompactSkeleton) -> &mut Self {
        self.parents.extend(skeleton.parent_rows());
        self.positions.extend(skeleton.positions());

        let synapses = skeleton.synapses();
        merge_counts(&mut self.synapses.inputs, synapses.inputs);
        merge_counts(&mut self.synapses.outputs, synapses.outputs);
        self.synapses.n_inputs += synapses.n_inputs;
        self.synapses.n_outputs += synapses.n_outputs;
        self
    }

    /// Finishes building: validates the tree and attaches positions and
    /// synapse counts.
    pub fn build(self) -> Result<ParsedSkeleton> {
        let arbor = Arbor::from_parents(self.parents)?;
        let mut synapses = self.synapses;

        if self.only_in_arbor {
            let before = synapses.n_inputs + synapses.n_outputs;
            synapses.inputs.retain(|node, _| arbor.contains(node));
            synapses.outputs.retain(|node, _| arbor.contains(node));
            synapses.n_inputs = synapses.inputs.values().sum();
            synapses.n_outputs = synapses.outputs.values().sum();
            let dropped = before - synapses.n_inputs - synapses.n_outputs;
            if dropped > 0 {
                warn!("Dropped {} synapses on treenodes outside the arbor", dropped);
            }
        }

        debug!(
            "Built skeleton: {} nodes, {} inputs, {} outputs",
            arbor.count_nodes(),
            synapses.n_inputs,
            synapses.n_outputs
        );
        Ok(ParsedSkeleton {
            arbor,
            positions: self.positions,
            synapses,
        })
    }

    /// Builds the arbor alone, without positions or synapses.
    pub fn build_arbor_only(self) -> Result<Arbor<TreenodeId>> {
        Arbor::from_parents(self.parents)
    }
}

fn merge_counts(into: &mut HashMap<TreenodeId, u32>, from: HashMap<TreenodeId, u32>) {
    for (node, count) in from {
        *into.entry(node).or_insert(0) += count;
    }
}
