//! Core tree data structure.
//!
//! An [`Arbor`] stores a rooted tree as a map from each child to its
//! parent. The root is the single node without a parent and never appears
//! as a key. Everything else (children lists, end nodes, branch points) is
//! derived on demand.

use arbor_core::{ArborError, NodeId, Result};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// A rooted tree over caller-supplied node keys.
///
/// The arbor owns its edge map outright; `clone()` yields an independent
/// copy that can be rerooted or pruned without touching the original.
///
/// Deserializing validates the tree like every other constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Arbor<K: NodeId> {
    /// The parentless node, `None` only while the arbor is empty.
    pub(crate) root: Option<K>,

    /// Edges from child to parent.
    pub(crate) edges: HashMap<K, K>,
}

/// Serialized form of an [`Arbor`], before validation.
#[derive(Deserialize)]
struct ArborParts<K: NodeId> {
    root: Option<K>,
    edges: HashMap<K, K>,
}

impl<'de, K> Deserialize<'de> for Arbor<K>
where
    K: NodeId + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let parts = ArborParts::deserialize(deserializer)?;
        let arbor = Arbor {
            root: parts.root,
            edges: parts.edges,
        };
        arbor.validate().map_err(de::Error::custom)?;
        Ok(arbor)
    }
}

impl<K: NodeId> Default for Arbor<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Branch and end nodes found in a single pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchAndEndNodes<K> {
    /// Nodes with two or more children.
    pub branches: Vec<K>,
    /// Nodes without children, root excluded.
    pub ends: Vec<K>,
}

/// Summary counts for an arbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArborStats {
    pub node_count: usize,
    pub branch_count: usize,
    pub end_count: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Construction
// ─────────────────────────────────────────────────────────────────────────────

impl<K: NodeId> Arbor<K> {
    /// Creates an empty arbor.
    pub fn new() -> Self {
        Self {
            root: None,
            edges: HashMap::new(),
        }
    }

    /// Builds an arbor from `(node, parent)` rows, as served by a tracing
    /// backend. The row without a parent is the root.
    pub fn from_parents<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Option<K>)>,
    {
        let mut arbor = Self::new();
        let mut roots = Vec::new();

        for (node, parent) in rows {
            match parent {
                Some(parent) if parent == node => {
                    return Err(ArborError::malformed(format!("self-loop at {:?}", node)));
                }
                Some(parent) => {
                    arbor.edges.insert(node, parent);
                }
                None => roots.push(node),
            }
        }

        match roots.len() {
            0 if arbor.edges.is_empty() => return Ok(arbor),
            0 => return Err(ArborError::NoRootFound),
            1 => arbor.root = roots.pop(),
            _ => return Err(ArborError::disconnected(roots)),
        }

        arbor.validate()?;
        debug!("Built arbor with {} nodes from parent rows", arbor.count_nodes());
        Ok(arbor)
    }

    /// Adds edges from a flat sequence where each consecutive pair is
    /// `(child, parent)`, then recomputes the root.
    ///
    /// An odd number of elements is rejected rather than truncated. The
    /// resulting structure must be a single tree; otherwise the arbor is
    /// left exactly as it was and the error is returned.
    pub fn add_edges<I>(&mut self, flat: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = K>,
    {
        let mut pairs = Vec::new();
        let mut iter = flat.into_iter();
        while let Some(child) = iter.next() {
            let parent = iter.next().ok_or_else(|| {
                warn!("Edge list has a dangling element {:?}", child);
                ArborError::malformed("edge list has an odd number of elements")
            })?;
            pairs.push((child, parent));
        }
        self.add_edge_pairs(pairs)
    }

    /// Like [`add_edges`](Self::add_edges), mapping every raw element to
    /// its node key first (e.g. extracting an ID field).
    pub fn add_edges_with<T, F>(&mut self, raw: &[T], accessor: F) -> Result<&mut Self>
    where
        F: Fn(&T) -> K,
    {
        if raw.len() % 2 != 0 {
            warn!("Edge list of length {} has a dangling element", raw.len());
            return Err(ArborError::malformed(
                "edge list has an odd number of elements",
            ));
        }
        let pairs = raw
            .chunks_exact(2)
            .map(|pair| (accessor(&pair[0]), accessor(&pair[1])));
        self.add_edge_pairs(pairs)
    }

    /// Adds `(child, parent)` edges, then recomputes the root and validates
    /// the tree. On error the arbor is rolled back.
    pub fn add_edge_pairs<I>(&mut self, pairs: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, K)>,
    {
        let pairs: Vec<(K, K)> = pairs.into_iter().collect();
        if pairs.is_empty() {
            return Ok(self);
        }
        if let Some((node, _)) = pairs.iter().find(|(child, parent)| child == parent) {
            return Err(ArborError::malformed(format!("self-loop at {:?}", node)));
        }

        let previous_root = self.root.clone();
        let mut replaced = Vec::with_capacity(pairs.len());
        for (child, parent) in pairs {
            let old = self.edges.insert(child.clone(), parent);
            replaced.push((child, old));
        }

        match self.find_root() {
            Ok(root) => self.root = Some(root),
            Err(err) => {
                self.roll_back(replaced, previous_root, &err);
                return Err(err);
            }
        }
        self.settle(replaced, previous_root)
    }

    /// Adds a path where every node is the parent of the next one.
    ///
    /// The first node becomes the root unless it already has a parent, so
    /// repeated calls can hang new paths off an existing tree. A path that
    /// closes a loop or leaves the tree in pieces is rolled back.
    pub fn add_path(&mut self, path: &[K]) -> Result<&mut Self> {
        check_path(path)?;
        let previous_root = self.root.clone();
        let replaced = self.insert_path(path);
        self.settle(replaced, previous_root)
    }

    /// Adds a path where every node is the child of the next one.
    ///
    /// The last node becomes the root unless it already has a parent.
    /// Checked and rolled back like [`add_path`](Self::add_path).
    pub fn add_path_reversed(&mut self, path: &[K]) -> Result<&mut Self> {
        check_path(path)?;
        let previous_root = self.root.clone();
        let replaced = self.insert_path_reversed(path);
        self.settle(replaced, previous_root)
    }

    /// Unchecked [`add_path`](Self::add_path). Returns the replaced edges.
    pub(crate) fn insert_path(&mut self, path: &[K]) -> Vec<(K, Option<K>)> {
        let replaced = path
            .windows(2)
            .rev()
            .map(|pair| (pair[1].clone(), self.edges.insert(pair[1].clone(), pair[0].clone())))
            .collect();
        if let Some(first) = path.first() {
            if !self.edges.contains_key(first) {
                self.root = Some(first.clone());
            }
        }
        replaced
    }

    /// Unchecked [`add_path_reversed`](Self::add_path_reversed).
    pub(crate) fn insert_path_reversed(&mut self, path: &[K]) -> Vec<(K, Option<K>)> {
        let replaced = path
            .windows(2)
            .rev()
            .map(|pair| (pair[0].clone(), self.edges.insert(pair[0].clone(), pair[1].clone())))
            .collect();
        if let Some(last) = path.last() {
            if !self.edges.contains_key(last) {
                self.root = Some(last.clone());
            }
        }
        replaced
    }

    /// Validates after an insertion. The previous root must still be part
    /// of the tree. On failure everything is rolled back.
    fn settle(&mut self, replaced: Vec<(K, Option<K>)>, previous_root: Option<K>) -> Result<&mut Self> {
        let outcome = self.validate().and_then(|()| match &previous_root {
            Some(old) if !self.contains(old) => Err(ArborError::disconnected(
                [Some(old), self.root.as_ref()].into_iter().flatten(),
            )),
            _ => Ok(()),
        });
        if let Err(err) = outcome {
            self.roll_back(replaced, previous_root, &err);
            return Err(err);
        }

        debug!("Arbor now has {} nodes", self.count_nodes());
        Ok(self)
    }

    fn roll_back(&mut self, replaced: Vec<(K, Option<K>)>, previous_root: Option<K>, err: &ArborError) {
        warn!("Rejected {} edges: {}", replaced.len(), err);
        for (child, old) in replaced.into_iter().rev() {
            match old {
                Some(parent) => {
                    self.edges.insert(child, parent);
                }
                None => {
                    self.edges.remove(&child);
                }
            }
        }
        self.root = previous_root;
    }
}

fn check_path<K: NodeId>(path: &[K]) -> Result<()> {
    if path.is_empty() {
        return Err(ArborError::malformed("path is empty"));
    }
    if let Some(pair) = path.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(ArborError::malformed(format!("self-loop at {:?}", pair[0])));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Root handling
// ─────────────────────────────────────────────────────────────────────────────

impl<K: NodeId> Arbor<K> {
    /// The root node, if any.
    pub fn root(&self) -> Option<&K> {
        self.root.as_ref()
    }

    /// The child → parent map.
    pub fn edges(&self) -> &HashMap<K, K> {
        &self.edges
    }

    /// The parent of a node; `None` for the root and unknown nodes.
    pub fn parent(&self, node: &K) -> Option<&K> {
        self.edges.get(node)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.edges.is_empty()
    }

    /// Whether the node is the root or has a parent in this arbor.
    pub fn contains(&self, node: &K) -> bool {
        self.root.as_ref() == Some(node) || self.edges.contains_key(node)
    }

    /// Finds the single parent that has no parent itself.
    ///
    /// With no edges the current root is returned. Fails when every node
    /// has a parent (a loop) or when several nodes compete for the root.
    pub fn find_root(&self) -> Result<K> {
        if self.edges.is_empty() {
            return self.root.clone().ok_or(ArborError::NoRootFound);
        }

        let mut candidates: Vec<&K> = self
            .edges
            .values()
            .filter(|parent| !self.edges.contains_key(*parent))
            .collect();
        candidates.sort();
        candidates.dedup();

        match candidates.as_slice() {
            [] => Err(ArborError::NoRootFound),
            [root] => Ok((*root).clone()),
            many => Err(ArborError::disconnected(many)),
        }
    }

    /// Nodes from `node` up to the root, both included.
    ///
    /// Walks at most `count_nodes()` steps and reports a loop beyond that.
    pub fn path_to_root(&self, node: &K) -> Result<Vec<K>> {
        if !self.contains(node) {
            return Err(ArborError::node_not_found(node));
        }
        let limit = self.count_nodes();
        let mut path = vec![node.clone()];
        let mut current = node;
        while let Some(parent) = self.edges.get(current) {
            if path.len() >= limit {
                return Err(ArborError::cyclic(parent));
            }
            path.push(parent.clone());
            current = parent;
        }
        Ok(path)
    }

    /// Re-orients the tree so that `new_root` becomes its root.
    ///
    /// Only the edges on the path between the old and the new root change
    /// direction.
    pub fn reroot(&mut self, new_root: &K) -> Result<&mut Self> {
        if !self.contains(new_root) {
            return Err(ArborError::node_not_found(new_root));
        }
        if self.root.as_ref() == Some(new_root) {
            return Ok(self);
        }

        let path = self.path_to_root(new_root)?;
        for child in &path[..path.len() - 1] {
            self.edges.remove(child);
        }
        debug!("Rerooted at {:?}, reversed {} edges", new_root, path.len() - 1);
        self.insert_path(&path);
        Ok(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Derived views
// ─────────────────────────────────────────────────────────────────────────────

impl<K: NodeId> Arbor<K> {
    /// Nodes without children, excluding the root.
    pub fn find_end_nodes(&self) -> Vec<K> {
        let parents: HashSet<&K> = self.edges.values().collect();
        self.edges
            .keys()
            .filter(|child| !parents.contains(child))
            .cloned()
            .collect()
    }

    /// Maps every node to its children. End nodes map to an empty list.
    ///
    /// The order within a list is unspecified.
    pub fn all_successors(&self) -> HashMap<K, Vec<K>> {
        let mut successors: HashMap<K, Vec<K>> = HashMap::with_capacity(self.edges.len() + 1);
        if let Some(root) = &self.root {
            successors.insert(root.clone(), Vec::new());
        }
        for (child, parent) in &self.edges {
            successors
                .entry(parent.clone())
                .or_default()
                .push(child.clone());
            successors.entry(child.clone()).or_default();
        }
        successors
    }

    /// Nodes with two or more children.
    pub fn find_branch_nodes(&self) -> Vec<K> {
        self.child_counts()
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(node, _)| node.clone())
            .collect()
    }

    /// Branch nodes and end nodes at once.
    pub fn find_branch_and_end_nodes(&self) -> BranchAndEndNodes<K> {
        let counts = self.child_counts();
        let ends = self
            .edges
            .keys()
            .filter(|child| !counts.contains_key(child))
            .cloned()
            .collect();
        let branches = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(node, _)| node.clone())
            .collect();
        BranchAndEndNodes { branches, ends }
    }

    fn child_counts(&self) -> HashMap<&K, usize> {
        let mut counts: HashMap<&K, usize> = HashMap::new();
        for parent in self.edges.values() {
            *counts.entry(parent).or_insert(0) += 1;
        }
        counts
    }

    /// Direct children of one node. Scans every edge: use
    /// [`all_successors`](Self::all_successors) for repeated lookups.
    pub fn successors(&self, node: &K) -> Vec<K> {
        self.edges
            .iter()
            .filter(|(_, parent)| *parent == node)
            .map(|(child, _)| child.clone())
            .collect()
    }

    /// Children plus the parent of one node.
    pub fn neighbors(&self, node: &K) -> Vec<K> {
        let mut neighbors: Vec<K> = self.parent(node).cloned().into_iter().collect();
        neighbors.extend(self.successors(node));
        neighbors
    }

    /// Maps every node to its children and its parent.
    pub fn all_neighbors(&self) -> HashMap<K, Vec<K>> {
        let mut neighbors: HashMap<K, Vec<K>> = HashMap::with_capacity(self.edges.len() + 1);
        if let Some(root) = &self.root {
            neighbors.insert(root.clone(), Vec::new());
        }
        for (child, parent) in &self.edges {
            neighbors
                .entry(child.clone())
                .or_default()
                .push(parent.clone());
            neighbors
                .entry(parent.clone())
                .or_default()
                .push(child.clone());
        }
        neighbors
    }

    /// The first branch node at or below `node`, following single-child
    /// chains. `None` when an end node is reached first.
    pub fn next_branch_node(&self, node: &K) -> Result<Option<K>> {
        if !self.contains(node) {
            return Err(ArborError::node_not_found(node));
        }
        let successors = self.all_successors();
        let mut current = node;
        for _ in 0..self.count_nodes() {
            match children_of(&successors, current) {
                [] => return Ok(None),
                [only] => current = only,
                _ => return Ok(Some(current.clone())),
            }
        }
        Err(ArborError::cyclic(current))
    }

    /// All nodes as a set.
    pub fn nodes(&self) -> HashSet<K> {
        self.nodes_array().into_iter().collect()
    }

    /// All nodes as a list, root last.
    pub fn nodes_array(&self) -> Vec<K> {
        let mut nodes: Vec<K> = self.edges.keys().cloned().collect();
        nodes.extend(self.root.iter().cloned());
        nodes
    }

    /// Number of nodes: one per edge plus the root.
    pub fn count_nodes(&self) -> usize {
        self.edges.len() + usize::from(self.root.is_some())
    }

    /// Node, branch and end counts.
    pub fn stats(&self) -> ArborStats {
        let be = self.find_branch_and_end_nodes();
        ArborStats {
            node_count: self.count_nodes(),
            branch_count: be.branches.len(),
            end_count: be.ends.len(),
        }
    }

    /// A new arbor holding `new_root` and everything downstream of it.
    pub fn sub_arbor(&self, new_root: &K) -> Result<Arbor<K>> {
        if !self.contains(new_root) {
            return Err(ArborError::node_not_found(new_root));
        }
        let successors = self.all_successors();
        let mut sub = Arbor::new();
        sub.root = Some(new_root.clone());

        let mut open = VecDeque::from([new_root]);
        while let Some(parent) = open.pop_front() {
            for child in children_of(&successors, parent) {
                if child == new_root || sub.edges.insert(child.clone(), parent.clone()).is_some() {
                    return Err(ArborError::cyclic(child));
                }
                open.push_back(child);
            }
        }
        Ok(sub)
    }
}

/// Children of `node` in a successor map, empty when unknown.
pub(crate) fn children_of<'a, K: NodeId>(successors: &'a HashMap<K, Vec<K>>, node: &K) -> &'a [K] {
    successors.get(node).map(Vec::as_slice).unwrap_or(&[])
}
