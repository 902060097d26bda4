//! Arbor Tree - Rooted trees for skeleton analysis
//!
//! This crate holds the [`Arbor`]: a rooted tree stored as a child → parent
//! map, plus the analyses run on traced neuron skeletons.
//!
//! # Architecture
//!
//! Most bottom-up analyses share one traversal: the arbor is split into
//! chains running from each end node toward the root, and the chains are
//! visited shortest first so every subtree is complete before its branch
//! node is passed. On top of that sit:
//! - Construction, rerooting and derived views (end, branch, successors)
//! - Partitioning and spanning trees
//! - Betweenness, slab and flow centrality
//! - Topological reduction, slabs, Strahler order and asymmetry measures
//!
//! # Example
//!
//! ```
//! use arbor_tree::Arbor;
//!
//! let mut arbor = Arbor::new();
//! arbor.add_edges([2u64, 1, 3, 1, 4, 2, 5, 2]).unwrap();
//!
//! assert_eq!(arbor.root(), Some(&1));
//! assert_eq!(arbor.count_nodes(), 5);
//!
//! let centrality = arbor.betweenness_centrality(false).unwrap();
//! assert_eq!(centrality[&2], 5.0);
//! ```

mod arbor;
mod builder;
mod centrality;
mod distance;
mod edge;
mod measure;
mod partition;
mod topology;
mod validate;

pub use arbor::{Arbor, ArborStats, BranchAndEndNodes};
pub use builder::{ArborBuilder, ParsedSkeleton};
pub use distance::NodeDistances;
pub use edge::{ArborExport, Edge};
pub use measure::{asymmetry, Asymmetry, TerminalCable};

pub use arbor_core::{ArborError, NodeId, Result};
