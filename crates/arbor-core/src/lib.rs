//! Arbor Core - Shared vocabulary for skeleton analysis
//!
//! This crate holds what every other Arbor crate agrees on:
//!
//! - [`NodeId`]: the bound a node identifier has to satisfy
//! - [`ArborError`]: the error taxonomy for tree construction and queries
//! - [`CompactSkeleton`]: the compact-skeleton payload a tracing backend
//!   hands out, parsed into typed rows
//!
//! The tree structure itself lives in `arbor-tree`.
//!
//! # Example
//!
//! ```
//! use arbor_core::CompactSkeleton;
//!
//! let json = r#"[[[1, null, 3, 0.0, 0.0, 0.0, -1.0, 5],
//!                 [2, 1, 3, 3.0, 4.0, 0.0, -1.0, 5]],
//!                [[2, 100, 0, 3.0, 4.0, 0.0]]]"#;
//!
//! let skeleton = CompactSkeleton::from_json_str(json).unwrap();
//! assert_eq!(skeleton.nodes.len(), 2);
//! assert_eq!(skeleton.synapses().n_outputs, 1);
//! ```

mod error;
mod geometry;
mod node;
pub mod skeleton;

pub use error::{ArborError, Result};
pub use geometry::Point3;
pub use node::NodeId;
pub use skeleton::{CompactSkeleton, ConnectorRow, Relation, SynapseCounts, TreenodeId, TreenodeRow};
