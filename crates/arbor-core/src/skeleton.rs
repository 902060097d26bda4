//! Compact-skeleton payloads.
//!
//! A tracing backend serves a skeleton as a JSON array whose first element
//! holds the treenode rows and whose second element holds the connector
//! rows. Rows are positional arrays:
//!
//! ```text
//! treenode:  [id, parent_id | null, user_id, x, y, z, radius, confidence]
//! connector: [treenode_id, connector_id, relation, x, y, z]
//! ```
//!
//! Any further top-level elements (tags, history) are ignored here.

use crate::error::{ArborError, Result};
use crate::geometry::Point3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, warn};

/// Identifier of a treenode as issued by the backend.
pub type TreenodeId = i64;

const DEFAULT_RADIUS: f64 = -1.0;
const DEFAULT_CONFIDENCE: i64 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// One traced point of the skeleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreenodeRow {
    pub id: TreenodeId,
    /// `None` marks the root.
    pub parent: Option<TreenodeId>,
    pub user_id: i64,
    pub position: Point3,
    pub radius: f64,
    pub confidence: i64,
}

/// How a connector attaches to a treenode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// The treenode is presynaptic: an output site.
    Presynaptic,
    /// The treenode is postsynaptic: an input site.
    Postsynaptic,
    /// Gap junctions, abutting and other non-synaptic links.
    Other(i64),
}

impl Relation {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Relation::Presynaptic,
            1 => Relation::Postsynaptic,
            other => Relation::Other(other),
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::Presynaptic => write!(f, "presynaptic"),
            Relation::Postsynaptic => write!(f, "postsynaptic"),
            Relation::Other(code) => write!(f, "relation {}", code),
        }
    }
}

/// A connector link on one treenode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorRow {
    pub treenode_id: TreenodeId,
    pub connector_id: i64,
    pub relation: Relation,
    pub position: Point3,
}

/// Per-treenode synapse counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynapseCounts {
    /// Postsynaptic sites per treenode.
    pub inputs: HashMap<TreenodeId, u32>,
    /// Presynaptic sites per treenode.
    pub outputs: HashMap<TreenodeId, u32>,
    pub n_inputs: u32,
    pub n_outputs: u32,
}

/// A parsed compact-skeleton payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactSkeleton {
    pub nodes: Vec<TreenodeRow>,
    pub connectors: Vec<ConnectorRow>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

impl CompactSkeleton {
    /// Parses a payload from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parses a payload from any reader, e.g. an open file.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_value(&value)
    }

    /// Parses an already decoded JSON value.
    pub fn from_value(value: &Value) -> Result<Self> {
        let parts = value
            .as_array()
            .ok_or_else(|| ArborError::malformed("skeleton payload must be a JSON array"))?;

        let node_rows = match parts.first() {
            Some(rows) => rows_of(rows, "treenode")?,
            None => return Err(ArborError::malformed("skeleton payload has no treenode rows")),
        };
        let connector_rows = match parts.get(1) {
            Some(rows) => rows_of(rows, "connector")?,
            None => Vec::new(),
        };

        let nodes = node_rows
            .iter()
            .enumerate()
            .map(|(i, row)| TreenodeRow::from_values(row).map_err(|e| at_row(e, "treenode", i)))
            .collect::<Result<Vec<_>>>()?;
        let connectors = connector_rows
            .iter()
            .enumerate()
            .map(|(i, row)| ConnectorRow::from_values(row).map_err(|e| at_row(e, "connector", i)))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Parsed compact skeleton: {} treenodes, {} connector links",
            nodes.len(),
            connectors.len()
        );

        Ok(Self { nodes, connectors })
    }

    /// `(node, parent)` pairs, ready for tree construction.
    pub fn parent_rows(&self) -> impl Iterator<Item = (TreenodeId, Option<TreenodeId>)> + '_ {
        self.nodes.iter().map(|row| (row.id, row.parent))
    }

    /// Position of every treenode.
    pub fn positions(&self) -> HashMap<TreenodeId, Point3> {
        self.nodes.iter().map(|row| (row.id, row.position)).collect()
    }

    /// Counts synaptic sites per treenode, ignoring non-synaptic relations.
    pub fn synapses(&self) -> SynapseCounts {
        let mut counts = SynapseCounts::default();
        for row in &self.connectors {
            match row.relation {
                Relation::Presynaptic => {
                    *counts.outputs.entry(row.treenode_id).or_insert(0) += 1;
                    counts.n_outputs += 1;
                }
                Relation::Postsynaptic => {
                    *counts.inputs.entry(row.treenode_id).or_insert(0) += 1;
                    counts.n_inputs += 1;
                }
                Relation::Other(_) => {}
            }
        }
        counts
    }
}

impl TreenodeRow {
    fn from_values(row: &[Value]) -> Result<Self> {
        if row.len() < 6 {
            return Err(ArborError::malformed(format!(
                "expected at least 6 fields, found {}",
                row.len()
            )));
        }
        let parent = match &row[1] {
            Value::Null => None,
            _ => Some(int_at(row, 1, "parent_id")?),
        };
        Ok(Self {
            id: int_at(row, 0, "id")?,
            parent,
            user_id: int_at(row, 2, "user_id")?,
            position: point_at(row, 3)?,
            radius: match row.get(6) {
                Some(_) => float_at(row, 6, "radius")?,
                None => DEFAULT_RADIUS,
            },
            confidence: match row.get(7) {
                Some(_) => int_at(row, 7, "confidence")?,
                None => DEFAULT_CONFIDENCE,
            },
        })
    }
}

impl ConnectorRow {
    fn from_values(row: &[Value]) -> Result<Self> {
        if row.len() < 6 {
            return Err(ArborError::malformed(format!(
                "expected 6 fields, found {}",
                row.len()
            )));
        }
        let relation = Relation::from_code(int_at(row, 2, "relation")?);
        if let Relation::Other(code) = relation {
            warn!("Connector link with non-synaptic relation {}", code);
        }
        Ok(Self {
            treenode_id: int_at(row, 0, "treenode_id")?,
            connector_id: int_at(row, 1, "connector_id")?,
            relation,
            position: point_at(row, 3)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn rows_of<'a>(value: &'a Value, what: &str) -> Result<Vec<&'a [Value]>> {
    let rows = value
        .as_array()
        .ok_or_else(|| ArborError::malformed(format!("{} rows must be an array", what)))?;
    rows.iter()
        .map(|row| {
            row.as_array()
                .map(|r| r.as_slice())
                .ok_or_else(|| ArborError::malformed(format!("{} row must be an array", what)))
        })
        .collect()
}

fn int_at(row: &[Value], index: usize, field: &str) -> Result<i64> {
    row[index]
        .as_i64()
        .ok_or_else(|| ArborError::malformed(format!("field {} is not an integer", field)))
}

fn float_at(row: &[Value], index: usize, field: &str) -> Result<f64> {
    row[index]
        .as_f64()
        .ok_or_else(|| ArborError::malformed(format!("field {} is not a number", field)))
}

fn point_at(row: &[Value], index: usize) -> Result<Point3> {
    Ok(Point3::new(
        float_at(row, index, "x")?,
        float_at(row, index + 1, "y")?,
        float_at(row, index + 2, "z")?,
    ))
}

fn at_row(err: ArborError, what: &str, index: usize) -> ArborError {
    match err {
        ArborError::MalformedInput(msg) => {
            ArborError::MalformedInput(format!("{} row {}: {}", what, index, msg))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PAYLOAD: &str = r#"[
        [[1, null, 3, 0.0, 0.0, 0.0, -1.0, 5],
         [2, 1, 3, 10.0, 0.0, 0.0, 25.5, 5],
         [3, 2, 4, 10, 10, 0]],
        [[2, 500, 0, 10.0, 0.0, 0.0],
         [3, 501, 1, 10.0, 10.0, 0.0],
         [3, 502, 1, 10.0, 10.0, 0.0],
         [1, 503, 2, 0.0, 0.0, 0.0]],
        {}
    ]"#;

    #[test]
    fn test_parse_rows() {
        let skeleton = CompactSkeleton::from_json_str(PAYLOAD).unwrap();
        assert_eq!(skeleton.nodes.len(), 3);
        assert_eq!(skeleton.connectors.len(), 4);

        let root = &skeleton.nodes[0];
        assert_eq!(root.parent, None);
        assert_eq!(root.radius, -1.0);

        let second = &skeleton.nodes[1];
        assert_eq!(second.parent, Some(1));
        assert_eq!(second.radius, 25.5);
        assert_eq!(second.position, Point3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_short_treenode_row_gets_defaults() {
        let skeleton = CompactSkeleton::from_json_str(PAYLOAD).unwrap();
        let third = &skeleton.nodes[2];
        assert_eq!(third.user_id, 4);
        assert_eq!(third.radius, DEFAULT_RADIUS);
        assert_eq!(third.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_parent_rows_and_positions() {
        let skeleton = CompactSkeleton::from_json_str(PAYLOAD).unwrap();
        let rows: Vec<_> = skeleton.parent_rows().collect();
        assert_eq!(rows, vec![(1, None), (2, Some(1)), (3, Some(2))]);

        let positions = skeleton.positions();
        assert_eq!(positions[&3], Point3::new(10.0, 10.0, 0.0));
    }

    #[test]
    fn test_synapse_counts_skip_other_relations() {
        let skeleton = CompactSkeleton::from_json_str(PAYLOAD).unwrap();
        let synapses = skeleton.synapses();
        assert_eq!(synapses.n_outputs, 1);
        assert_eq!(synapses.n_inputs, 2);
        assert_eq!(synapses.outputs.get(&2), Some(&1));
        assert_eq!(synapses.inputs.get(&3), Some(&2));
        assert!(!synapses.inputs.contains_key(&1));
    }

    #[test]
    fn test_missing_connectors_is_fine() {
        let skeleton = CompactSkeleton::from_json_str("[[[7, null, 1, 0, 0, 0]]]").unwrap();
        assert_eq!(skeleton.nodes.len(), 1);
        assert!(skeleton.connectors.is_empty());
    }

    #[test]
    fn test_malformed_rows_are_rejected() {
        let err = CompactSkeleton::from_json_str(r#"{"nodes": []}"#).unwrap_err();
        assert!(matches!(err, ArborError::MalformedInput(_)));

        let err = CompactSkeleton::from_json_str("[[[1, null, 3]]]").unwrap_err();
        assert!(err.to_string().contains("treenode row 0"));

        let err = CompactSkeleton::from_json_str(r#"[[[1, "x", 3, 0, 0, 0]]]"#).unwrap_err();
        assert!(err.to_string().contains("parent_id"));

        let err = CompactSkeleton::from_json_str("[[[1, null").unwrap_err();
        assert!(matches!(err, ArborError::Json(_)));
    }

    #[test]
    fn test_from_reader() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PAYLOAD.as_bytes()).unwrap();

        let reader = std::fs::File::open(file.path()).unwrap();
        let skeleton = CompactSkeleton::from_reader(reader).unwrap();
        assert_eq!(skeleton.nodes.len(), 3);
    }
}
