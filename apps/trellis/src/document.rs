//! # Graph Documents
//!
//! The JSON file format the CLI reads and writes.
//!
//! ```json
//! {
//!   "nodes": [{ "index": 0, "attributes": { "age": 30 } }],
//!   "edges": [{ "source": 0, "target": 1, "attributes": {} }],
//!   "groups": [{ "name": "patients", "nodes": [0], "edges": [0] }]
//! }
//! ```
//!
//! Edges have no explicit index: their position in `edges` is their index,
//! and group edge lists refer to those positions. Saving a session with
//! gaps in its edge indices therefore renumbers them densely.
//!
//! Attribute names are JSON object keys, so they are always strings on
//! disk. Attribute and group names that read as integers load as integer
//! names, the same way the CLI parses its arguments.

use crate::error::CliError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use trellis_core::{
    Attribute, Attributes, EdgeIndex, Graph, GraphStore, Group, NodeIndex, Plugin, Session,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub index: NodeIndex,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: NodeIndex,
    pub target: NodeIndex,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: Group,
    #[serde(default)]
    pub nodes: Vec<NodeIndex>,
    /// Positions in the document's `edges` list.
    #[serde(default)]
    pub edges: Vec<usize>,
}

impl GraphDocument {
    /// Read a document from disk.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the document as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        std::fs::write(path, text).map_err(|e| CliError::io(path, e))
    }

    /// Snapshot a session.
    pub fn from_session(session: &Session) -> Result<Self, CliError> {
        let store = session.store();

        let nodes = store
            .node_attributes(&store.node_indices())?
            .into_iter()
            .map(|(index, attributes)| NodeRecord { index, attributes })
            .collect();

        let edge_indices = store.edge_indices();
        let positions: BTreeMap<EdgeIndex, usize> = edge_indices
            .iter()
            .enumerate()
            .map(|(position, edge)| (*edge, position))
            .collect();
        let mut edge_attributes = store.edge_attributes(&edge_indices)?;
        let mut edges = Vec::with_capacity(edge_indices.len());
        for edge in &edge_indices {
            let (source, target) = store.edge_endpoints(edge)?;
            edges.push(EdgeRecord {
                source,
                target,
                attributes: edge_attributes.remove(edge).unwrap_or_default(),
            });
        }

        let mut groups = Vec::new();
        for name in store.groups() {
            let nodes = store.nodes_in_group(&name)?;
            let edges = store
                .edges_in_group(&name)?
                .iter()
                .filter_map(|edge| positions.get(edge).copied())
                .collect();
            groups.push(GroupRecord { name, nodes, edges });
        }

        Ok(Self {
            nodes,
            edges,
            groups,
        })
    }

    /// Build a session over an in-memory graph holding this document.
    ///
    /// The graph is filled before the plugins are attached, so loading
    /// fires no hooks.
    pub fn into_session(self, plugins: Vec<Box<dyn Plugin>>) -> Result<Session, CliError> {
        let mut graph = Graph::new();
        graph.add_nodes(
            self.nodes
                .into_iter()
                .map(|record| (record.index, normalize(record.attributes)))
                .collect(),
            None,
        )?;
        let edges = graph.add_edges(
            self.edges
                .into_iter()
                .map(|record| (record.source, record.target, normalize(record.attributes)))
                .collect(),
            None,
        )?;
        for group in self.groups {
            let name = normalize_name(group.name);
            let members = group
                .edges
                .iter()
                .map(|position| {
                    edges.get(*position).copied().ok_or_else(|| {
                        CliError::Argument(format!(
                            "group {name} refers to edge {position}, the document has {}",
                            edges.len()
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            graph.add_group(name, Some(&group.nodes), Some(&members))?;
        }
        Ok(Session::with_plugins(graph, plugins)?)
    }
}

fn normalize(attributes: Attributes) -> Attributes {
    attributes
        .into_iter()
        .map(|(name, value)| (normalize_name(name), value))
        .collect()
}

/// Read integer-looking string names as integers.
fn normalize_name(name: Attribute) -> Attribute {
    match name {
        Attribute::String(text) => Attribute::parse(&text),
        other => other,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::Value;

    const SAMPLE: &str = r#"{
        "nodes": [
            { "index": 0, "attributes": { "age": 30, "7": "seven" } },
            { "index": "b", "attributes": {} }
        ],
        "edges": [{ "source": 0, "target": "b", "attributes": { "w": 1.5 } }],
        "groups": [{ "name": "g", "nodes": ["b"], "edges": [0] }]
    }"#;

    #[test]
    fn load_sample_document() {
        let document: GraphDocument = serde_json::from_str(SAMPLE).expect("parse");
        let mut session = document.into_session(Vec::new()).expect("session");
        assert_eq!(session.node_count(), 2);
        assert_eq!(session.edge_count(), 1);
        assert_eq!(
            session
                .node()
                .get(0, 7)
                .expect("integer attribute name")
                .into_value()
                .expect("value"),
            Value::from("seven")
        );
        assert_eq!(
            session.edges_in_group(&Group::from("g")).expect("members"),
            vec![EdgeIndex(0)]
        );
    }

    #[test]
    fn session_snapshot_matches_document() {
        let document: GraphDocument = serde_json::from_str(SAMPLE).expect("parse");
        let session = document.into_session(Vec::new()).expect("session");
        let snapshot = GraphDocument::from_session(&session).expect("snapshot");
        let reloaded = snapshot
            .clone()
            .into_session(Vec::new())
            .expect("reload");
        assert_eq!(GraphDocument::from_session(&reloaded).expect("again"), snapshot);
    }

    #[test]
    fn timestamps_survive_save_and_load() {
        let admitted = chrono::NaiveDate::from_ymd_opt(2024, 2, 29)
            .and_then(|d| d.and_hms_opt(23, 5, 0))
            .expect("date");
        let document = GraphDocument {
            nodes: vec![NodeRecord {
                index: NodeIndex::from(0),
                attributes: Attributes::from([(Attribute::from("admitted"), Value::from(admitted))]),
            }],
            ..GraphDocument::default()
        };
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("graph.json");
        document.save(&path).expect("save");

        let mut session = GraphDocument::load(&path)
            .expect("load")
            .into_session(Vec::new())
            .expect("session");
        let value = session
            .node()
            .get(0, "admitted")
            .expect("read")
            .into_value()
            .expect("value");
        assert!(matches!(value, Value::DateTime(at) if at == admitted));
    }

    #[test]
    fn dangling_group_edge_rejected() {
        let document = GraphDocument {
            groups: vec![GroupRecord {
                name: Group::from("g"),
                nodes: Vec::new(),
                edges: vec![3],
            }],
            ..GraphDocument::default()
        };
        assert!(matches!(
            document.into_session(Vec::new()),
            Err(CliError::Argument(_))
        ));
    }
}
