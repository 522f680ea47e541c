//! # Core Type Definitions
//!
//! This module contains the core types shared by every Trellis component:
//! - Entity identifiers (`NodeIndex`, `EdgeIndex`, `EntityKey`, `EntityKind`)
//! - Attribute keys and attribute sets (`Attribute`, `Attributes`, `Group`)
//! - Attribute values (`Value`, in the `value` submodule)
//! - Error types (`TrellisError`)
//!
//! ## Ordering Guarantees
//!
//! Every key type implements `Ord` so that stores and results can be kept in
//! `BTreeMap`/`BTreeSet` and iterate deterministically.

mod value;

pub use value::Value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// ENTITY IDENTIFIERS
// =============================================================================

/// Which entity axis an operation or descriptor targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Edge,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => f.write_str("node"),
            Self::Edge => f.write_str("edge"),
        }
    }
}

/// Caller-chosen identifier of a node: an integer or a string.
///
/// Integers order before strings, so mixed index sets still iterate in a
/// stable order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeIndex {
    Int(i64),
    String(String),
}

impl NodeIndex {
    /// Parse a node index from text: anything that reads as an integer is an
    /// integer index, everything else is a string index.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        text.parse::<i64>()
            .map(Self::Int)
            .unwrap_or_else(|_| Self::String(text.to_string()))
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for NodeIndex {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for NodeIndex {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for NodeIndex {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for NodeIndex {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Store-assigned identifier of an edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EdgeIndex(pub u32);

impl EdgeIndex {
    /// Get the raw index value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EdgeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EdgeIndex {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// An index on either entity axis.
///
/// Untyped results and error messages carry entity keys; typed operands
/// convert them back into `NodeIndex`/`EdgeIndex`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKey {
    Node(NodeIndex),
    Edge(EdgeIndex),
}

impl EntityKey {
    /// The axis this key belongs to.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Node(_) => EntityKind::Node,
            Self::Edge(_) => EntityKind::Edge,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(index) => write!(f, "node {index}"),
            Self::Edge(index) => write!(f, "edge {index}"),
        }
    }
}

impl From<NodeIndex> for EntityKey {
    fn from(index: NodeIndex) -> Self {
        Self::Node(index)
    }
}

impl From<EdgeIndex> for EntityKey {
    fn from(index: EdgeIndex) -> Self {
        Self::Edge(index)
    }
}

// =============================================================================
// ATTRIBUTES & GROUPS
// =============================================================================

/// Name of an attribute: an integer or a string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attribute {
    Int(i64),
    String(String),
}

impl Attribute {
    /// Parse an attribute name from text, integers first.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        text.parse::<i64>()
            .map(Self::Int)
            .unwrap_or_else(|_| Self::String(text.to_string()))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Attribute {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Attribute> for Value {
    fn from(attribute: Attribute) -> Self {
        match attribute {
            Attribute::Int(i) => Self::Int(i),
            Attribute::String(s) => Self::String(s),
        }
    }
}

impl TryFrom<Value> for Attribute {
    type Error = TrellisError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(i) => Ok(Self::Int(i)),
            Value::String(s) => Ok(Self::String(s)),
            other => Err(TrellisError::Conversion(format!(
                "{other} is not a valid attribute name"
            ))),
        }
    }
}

/// Attribute set owned by one node or edge.
pub type Attributes = BTreeMap<Attribute, Value>;

/// Name of a group. Groups share the attribute key type.
pub type Group = Attribute;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in Trellis.
///
/// - No silent failures: an absent attribute is an error, never a null
/// - Use `Result<T, TrellisError>` for fallible operations
/// - Store errors pass through the facade untranslated
#[derive(Debug, Error)]
pub enum TrellisError {
    /// The requested node does not exist.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeIndex),

    /// The requested edge does not exist.
    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeIndex),

    /// The requested group does not exist.
    #[error("Group not found: {0}")]
    GroupNotFound(Group),

    /// A singular predicate selector matched nothing on read.
    #[error("The query returned no results")]
    NoResults,

    /// An explicitly named attribute is absent on an existing entity.
    #[error("Attribute {attribute} not found on {entity}")]
    MissingAttribute {
        entity: EntityKey,
        attribute: Attribute,
    },

    /// A selector that is not a single key, key list, predicate or wildcard.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// A node with this index already exists.
    #[error("Node already exists: {0}")]
    DuplicateNode(NodeIndex),

    /// A group with this name already exists.
    #[error("Group already exists: {0}")]
    DuplicateGroup(Group),

    /// An edge endpoint does not exist.
    #[error("Edge endpoint not found: {0}")]
    DanglingEdge(NodeIndex),

    /// A group membership change that contradicts current membership.
    #[error("Membership error: {0}")]
    Membership(String),

    /// A store returned a wire result that does not match the query kind.
    #[error("Query shape mismatch: {0}")]
    QueryShape(String),

    /// A query descriptor the store cannot evaluate.
    #[error("Query error: {0}")]
    Query(String),

    /// A value could not be converted into the requested type.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Raised by a plugin hook.
    #[error("Plugin error: {0}")]
    Plugin(String),
}

impl TrellisError {
    /// Whether this error reports a missing entity, group or query result.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound(_) | Self::EdgeNotFound(_) | Self::GroupNotFound(_) | Self::NoResults
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_index_parses_integers_first() {
        assert_eq!(NodeIndex::parse("42"), NodeIndex::Int(42));
        assert_eq!(NodeIndex::parse("-3"), NodeIndex::Int(-3));
        assert_eq!(NodeIndex::parse("alice"), NodeIndex::from("alice"));
    }

    #[test]
    fn node_index_ordering_is_deterministic() {
        let mut indices = vec![
            NodeIndex::from("b"),
            NodeIndex::from(2),
            NodeIndex::from("a"),
            NodeIndex::from(1),
        ];
        indices.sort();
        assert_eq!(
            indices,
            vec![
                NodeIndex::from(1),
                NodeIndex::from(2),
                NodeIndex::from("a"),
                NodeIndex::from("b"),
            ]
        );
    }

    #[test]
    fn attribute_value_conversion() {
        let value = Value::from(Attribute::from("age"));
        assert_eq!(value, Value::from("age"));
        assert_eq!(Attribute::try_from(value).expect("convert"), Attribute::from("age"));
        assert!(matches!(
            Attribute::try_from(Value::Bool(true)),
            Err(TrellisError::Conversion(_))
        ));
    }

    #[test]
    fn not_found_grouping() {
        assert!(TrellisError::NodeNotFound(NodeIndex::from(1)).is_not_found());
        assert!(TrellisError::EdgeNotFound(EdgeIndex(1)).is_not_found());
        assert!(TrellisError::GroupNotFound(Group::from("g")).is_not_found());
        assert!(TrellisError::NoResults.is_not_found());
        assert!(
            !TrellisError::MissingAttribute {
                entity: EntityKey::Node(NodeIndex::from(1)),
                attribute: Attribute::from("a"),
            }
            .is_not_found()
        );
    }

    #[test]
    fn error_messages_name_the_entity() {
        let error = TrellisError::MissingAttribute {
            entity: EntityKey::Edge(EdgeIndex(7)),
            attribute: Attribute::from("weight"),
        };
        assert_eq!(error.to_string(), "Attribute weight not found on edge 7");
        assert_eq!(
            TrellisError::NoResults.to_string(),
            "The query returned no results"
        );
    }
}
