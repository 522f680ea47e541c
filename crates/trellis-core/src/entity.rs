//! # Entity Axis
//!
//! `Node` and `Edge` are zero-sized markers that let the operand builder,
//! the selectors and the indexer be written once and dispatched statically
//! to the node or edge half of the store and plugin APIs.

use crate::plugin::{
    Plugin, RemoveAttributeContext, ReplaceAttributesContext, UpdateAttributeContext,
};
use crate::session::Session;
use crate::store::GraphStore;
use crate::types::{Attributes, EdgeIndex, EntityKey, EntityKind, NodeIndex, TrellisError};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Node {}
    impl Sealed for super::Edge {}
}

/// Marker for the node axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node;

/// Marker for the edge axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge;

/// One entity axis: its index type and its half of the store and plugin APIs.
pub trait Entity: sealed::Sealed + Debug + Clone + Copy + Send + Sync + 'static {
    /// Index type of this axis.
    type Index: Clone + Ord + Debug + Display + Send + Sync + 'static;

    /// Runtime tag of this axis.
    const KIND: EntityKind;

    /// Wrap an index into an untyped key.
    fn key(index: Self::Index) -> EntityKey;

    /// Unwrap an untyped key. `Conversion` if it belongs to the other axis.
    fn from_key(key: EntityKey) -> Result<Self::Index, TrellisError>;

    /// Parse an index from selector text.
    fn parse_index(text: &str) -> Result<Self::Index, TrellisError>;

    /// The not-found error for an index on this axis.
    fn not_found(index: &Self::Index) -> TrellisError;

    /// Every index currently in the store.
    fn indices(store: &dyn GraphStore) -> Vec<Self::Index>;

    fn contains(store: &dyn GraphStore, index: &Self::Index) -> bool;

    fn attributes(
        store: &dyn GraphStore,
        indices: &[Self::Index],
    ) -> Result<BTreeMap<Self::Index, Attributes>, TrellisError>;

    // -------------------------------------------------------------------------
    // Attribute writes: hook dispatch and store application
    // -------------------------------------------------------------------------

    fn before_update(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: UpdateAttributeContext<Self::Index>,
    ) -> Result<UpdateAttributeContext<Self::Index>, TrellisError>;

    fn apply_update(
        store: &mut dyn GraphStore,
        context: &UpdateAttributeContext<Self::Index>,
    ) -> Result<(), TrellisError>;

    fn after_update(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: &UpdateAttributeContext<Self::Index>,
        result: &(),
    ) -> Result<(), TrellisError>;

    fn before_remove(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: RemoveAttributeContext<Self::Index>,
    ) -> Result<RemoveAttributeContext<Self::Index>, TrellisError>;

    fn apply_remove(
        store: &mut dyn GraphStore,
        context: &RemoveAttributeContext<Self::Index>,
    ) -> Result<(), TrellisError>;

    fn after_remove(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: &RemoveAttributeContext<Self::Index>,
        result: &(),
    ) -> Result<(), TrellisError>;

    fn before_replace(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: ReplaceAttributesContext<Self::Index>,
    ) -> Result<ReplaceAttributesContext<Self::Index>, TrellisError>;

    fn apply_replace(
        store: &mut dyn GraphStore,
        context: &ReplaceAttributesContext<Self::Index>,
    ) -> Result<(), TrellisError>;

    fn after_replace(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: &ReplaceAttributesContext<Self::Index>,
        result: &(),
    ) -> Result<(), TrellisError>;
}

impl Entity for Node {
    type Index = NodeIndex;

    const KIND: EntityKind = EntityKind::Node;

    fn key(index: NodeIndex) -> EntityKey {
        EntityKey::Node(index)
    }

    fn from_key(key: EntityKey) -> Result<NodeIndex, TrellisError> {
        match key {
            EntityKey::Node(index) => Ok(index),
            EntityKey::Edge(index) => Err(TrellisError::Conversion(format!(
                "expected a node index, got edge {index}"
            ))),
        }
    }

    fn parse_index(text: &str) -> Result<NodeIndex, TrellisError> {
        Ok(NodeIndex::parse(text))
    }

    fn not_found(index: &NodeIndex) -> TrellisError {
        TrellisError::NodeNotFound(index.clone())
    }

    fn indices(store: &dyn GraphStore) -> Vec<NodeIndex> {
        store.node_indices()
    }

    fn contains(store: &dyn GraphStore, index: &NodeIndex) -> bool {
        store.contains_node(index)
    }

    fn attributes(
        store: &dyn GraphStore,
        indices: &[NodeIndex],
    ) -> Result<BTreeMap<NodeIndex, Attributes>, TrellisError> {
        store.node_attributes(indices)
    }

    fn before_update(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: UpdateAttributeContext<NodeIndex>,
    ) -> Result<UpdateAttributeContext<NodeIndex>, TrellisError> {
        plugin.before_update_node_attribute(session, context)
    }

    fn apply_update(
        store: &mut dyn GraphStore,
        context: &UpdateAttributeContext<NodeIndex>,
    ) -> Result<(), TrellisError> {
        store.update_node_attribute(&context.indices, &context.attribute, &context.value)
    }

    fn after_update(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: &UpdateAttributeContext<NodeIndex>,
        _result: &(),
    ) -> Result<(), TrellisError> {
        plugin.after_update_node_attribute(session, context)
    }

    fn before_remove(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: RemoveAttributeContext<NodeIndex>,
    ) -> Result<RemoveAttributeContext<NodeIndex>, TrellisError> {
        plugin.before_remove_node_attribute(session, context)
    }

    fn apply_remove(
        store: &mut dyn GraphStore,
        context: &RemoveAttributeContext<NodeIndex>,
    ) -> Result<(), TrellisError> {
        store.remove_node_attribute(&context.indices, &context.attribute)
    }

    fn after_remove(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: &RemoveAttributeContext<NodeIndex>,
        _result: &(),
    ) -> Result<(), TrellisError> {
        plugin.after_remove_node_attribute(session, context)
    }

    fn before_replace(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: ReplaceAttributesContext<NodeIndex>,
    ) -> Result<ReplaceAttributesContext<NodeIndex>, TrellisError> {
        plugin.before_replace_node_attributes(session, context)
    }

    fn apply_replace(
        store: &mut dyn GraphStore,
        context: &ReplaceAttributesContext<NodeIndex>,
    ) -> Result<(), TrellisError> {
        store.replace_node_attributes(&context.indices, &context.attributes)
    }

    fn after_replace(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: &ReplaceAttributesContext<NodeIndex>,
        _result: &(),
    ) -> Result<(), TrellisError> {
        plugin.after_replace_node_attributes(session, context)
    }
}

impl Entity for Edge {
    type Index = EdgeIndex;

    const KIND: EntityKind = EntityKind::Edge;

    fn key(index: EdgeIndex) -> EntityKey {
        EntityKey::Edge(index)
    }

    fn from_key(key: EntityKey) -> Result<EdgeIndex, TrellisError> {
        match key {
            EntityKey::Edge(index) => Ok(index),
            EntityKey::Node(index) => Err(TrellisError::Conversion(format!(
                "expected an edge index, got node {index}"
            ))),
        }
    }

    fn parse_index(text: &str) -> Result<EdgeIndex, TrellisError> {
        text.parse::<u32>()
            .map(EdgeIndex)
            .map_err(|_| TrellisError::InvalidSelector(format!("{text:?} is not an edge index")))
    }

    fn not_found(index: &EdgeIndex) -> TrellisError {
        TrellisError::EdgeNotFound(*index)
    }

    fn indices(store: &dyn GraphStore) -> Vec<EdgeIndex> {
        store.edge_indices()
    }

    fn contains(store: &dyn GraphStore, index: &EdgeIndex) -> bool {
        store.contains_edge(index)
    }

    fn attributes(
        store: &dyn GraphStore,
        indices: &[EdgeIndex],
    ) -> Result<BTreeMap<EdgeIndex, Attributes>, TrellisError> {
        store.edge_attributes(indices)
    }

    fn before_update(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: UpdateAttributeContext<EdgeIndex>,
    ) -> Result<UpdateAttributeContext<EdgeIndex>, TrellisError> {
        plugin.before_update_edge_attribute(session, context)
    }

    fn apply_update(
        store: &mut dyn GraphStore,
        context: &UpdateAttributeContext<EdgeIndex>,
    ) -> Result<(), TrellisError> {
        store.update_edge_attribute(&context.indices, &context.attribute, &context.value)
    }

    fn after_update(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: &UpdateAttributeContext<EdgeIndex>,
        _result: &(),
    ) -> Result<(), TrellisError> {
        plugin.after_update_edge_attribute(session, context)
    }

    fn before_remove(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: RemoveAttributeContext<EdgeIndex>,
    ) -> Result<RemoveAttributeContext<EdgeIndex>, TrellisError> {
        plugin.before_remove_edge_attribute(session, context)
    }

    fn apply_remove(
        store: &mut dyn GraphStore,
        context: &RemoveAttributeContext<EdgeIndex>,
    ) -> Result<(), TrellisError> {
        store.remove_edge_attribute(&context.indices, &context.attribute)
    }

    fn after_remove(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: &RemoveAttributeContext<EdgeIndex>,
        _result: &(),
    ) -> Result<(), TrellisError> {
        plugin.after_remove_edge_attribute(session, context)
    }

    fn before_replace(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: ReplaceAttributesContext<EdgeIndex>,
    ) -> Result<ReplaceAttributesContext<EdgeIndex>, TrellisError> {
        plugin.before_replace_edge_attributes(session, context)
    }

    fn apply_replace(
        store: &mut dyn GraphStore,
        context: &ReplaceAttributesContext<EdgeIndex>,
    ) -> Result<(), TrellisError> {
        store.replace_edge_attributes(&context.indices, &context.attributes)
    }

    fn after_replace(
        plugin: &dyn Plugin,
        session: &mut Session,
        context: &ReplaceAttributesContext<EdgeIndex>,
        _result: &(),
    ) -> Result<(), TrellisError> {
        plugin.after_replace_edge_attributes(session, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_on_their_axis() {
        let key = Node::key(NodeIndex::from("a"));
        assert_eq!(Node::from_key(key).expect("node"), NodeIndex::from("a"));
        assert!(matches!(
            Edge::from_key(EntityKey::Node(NodeIndex::from(1))),
            Err(TrellisError::Conversion(_))
        ));
    }

    #[test]
    fn edge_indices_must_be_unsigned() {
        assert_eq!(Edge::parse_index("12").expect("parse"), EdgeIndex(12));
        assert!(matches!(
            Edge::parse_index("x"),
            Err(TrellisError::InvalidSelector(_))
        ));
        assert_eq!(Node::parse_index("x").expect("parse"), NodeIndex::from("x"));
    }
}
