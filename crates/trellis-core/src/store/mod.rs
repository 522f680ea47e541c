//! # Store
//!
//! The boundary between the facade and the graph attribute store.
//!
//! The facade never touches storage directly: it reads and writes through
//! the object-safe [`GraphStore`] trait. [`Graph`] is the deterministic
//! in-memory implementation shipped with the crate.
//!
//! ## Contract
//!
//! - Reads over several keys fail with `NodeNotFound`/`EdgeNotFound` if any
//!   key is absent.
//! - Every primitive validates its whole input before mutating, so one call
//!   either applies completely or not at all.
//! - `run_query` receives ungrouped descriptors only; grouping is resolved by
//!   the caller.

mod evaluate;
mod graph;

pub use graph::Graph;

use crate::query::{QueryDescriptor, WireResult};
use crate::types::{Attribute, Attributes, EdgeIndex, Group, NodeIndex, TrellisError, Value};
use std::collections::BTreeMap;
use std::fmt::Debug;

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// Primitive entity/attribute CRUD and predicate-query execution.
pub trait GraphStore: Debug + Send {
    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    /// All node indices in ascending order.
    fn node_indices(&self) -> Vec<NodeIndex>;

    /// Check if a node exists.
    fn contains_node(&self, node: &NodeIndex) -> bool;

    /// Attribute sets of the given nodes.
    fn node_attributes(
        &self,
        nodes: &[NodeIndex],
    ) -> Result<BTreeMap<NodeIndex, Attributes>, TrellisError>;

    /// Create or overwrite one attribute on every given node.
    fn update_node_attribute(
        &mut self,
        nodes: &[NodeIndex],
        attribute: &Attribute,
        value: &Value,
    ) -> Result<(), TrellisError>;

    /// Remove one attribute from every given node. `MissingAttribute` if any
    /// node lacks it.
    fn remove_node_attribute(
        &mut self,
        nodes: &[NodeIndex],
        attribute: &Attribute,
    ) -> Result<(), TrellisError>;

    /// Replace the whole attribute set of every given node.
    fn replace_node_attributes(
        &mut self,
        nodes: &[NodeIndex],
        attributes: &Attributes,
    ) -> Result<(), TrellisError>;

    /// Insert new nodes, optionally into a group (created if absent).
    fn add_nodes(
        &mut self,
        nodes: Vec<(NodeIndex, Attributes)>,
        group: Option<&Group>,
    ) -> Result<(), TrellisError>;

    /// Remove nodes with their incident edges. Returns the removed attribute sets.
    fn remove_nodes(
        &mut self,
        nodes: &[NodeIndex],
    ) -> Result<BTreeMap<NodeIndex, Attributes>, TrellisError>;

    // -------------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------------

    /// All edge indices in ascending order.
    fn edge_indices(&self) -> Vec<EdgeIndex>;

    /// Check if an edge exists.
    fn contains_edge(&self, edge: &EdgeIndex) -> bool;

    /// Attribute sets of the given edges.
    fn edge_attributes(
        &self,
        edges: &[EdgeIndex],
    ) -> Result<BTreeMap<EdgeIndex, Attributes>, TrellisError>;

    /// Create or overwrite one attribute on every given edge.
    fn update_edge_attribute(
        &mut self,
        edges: &[EdgeIndex],
        attribute: &Attribute,
        value: &Value,
    ) -> Result<(), TrellisError>;

    /// Remove one attribute from every given edge.
    fn remove_edge_attribute(
        &mut self,
        edges: &[EdgeIndex],
        attribute: &Attribute,
    ) -> Result<(), TrellisError>;

    /// Replace the whole attribute set of every given edge.
    fn replace_edge_attributes(
        &mut self,
        edges: &[EdgeIndex],
        attributes: &Attributes,
    ) -> Result<(), TrellisError>;

    /// Insert edges between existing nodes. Returns the assigned indices in input order.
    fn add_edges(
        &mut self,
        edges: Vec<(NodeIndex, NodeIndex, Attributes)>,
        group: Option<&Group>,
    ) -> Result<Vec<EdgeIndex>, TrellisError>;

    /// Remove edges. Returns the removed attribute sets.
    fn remove_edges(
        &mut self,
        edges: &[EdgeIndex],
    ) -> Result<BTreeMap<EdgeIndex, Attributes>, TrellisError>;

    /// Source and target of an edge.
    fn edge_endpoints(&self, edge: &EdgeIndex) -> Result<(NodeIndex, NodeIndex), TrellisError>;

    // -------------------------------------------------------------------------
    // Groups
    // -------------------------------------------------------------------------

    /// All group names in ascending order.
    fn groups(&self) -> Vec<Group>;

    /// Check if a group exists.
    fn contains_group(&self, group: &Group) -> bool;

    /// Create a group with optional initial members.
    fn add_group(
        &mut self,
        group: Group,
        nodes: Option<&[NodeIndex]>,
        edges: Option<&[EdgeIndex]>,
    ) -> Result<(), TrellisError>;

    /// Remove groups. Members are kept.
    fn remove_groups(&mut self, groups: &[Group]) -> Result<(), TrellisError>;

    fn add_nodes_to_group(&mut self, group: &Group, nodes: &[NodeIndex])
    -> Result<(), TrellisError>;

    fn add_edges_to_group(&mut self, group: &Group, edges: &[EdgeIndex])
    -> Result<(), TrellisError>;

    fn remove_nodes_from_group(
        &mut self,
        group: &Group,
        nodes: &[NodeIndex],
    ) -> Result<(), TrellisError>;

    fn remove_edges_from_group(
        &mut self,
        group: &Group,
        edges: &[EdgeIndex],
    ) -> Result<(), TrellisError>;

    /// Members of a group.
    fn nodes_in_group(&self, group: &Group) -> Result<Vec<NodeIndex>, TrellisError>;

    fn edges_in_group(&self, group: &Group) -> Result<Vec<EdgeIndex>, TrellisError>;

    // -------------------------------------------------------------------------
    // Whole store
    // -------------------------------------------------------------------------

    /// Remove every node, edge and group.
    fn clear(&mut self);

    /// Evaluate an ungrouped descriptor into its wire shape.
    fn run_query(&self, descriptor: &QueryDescriptor) -> Result<WireResult, TrellisError>;
}
