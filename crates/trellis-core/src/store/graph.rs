//! # Graph
//!
//! The deterministic in-memory store.
//!
//! This module implements the `GraphStore` trait.
//! All data structures use `BTreeMap` for deterministic ordering.
//! Edge indices are allocated monotonically and restart at zero on `clear`.

use super::GraphStore;
use super::evaluate::{self, Candidate};
use crate::query::{QueryDescriptor, WireResult};
use crate::types::{
    Attribute, Attributes, EdgeIndex, EntityKey, EntityKind, Group, NodeIndex, TrellisError, Value,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// A stored edge.
#[derive(Debug, Clone, PartialEq)]
struct EdgeRecord {
    source: NodeIndex,
    target: NodeIndex,
    attributes: Attributes,
}

/// Members of one group.
#[derive(Debug, Clone, Default, PartialEq)]
struct Members {
    nodes: BTreeSet<NodeIndex>,
    edges: BTreeSet<EdgeIndex>,
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The in-memory graph attribute store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    /// Node storage: NodeIndex -> attributes
    nodes: BTreeMap<NodeIndex, Attributes>,

    /// Edge storage: EdgeIndex -> endpoints and attributes
    edges: BTreeMap<EdgeIndex, EdgeRecord>,

    /// Group membership: Group -> members
    groups: BTreeMap<Group, Members>,

    /// Next edge index to hand out.
    next_edge: u32,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // -------------------------------------------------------------------------
    // Validation helpers
    // -------------------------------------------------------------------------

    fn check_nodes(&self, nodes: &[NodeIndex]) -> Result<(), TrellisError> {
        match nodes.iter().find(|node| !self.nodes.contains_key(*node)) {
            Some(missing) => Err(TrellisError::NodeNotFound(missing.clone())),
            None => Ok(()),
        }
    }

    fn check_edges(&self, edges: &[EdgeIndex]) -> Result<(), TrellisError> {
        match edges.iter().find(|edge| !self.edges.contains_key(*edge)) {
            Some(missing) => Err(TrellisError::EdgeNotFound(*missing)),
            None => Ok(()),
        }
    }

    fn members(&self, group: &Group) -> Result<&Members, TrellisError> {
        self.groups
            .get(group)
            .ok_or_else(|| TrellisError::GroupNotFound(group.clone()))
    }

    fn members_mut(&mut self, group: &Group) -> Result<&mut Members, TrellisError> {
        self.groups
            .get_mut(group)
            .ok_or_else(|| TrellisError::GroupNotFound(group.clone()))
    }

    fn allocate_edge(&mut self) -> Result<EdgeIndex, TrellisError> {
        let index = EdgeIndex(self.next_edge);
        self.next_edge = self
            .next_edge
            .checked_add(1)
            .ok_or_else(|| TrellisError::Conversion("edge index space exhausted".to_string()))?;
        Ok(index)
    }

    // -------------------------------------------------------------------------
    // Query support
    // -------------------------------------------------------------------------

    /// Every entity on one axis, in index order.
    pub(super) fn candidates(&self, kind: EntityKind) -> Vec<Candidate<'_>> {
        match kind {
            EntityKind::Node => self
                .nodes
                .iter()
                .map(|(index, attributes)| Candidate {
                    key: EntityKey::Node(index.clone()),
                    attributes,
                    endpoints: None,
                })
                .collect(),
            EntityKind::Edge => self
                .edges
                .iter()
                .map(|(index, record)| Candidate {
                    key: EntityKey::Edge(*index),
                    attributes: &record.attributes,
                    endpoints: Some((&record.source, &record.target)),
                })
                .collect(),
        }
    }

    /// Whether the entity belongs to the group. Unknown groups have no members.
    pub(super) fn is_member(&self, group: &Group, key: &EntityKey) -> bool {
        self.groups.get(group).is_some_and(|members| match key {
            EntityKey::Node(node) => members.nodes.contains(node),
            EntityKey::Edge(edge) => members.edges.contains(edge),
        })
    }
}

impl GraphStore for Graph {
    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    fn node_indices(&self) -> Vec<NodeIndex> {
        self.nodes.keys().cloned().collect()
    }

    fn contains_node(&self, node: &NodeIndex) -> bool {
        self.nodes.contains_key(node)
    }

    fn node_attributes(
        &self,
        nodes: &[NodeIndex],
    ) -> Result<BTreeMap<NodeIndex, Attributes>, TrellisError> {
        nodes
            .iter()
            .map(|node| {
                self.nodes
                    .get(node)
                    .map(|attributes| (node.clone(), attributes.clone()))
                    .ok_or_else(|| TrellisError::NodeNotFound(node.clone()))
            })
            .collect()
    }

    fn update_node_attribute(
        &mut self,
        nodes: &[NodeIndex],
        attribute: &Attribute,
        value: &Value,
    ) -> Result<(), TrellisError> {
        self.check_nodes(nodes)?;
        for node in nodes {
            if let Some(attributes) = self.nodes.get_mut(node) {
                attributes.insert(attribute.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn remove_node_attribute(
        &mut self,
        nodes: &[NodeIndex],
        attribute: &Attribute,
    ) -> Result<(), TrellisError> {
        self.check_nodes(nodes)?;
        if let Some(node) = nodes
            .iter()
            .find(|node| !self.nodes.get(*node).is_some_and(|a| a.contains_key(attribute)))
        {
            return Err(TrellisError::MissingAttribute {
                entity: EntityKey::Node(node.clone()),
                attribute: attribute.clone(),
            });
        }
        for node in nodes {
            if let Some(attributes) = self.nodes.get_mut(node) {
                attributes.remove(attribute);
            }
        }
        Ok(())
    }

    fn replace_node_attributes(
        &mut self,
        nodes: &[NodeIndex],
        attributes: &Attributes,
    ) -> Result<(), TrellisError> {
        self.check_nodes(nodes)?;
        for node in nodes {
            if let Some(current) = self.nodes.get_mut(node) {
                current.clone_from(attributes);
            }
        }
        Ok(())
    }

    fn add_nodes(
        &mut self,
        nodes: Vec<(NodeIndex, Attributes)>,
        group: Option<&Group>,
    ) -> Result<(), TrellisError> {
        let mut incoming = BTreeSet::new();
        for (node, _) in &nodes {
            if self.nodes.contains_key(node) || !incoming.insert(node.clone()) {
                return Err(TrellisError::DuplicateNode(node.clone()));
            }
        }
        trace!(count = nodes.len(), "adding nodes");
        if let Some(group) = group {
            self.groups
                .entry(group.clone())
                .or_default()
                .nodes
                .extend(incoming);
        }
        self.nodes.extend(nodes);
        Ok(())
    }

    fn remove_nodes(
        &mut self,
        nodes: &[NodeIndex],
    ) -> Result<BTreeMap<NodeIndex, Attributes>, TrellisError> {
        self.check_nodes(nodes)?;
        let doomed: BTreeSet<&NodeIndex> = nodes.iter().collect();
        let incident: Vec<EdgeIndex> = self
            .edges
            .iter()
            .filter(|(_, record)| doomed.contains(&record.source) || doomed.contains(&record.target))
            .map(|(index, _)| *index)
            .collect();
        for edge in &incident {
            self.edges.remove(edge);
        }

        let mut removed = BTreeMap::new();
        for node in nodes {
            if let Some(attributes) = self.nodes.remove(node) {
                removed.insert(node.clone(), attributes);
            }
        }
        for members in self.groups.values_mut() {
            members.nodes.retain(|node| !removed.contains_key(node));
            members.edges.retain(|edge| !incident.contains(edge));
        }
        trace!(
            nodes = removed.len(),
            edges = incident.len(),
            "removed nodes"
        );
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------------

    fn edge_indices(&self) -> Vec<EdgeIndex> {
        self.edges.keys().copied().collect()
    }

    fn contains_edge(&self, edge: &EdgeIndex) -> bool {
        self.edges.contains_key(edge)
    }

    fn edge_attributes(
        &self,
        edges: &[EdgeIndex],
    ) -> Result<BTreeMap<EdgeIndex, Attributes>, TrellisError> {
        edges
            .iter()
            .map(|edge| {
                self.edges
                    .get(edge)
                    .map(|record| (*edge, record.attributes.clone()))
                    .ok_or(TrellisError::EdgeNotFound(*edge))
            })
            .collect()
    }

    fn update_edge_attribute(
        &mut self,
        edges: &[EdgeIndex],
        attribute: &Attribute,
        value: &Value,
    ) -> Result<(), TrellisError> {
        self.check_edges(edges)?;
        for edge in edges {
            if let Some(record) = self.edges.get_mut(edge) {
                record.attributes.insert(attribute.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn remove_edge_attribute(
        &mut self,
        edges: &[EdgeIndex],
        attribute: &Attribute,
    ) -> Result<(), TrellisError> {
        self.check_edges(edges)?;
        if let Some(edge) = edges.iter().find(|edge| {
            !self
                .edges
                .get(*edge)
                .is_some_and(|record| record.attributes.contains_key(attribute))
        }) {
            return Err(TrellisError::MissingAttribute {
                entity: EntityKey::Edge(*edge),
                attribute: attribute.clone(),
            });
        }
        for edge in edges {
            if let Some(record) = self.edges.get_mut(edge) {
                record.attributes.remove(attribute);
            }
        }
        Ok(())
    }

    fn replace_edge_attributes(
        &mut self,
        edges: &[EdgeIndex],
        attributes: &Attributes,
    ) -> Result<(), TrellisError> {
        self.check_edges(edges)?;
        for edge in edges {
            if let Some(record) = self.edges.get_mut(edge) {
                record.attributes.clone_from(attributes);
            }
        }
        Ok(())
    }

    fn add_edges(
        &mut self,
        edges: Vec<(NodeIndex, NodeIndex, Attributes)>,
        group: Option<&Group>,
    ) -> Result<Vec<EdgeIndex>, TrellisError> {
        for (source, target, _) in &edges {
            for endpoint in [source, target] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(TrellisError::DanglingEdge(endpoint.clone()));
                }
            }
        }

        u32::try_from(edges.len())
            .ok()
            .and_then(|count| self.next_edge.checked_add(count))
            .ok_or_else(|| TrellisError::Conversion("edge index space exhausted".to_string()))?;

        let mut assigned = Vec::with_capacity(edges.len());
        for (source, target, attributes) in edges {
            let index = self.allocate_edge()?;
            self.edges.insert(
                index,
                EdgeRecord {
                    source,
                    target,
                    attributes,
                },
            );
            assigned.push(index);
        }
        if let Some(group) = group {
            self.groups
                .entry(group.clone())
                .or_default()
                .edges
                .extend(assigned.iter().copied());
        }
        trace!(count = assigned.len(), "added edges");
        Ok(assigned)
    }

    fn remove_edges(
        &mut self,
        edges: &[EdgeIndex],
    ) -> Result<BTreeMap<EdgeIndex, Attributes>, TrellisError> {
        self.check_edges(edges)?;
        let mut removed = BTreeMap::new();
        for edge in edges {
            if let Some(record) = self.edges.remove(edge) {
                removed.insert(*edge, record.attributes);
            }
        }
        for members in self.groups.values_mut() {
            members.edges.retain(|edge| !removed.contains_key(edge));
        }
        Ok(removed)
    }

    fn edge_endpoints(&self, edge: &EdgeIndex) -> Result<(NodeIndex, NodeIndex), TrellisError> {
        self.edges
            .get(edge)
            .map(|record| (record.source.clone(), record.target.clone()))
            .ok_or(TrellisError::EdgeNotFound(*edge))
    }

    // -------------------------------------------------------------------------
    // Groups
    // -------------------------------------------------------------------------

    fn groups(&self) -> Vec<Group> {
        self.groups.keys().cloned().collect()
    }

    fn contains_group(&self, group: &Group) -> bool {
        self.groups.contains_key(group)
    }

    fn add_group(
        &mut self,
        group: Group,
        nodes: Option<&[NodeIndex]>,
        edges: Option<&[EdgeIndex]>,
    ) -> Result<(), TrellisError> {
        if self.groups.contains_key(&group) {
            return Err(TrellisError::DuplicateGroup(group));
        }
        let nodes = nodes.unwrap_or_default();
        let edges = edges.unwrap_or_default();
        self.check_nodes(nodes)?;
        self.check_edges(edges)?;
        self.groups.insert(
            group,
            Members {
                nodes: nodes.iter().cloned().collect(),
                edges: edges.iter().copied().collect(),
            },
        );
        Ok(())
    }

    fn remove_groups(&mut self, groups: &[Group]) -> Result<(), TrellisError> {
        if let Some(missing) = groups.iter().find(|group| !self.groups.contains_key(*group)) {
            return Err(TrellisError::GroupNotFound(missing.clone()));
        }
        for group in groups {
            self.groups.remove(group);
        }
        Ok(())
    }

    fn add_nodes_to_group(
        &mut self,
        group: &Group,
        nodes: &[NodeIndex],
    ) -> Result<(), TrellisError> {
        self.check_nodes(nodes)?;
        let members = self.members_mut(group)?;
        if let Some(node) = nodes.iter().find(|node| members.nodes.contains(*node)) {
            return Err(TrellisError::Membership(format!(
                "node {node} is already in group {group}"
            )));
        }
        members.nodes.extend(nodes.iter().cloned());
        Ok(())
    }

    fn add_edges_to_group(
        &mut self,
        group: &Group,
        edges: &[EdgeIndex],
    ) -> Result<(), TrellisError> {
        self.check_edges(edges)?;
        let members = self.members_mut(group)?;
        if let Some(edge) = edges.iter().find(|edge| members.edges.contains(*edge)) {
            return Err(TrellisError::Membership(format!(
                "edge {edge} is already in group {group}"
            )));
        }
        members.edges.extend(edges.iter().copied());
        Ok(())
    }

    fn remove_nodes_from_group(
        &mut self,
        group: &Group,
        nodes: &[NodeIndex],
    ) -> Result<(), TrellisError> {
        self.check_nodes(nodes)?;
        let members = self.members_mut(group)?;
        if let Some(node) = nodes.iter().find(|node| !members.nodes.contains(*node)) {
            return Err(TrellisError::Membership(format!(
                "node {node} is not in group {group}"
            )));
        }
        for node in nodes {
            members.nodes.remove(node);
        }
        Ok(())
    }

    fn remove_edges_from_group(
        &mut self,
        group: &Group,
        edges: &[EdgeIndex],
    ) -> Result<(), TrellisError> {
        self.check_edges(edges)?;
        let members = self.members_mut(group)?;
        if let Some(edge) = edges.iter().find(|edge| !members.edges.contains(*edge)) {
            return Err(TrellisError::Membership(format!(
                "edge {edge} is not in group {group}"
            )));
        }
        for edge in edges {
            members.edges.remove(edge);
        }
        Ok(())
    }

    fn nodes_in_group(&self, group: &Group) -> Result<Vec<NodeIndex>, TrellisError> {
        Ok(self.members(group)?.nodes.iter().cloned().collect())
    }

    fn edges_in_group(&self, group: &Group) -> Result<Vec<EdgeIndex>, TrellisError> {
        Ok(self.members(group)?.edges.iter().copied().collect())
    }

    // -------------------------------------------------------------------------
    // Whole store
    // -------------------------------------------------------------------------

    fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.groups.clear();
        self.next_edge = 0;
    }

    fn run_query(&self, descriptor: &QueryDescriptor) -> Result<WireResult, TrellisError> {
        evaluate::run(self, descriptor)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: i64) -> NodeIndex {
        NodeIndex::from(i)
    }

    fn attrs(pairs: &[(&str, i64)]) -> Attributes {
        pairs
            .iter()
            .map(|(name, value)| (Attribute::from(*name), Value::Int(*value)))
            .collect()
    }

    fn sample() -> Graph {
        let mut graph = Graph::new();
        graph
            .add_nodes(
                vec![(n(0), attrs(&[("a", 1)])), (n(1), attrs(&[("a", 2)])), (n(2), Attributes::new())],
                None,
            )
            .expect("add nodes");
        graph
            .add_edges(
                vec![
                    (n(0), n(1), attrs(&[("w", 5)])),
                    (n(1), n(2), attrs(&[("w", 7)])),
                ],
                None,
            )
            .expect("add edges");
        graph
    }

    #[test]
    fn add_and_read_nodes() {
        let graph = sample();
        assert_eq!(graph.node_count(), 3);
        let read = graph.node_attributes(&[n(1), n(0)]).expect("read");
        assert_eq!(read[&n(0)], attrs(&[("a", 1)]));
        assert_eq!(read[&n(1)], attrs(&[("a", 2)]));
    }

    #[test]
    fn read_with_missing_node_fails() {
        let graph = sample();
        let result = graph.node_attributes(&[n(0), n(50)]);
        assert!(matches!(result, Err(TrellisError::NodeNotFound(NodeIndex::Int(50)))));
    }

    #[test]
    fn duplicate_nodes_rejected_without_partial_insert() {
        let mut graph = sample();
        let result = graph.add_nodes(vec![(n(7), Attributes::new()), (n(0), Attributes::new())], None);
        assert!(matches!(result, Err(TrellisError::DuplicateNode(_))));
        assert!(!graph.contains_node(&n(7)));

        let repeated = graph.add_nodes(vec![(n(8), Attributes::new()), (n(8), Attributes::new())], None);
        assert!(matches!(repeated, Err(TrellisError::DuplicateNode(_))));
        assert!(!graph.contains_node(&n(8)));
    }

    #[test]
    fn edge_indices_are_monotonic() {
        let mut graph = sample();
        assert_eq!(graph.edge_indices(), vec![EdgeIndex(0), EdgeIndex(1)]);
        graph.remove_edges(&[EdgeIndex(0)]).expect("remove");
        let added = graph
            .add_edges(vec![(n(2), n(0), Attributes::new())], None)
            .expect("add");
        assert_eq!(added, vec![EdgeIndex(2)]);
        assert_eq!(graph.edge_endpoints(&EdgeIndex(2)).expect("endpoints"), (n(2), n(0)));
    }

    #[test]
    fn dangling_edge_rejected() {
        let mut graph = sample();
        let result = graph.add_edges(vec![(n(0), n(99), Attributes::new())], None);
        assert!(matches!(result, Err(TrellisError::DanglingEdge(NodeIndex::Int(99)))));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn edge_batch_past_index_space_inserts_nothing() {
        let mut graph = sample();
        graph.next_edge = u32::MAX - 1;
        let batch = vec![
            (n(0), n(1), Attributes::new()),
            (n(1), n(2), Attributes::new()),
        ];
        let result = graph.add_edges(batch, Some(&Group::from("late")));
        assert!(matches!(result, Err(TrellisError::Conversion(_))));
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.groups().is_empty());
        assert_eq!(graph.next_edge, u32::MAX - 1);

        let last = graph
            .add_edges(vec![(n(0), n(1), Attributes::new())], None)
            .expect("one slot left");
        assert_eq!(last, vec![EdgeIndex(u32::MAX - 1)]);
    }

    #[test]
    fn remove_attribute_checks_every_node_first() {
        let mut graph = sample();
        let result = graph.remove_node_attribute(&[n(0), n(2)], &Attribute::from("a"));
        assert!(matches!(result, Err(TrellisError::MissingAttribute { .. })));
        // Node 0 keeps its attribute.
        assert_eq!(graph.node_attributes(&[n(0)]).expect("read")[&n(0)], attrs(&[("a", 1)]));
    }

    #[test]
    fn remove_nodes_drops_incident_edges_and_memberships() {
        let mut graph = sample();
        graph
            .add_group(Group::from("g"), Some(&[n(1), n(2)]), Some(&[EdgeIndex(1)]))
            .expect("group");
        let removed = graph.remove_nodes(&[n(1)]).expect("remove");
        assert_eq!(removed[&n(1)], attrs(&[("a", 2)]));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.nodes_in_group(&Group::from("g")).expect("members"), vec![n(2)]);
        assert!(graph.edges_in_group(&Group::from("g")).expect("members").is_empty());
    }

    #[test]
    fn group_membership_rules() {
        let mut graph = sample();
        let g = Group::from("g");
        graph.add_group(g.clone(), None, None).expect("group");
        assert!(matches!(
            graph.add_group(g.clone(), None, None),
            Err(TrellisError::DuplicateGroup(_))
        ));

        graph.add_nodes_to_group(&g, &[n(0)]).expect("add member");
        assert!(matches!(
            graph.add_nodes_to_group(&g, &[n(0)]),
            Err(TrellisError::Membership(_))
        ));
        assert!(matches!(
            graph.remove_nodes_from_group(&g, &[n(1)]),
            Err(TrellisError::Membership(_))
        ));
        graph.remove_nodes_from_group(&g, &[n(0)]).expect("remove member");
        assert!(matches!(
            graph.add_edges_to_group(&Group::from("nope"), &[EdgeIndex(0)]),
            Err(TrellisError::GroupNotFound(_))
        ));
    }

    #[test]
    fn add_nodes_into_new_group() {
        let mut graph = Graph::new();
        let g = Group::from("fresh");
        graph
            .add_nodes(vec![(n(3), Attributes::new())], Some(&g))
            .expect("add");
        assert_eq!(graph.groups(), vec![g.clone()]);
        assert_eq!(graph.nodes_in_group(&g).expect("members"), vec![n(3)]);
    }

    #[test]
    fn clear_resets_edge_allocation() {
        let mut graph = sample();
        graph.clear();
        assert_eq!(graph.node_count(), 0);
        graph
            .add_nodes(vec![(n(0), Attributes::new()), (n(1), Attributes::new())], None)
            .expect("add");
        let added = graph
            .add_edges(vec![(n(0), n(1), Attributes::new())], None)
            .expect("add edge");
        assert_eq!(added, vec![EdgeIndex(0)]);
    }
}
