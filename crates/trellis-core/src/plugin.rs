//! # Plugin Module
//!
//! Observers and interceptors for every mutating operation.
//!
//! A plugin implements any subset of the hook methods below. Missing
//! before-hooks are the identity and missing after-hooks do nothing.
//!
//! ## Hook Protocol
//!
//! For each mutating call the session:
//! 1. Builds the operation's context record from the raw arguments
//! 2. Folds `before_*` over plugins in registration order; each hook may
//!    rewrite the context, and the next hook receives the rewrite
//! 3. Applies the final context to the store
//! 4. Folds `after_*` over plugins in registration order with the final
//!    context and the store result
//!
//! A failing before-hook aborts the call before the store is touched. A
//! failing after-hook is reported but the mutation stays applied.
//!
//! Hooks receive the session itself. Mutations a hook issues go straight
//! to the store without re-entering the hook chain.

use crate::session::Session;
use crate::types::{
    Attribute, Attributes, EdgeIndex, EntityKind, Group, NodeIndex, TrellisError, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::info;

/// Tracing target used by [`TracingPlugin`].
pub const AUDIT_TARGET: &str = "trellis::audit";

// =============================================================================
// CONTEXT RECORDS
// =============================================================================

/// Pending `add_nodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddNodesContext {
    pub nodes: Vec<(NodeIndex, Attributes)>,
    pub group: Option<Group>,
}

/// Pending `add_edges`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddEdgesContext {
    /// Source, target and attributes of each new edge.
    pub edges: Vec<(NodeIndex, NodeIndex, Attributes)>,
    pub group: Option<Group>,
}

/// Pending `remove_nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveNodesContext {
    pub nodes: Vec<NodeIndex>,
}

/// Pending `remove_edges`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveEdgesContext {
    pub edges: Vec<EdgeIndex>,
}

/// Pending `add_group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddGroupContext {
    pub group: Group,
    pub nodes: Option<Vec<NodeIndex>>,
    pub edges: Option<Vec<EdgeIndex>>,
}

/// Pending `remove_groups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveGroupsContext {
    pub groups: Vec<Group>,
}

/// Pending group membership change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipContext<I> {
    pub group: Group,
    pub indices: Vec<I>,
}

pub type AddNodesToGroupContext = MembershipContext<NodeIndex>;
pub type AddEdgesToGroupContext = MembershipContext<EdgeIndex>;
pub type RemoveNodesFromGroupContext = MembershipContext<NodeIndex>;
pub type RemoveEdgesFromGroupContext = MembershipContext<EdgeIndex>;

/// Pending create-or-overwrite of one attribute on a set of entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAttributeContext<I> {
    pub kind: EntityKind,
    pub indices: Vec<I>,
    pub attribute: Attribute,
    pub value: Value,
}

/// Pending removal of one attribute from a set of entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveAttributeContext<I> {
    pub kind: EntityKind,
    pub indices: Vec<I>,
    pub attribute: Attribute,
}

/// Pending replacement of whole attribute sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceAttributesContext<I> {
    pub kind: EntityKind,
    pub indices: Vec<I>,
    pub attributes: Attributes,
}

// =============================================================================
// PLUGIN TRAIT
// =============================================================================

/// An ordered observer of mutating operations.
#[allow(unused_variables)]
pub trait Plugin: Debug + Send + Sync {
    /// Called once when the session is built, in registration order, before
    /// any operation hook fires.
    fn initialize(&self, session: &mut Session) -> Result<(), TrellisError> {
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Nodes & edges
    // -------------------------------------------------------------------------

    fn before_add_nodes(
        &self,
        session: &mut Session,
        context: AddNodesContext,
    ) -> Result<AddNodesContext, TrellisError> {
        Ok(context)
    }

    fn after_add_nodes(
        &self,
        session: &mut Session,
        context: &AddNodesContext,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_add_edges(
        &self,
        session: &mut Session,
        context: AddEdgesContext,
    ) -> Result<AddEdgesContext, TrellisError> {
        Ok(context)
    }

    /// `edges` are the indices the store assigned, in input order.
    fn after_add_edges(
        &self,
        session: &mut Session,
        context: &AddEdgesContext,
        edges: &[EdgeIndex],
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_remove_nodes(
        &self,
        session: &mut Session,
        context: RemoveNodesContext,
    ) -> Result<RemoveNodesContext, TrellisError> {
        Ok(context)
    }

    fn after_remove_nodes(
        &self,
        session: &mut Session,
        context: &RemoveNodesContext,
        removed: &BTreeMap<NodeIndex, Attributes>,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_remove_edges(
        &self,
        session: &mut Session,
        context: RemoveEdgesContext,
    ) -> Result<RemoveEdgesContext, TrellisError> {
        Ok(context)
    }

    fn after_remove_edges(
        &self,
        session: &mut Session,
        context: &RemoveEdgesContext,
        removed: &BTreeMap<EdgeIndex, Attributes>,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Groups
    // -------------------------------------------------------------------------

    fn before_add_group(
        &self,
        session: &mut Session,
        context: AddGroupContext,
    ) -> Result<AddGroupContext, TrellisError> {
        Ok(context)
    }

    fn after_add_group(
        &self,
        session: &mut Session,
        context: &AddGroupContext,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_remove_groups(
        &self,
        session: &mut Session,
        context: RemoveGroupsContext,
    ) -> Result<RemoveGroupsContext, TrellisError> {
        Ok(context)
    }

    fn after_remove_groups(
        &self,
        session: &mut Session,
        context: &RemoveGroupsContext,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_add_nodes_to_group(
        &self,
        session: &mut Session,
        context: AddNodesToGroupContext,
    ) -> Result<AddNodesToGroupContext, TrellisError> {
        Ok(context)
    }

    fn after_add_nodes_to_group(
        &self,
        session: &mut Session,
        context: &AddNodesToGroupContext,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_add_edges_to_group(
        &self,
        session: &mut Session,
        context: AddEdgesToGroupContext,
    ) -> Result<AddEdgesToGroupContext, TrellisError> {
        Ok(context)
    }

    fn after_add_edges_to_group(
        &self,
        session: &mut Session,
        context: &AddEdgesToGroupContext,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_remove_nodes_from_group(
        &self,
        session: &mut Session,
        context: RemoveNodesFromGroupContext,
    ) -> Result<RemoveNodesFromGroupContext, TrellisError> {
        Ok(context)
    }

    fn after_remove_nodes_from_group(
        &self,
        session: &mut Session,
        context: &RemoveNodesFromGroupContext,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_remove_edges_from_group(
        &self,
        session: &mut Session,
        context: RemoveEdgesFromGroupContext,
    ) -> Result<RemoveEdgesFromGroupContext, TrellisError> {
        Ok(context)
    }

    fn after_remove_edges_from_group(
        &self,
        session: &mut Session,
        context: &RemoveEdgesFromGroupContext,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------------

    fn before_update_node_attribute(
        &self,
        session: &mut Session,
        context: UpdateAttributeContext<NodeIndex>,
    ) -> Result<UpdateAttributeContext<NodeIndex>, TrellisError> {
        Ok(context)
    }

    fn after_update_node_attribute(
        &self,
        session: &mut Session,
        context: &UpdateAttributeContext<NodeIndex>,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_update_edge_attribute(
        &self,
        session: &mut Session,
        context: UpdateAttributeContext<EdgeIndex>,
    ) -> Result<UpdateAttributeContext<EdgeIndex>, TrellisError> {
        Ok(context)
    }

    fn after_update_edge_attribute(
        &self,
        session: &mut Session,
        context: &UpdateAttributeContext<EdgeIndex>,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_remove_node_attribute(
        &self,
        session: &mut Session,
        context: RemoveAttributeContext<NodeIndex>,
    ) -> Result<RemoveAttributeContext<NodeIndex>, TrellisError> {
        Ok(context)
    }

    fn after_remove_node_attribute(
        &self,
        session: &mut Session,
        context: &RemoveAttributeContext<NodeIndex>,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_remove_edge_attribute(
        &self,
        session: &mut Session,
        context: RemoveAttributeContext<EdgeIndex>,
    ) -> Result<RemoveAttributeContext<EdgeIndex>, TrellisError> {
        Ok(context)
    }

    fn after_remove_edge_attribute(
        &self,
        session: &mut Session,
        context: &RemoveAttributeContext<EdgeIndex>,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_replace_node_attributes(
        &self,
        session: &mut Session,
        context: ReplaceAttributesContext<NodeIndex>,
    ) -> Result<ReplaceAttributesContext<NodeIndex>, TrellisError> {
        Ok(context)
    }

    fn after_replace_node_attributes(
        &self,
        session: &mut Session,
        context: &ReplaceAttributesContext<NodeIndex>,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    fn before_replace_edge_attributes(
        &self,
        session: &mut Session,
        context: ReplaceAttributesContext<EdgeIndex>,
    ) -> Result<ReplaceAttributesContext<EdgeIndex>, TrellisError> {
        Ok(context)
    }

    fn after_replace_edge_attributes(
        &self,
        session: &mut Session,
        context: &ReplaceAttributesContext<EdgeIndex>,
    ) -> Result<(), TrellisError> {
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Whole store
    // -------------------------------------------------------------------------

    fn before_clear(&self, session: &mut Session) -> Result<(), TrellisError> {
        Ok(())
    }

    fn after_clear(&self, session: &mut Session) -> Result<(), TrellisError> {
        Ok(())
    }
}

// =============================================================================
// TRACING PLUGIN
// =============================================================================

/// Logs every applied mutation at `info` under [`AUDIT_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPlugin;

impl Plugin for TracingPlugin {
    fn initialize(&self, session: &mut Session) -> Result<(), TrellisError> {
        info!(
            target: AUDIT_TARGET,
            nodes = session.node_count(),
            edges = session.edge_count(),
            "audit attached"
        );
        Ok(())
    }

    fn after_add_nodes(
        &self,
        _session: &mut Session,
        context: &AddNodesContext,
    ) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, count = context.nodes.len(), group = ?context.group, "add_nodes");
        Ok(())
    }

    fn after_add_edges(
        &self,
        _session: &mut Session,
        context: &AddEdgesContext,
        edges: &[EdgeIndex],
    ) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, count = edges.len(), group = ?context.group, "add_edges");
        Ok(())
    }

    fn after_remove_nodes(
        &self,
        _session: &mut Session,
        _context: &RemoveNodesContext,
        removed: &BTreeMap<NodeIndex, Attributes>,
    ) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, count = removed.len(), "remove_nodes");
        Ok(())
    }

    fn after_remove_edges(
        &self,
        _session: &mut Session,
        _context: &RemoveEdgesContext,
        removed: &BTreeMap<EdgeIndex, Attributes>,
    ) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, count = removed.len(), "remove_edges");
        Ok(())
    }

    fn after_add_group(
        &self,
        _session: &mut Session,
        context: &AddGroupContext,
    ) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, group = %context.group, "add_group");
        Ok(())
    }

    fn after_remove_groups(
        &self,
        _session: &mut Session,
        context: &RemoveGroupsContext,
    ) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, count = context.groups.len(), "remove_groups");
        Ok(())
    }

    fn after_add_nodes_to_group(
        &self,
        _session: &mut Session,
        context: &AddNodesToGroupContext,
    ) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, group = %context.group, count = context.indices.len(), "add_nodes_to_group");
        Ok(())
    }

    fn after_add_edges_to_group(
        &self,
        _session: &mut Session,
        context: &AddEdgesToGroupContext,
    ) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, group = %context.group, count = context.indices.len(), "add_edges_to_group");
        Ok(())
    }

    fn after_remove_nodes_from_group(
        &self,
        _session: &mut Session,
        context: &RemoveNodesFromGroupContext,
    ) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, group = %context.group, count = context.indices.len(), "remove_nodes_from_group");
        Ok(())
    }

    fn after_remove_edges_from_group(
        &self,
        _session: &mut Session,
        context: &RemoveEdgesFromGroupContext,
    ) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, group = %context.group, count = context.indices.len(), "remove_edges_from_group");
        Ok(())
    }

    fn after_update_node_attribute(
        &self,
        _session: &mut Session,
        context: &UpdateAttributeContext<NodeIndex>,
    ) -> Result<(), TrellisError> {
        audit_update(context);
        Ok(())
    }

    fn after_update_edge_attribute(
        &self,
        _session: &mut Session,
        context: &UpdateAttributeContext<EdgeIndex>,
    ) -> Result<(), TrellisError> {
        audit_update(context);
        Ok(())
    }

    fn after_remove_node_attribute(
        &self,
        _session: &mut Session,
        context: &RemoveAttributeContext<NodeIndex>,
    ) -> Result<(), TrellisError> {
        audit_remove(context);
        Ok(())
    }

    fn after_remove_edge_attribute(
        &self,
        _session: &mut Session,
        context: &RemoveAttributeContext<EdgeIndex>,
    ) -> Result<(), TrellisError> {
        audit_remove(context);
        Ok(())
    }

    fn after_replace_node_attributes(
        &self,
        _session: &mut Session,
        context: &ReplaceAttributesContext<NodeIndex>,
    ) -> Result<(), TrellisError> {
        audit_replace(context);
        Ok(())
    }

    fn after_replace_edge_attributes(
        &self,
        _session: &mut Session,
        context: &ReplaceAttributesContext<EdgeIndex>,
    ) -> Result<(), TrellisError> {
        audit_replace(context);
        Ok(())
    }

    fn after_clear(&self, _session: &mut Session) -> Result<(), TrellisError> {
        info!(target: AUDIT_TARGET, "clear");
        Ok(())
    }
}

fn audit_update<I>(context: &UpdateAttributeContext<I>) {
    info!(
        target: AUDIT_TARGET,
        entity = %context.kind,
        count = context.indices.len(),
        attribute = %context.attribute,
        value = %context.value,
        "update_attribute"
    );
}

fn audit_remove<I>(context: &RemoveAttributeContext<I>) {
    info!(
        target: AUDIT_TARGET,
        entity = %context.kind,
        count = context.indices.len(),
        attribute = %context.attribute,
        "remove_attribute"
    );
}

fn audit_replace<I>(context: &ReplaceAttributesContext<I>) {
    info!(
        target: AUDIT_TARGET,
        entity = %context.kind,
        count = context.indices.len(),
        attributes = context.attributes.len(),
        "replace_attributes"
    );
}

// =============================================================================
// TESTS
// =============================================================================
