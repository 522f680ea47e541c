//! # Session Module
//!
//! The facade: a store, an ordered plugin list, and the reentrancy guard
//! that wraps every mutating call.
//!
//! ## Interception
//!
//! Each mutation runs `before* -> store -> after*` with the guard held for
//! the whole sequence. The guard is released on every exit path, so a
//! failed call never blocks the next one. Mutations issued by a hook while
//! the guard is held skip the chain and go straight to the store.
//!
//! A mutation whose resolved target list is empty is a no-op and fires no
//! hooks.

use crate::entity::{Edge, Entity, Node};
use crate::indexer::Indexer;
use crate::plugin::{
    AddEdgesContext, AddGroupContext, AddNodesContext, MembershipContext, Plugin,
    RemoveAttributeContext, RemoveEdgesContext, RemoveGroupsContext, RemoveNodesContext,
    ReplaceAttributesContext, UpdateAttributeContext,
};
use crate::query::{EdgeOperand, EntityOperand, NodeOperand, Query, QueryResult, ReturnOperand, resolve};
use crate::selector::Selector;
use crate::store::{Graph, GraphStore};
use crate::types::{Attribute, Attributes, EdgeIndex, Group, NodeIndex, TrellisError, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

// =============================================================================
// REENTRANCY GUARD
// =============================================================================

/// Per-session flag set while a hook chain is running.
#[derive(Debug, Default)]
struct HookGuard(Arc<AtomicBool>);

impl HookGuard {
    /// Take the guard, or `None` if a chain is already running.
    fn try_enter(&self) -> Option<HookScope> {
        self.0
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| HookScope(Arc::clone(&self.0)))
    }

    fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the guard when dropped.
#[derive(Debug)]
struct HookScope(Arc<AtomicBool>);

impl Drop for HookScope {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// A graph store behind selectors, typed queries and the plugin pipeline.
#[derive(Debug)]
pub struct Session {
    store: Box<dyn GraphStore>,
    plugins: Arc<Vec<Box<dyn Plugin>>>,
    guard: HookGuard,
}

impl Default for Session {
    fn default() -> Self {
        Self::with_store(Graph::new())
    }
}

impl Session {
    /// Empty in-memory session without plugins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session over an existing store, without plugins.
    #[must_use]
    pub fn with_store(store: impl GraphStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            plugins: Arc::new(Vec::new()),
            guard: HookGuard::default(),
        }
    }

    /// Session over `store` with `plugins` in hook order.
    ///
    /// Each plugin's `initialize` runs once, in order, before this returns.
    /// Mutations made from `initialize` do not fire hooks.
    pub fn with_plugins(
        store: impl GraphStore + 'static,
        plugins: Vec<Box<dyn Plugin>>,
    ) -> Result<Self, TrellisError> {
        let mut session = Self {
            store: Box::new(store),
            plugins: Arc::new(plugins),
            guard: HookGuard::default(),
        };
        let plugins = Arc::clone(&session.plugins);
        let scope = session.guard.try_enter();
        for plugin in plugins.iter() {
            debug!(?plugin, "initialize plugin");
            plugin.initialize(&mut session)?;
        }
        drop(scope);
        Ok(session)
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn GraphStore {
        self.store.as_ref()
    }

    /// True while a hook chain is running on this session.
    #[must_use]
    pub fn in_hooks(&self) -> bool {
        self.guard.is_held()
    }

    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn nodes(&self) -> Vec<NodeIndex> {
        self.store.node_indices()
    }

    #[must_use]
    pub fn edges(&self) -> Vec<EdgeIndex> {
        self.store.edge_indices()
    }

    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.store.groups()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.store.node_indices().len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.store.edge_indices().len()
    }

    #[must_use]
    pub fn contains_node(&self, node: &NodeIndex) -> bool {
        self.store.contains_node(node)
    }

    #[must_use]
    pub fn contains_edge(&self, edge: &EdgeIndex) -> bool {
        self.store.contains_edge(edge)
    }

    #[must_use]
    pub fn contains_group(&self, group: &Group) -> bool {
        self.store.contains_group(group)
    }

    pub fn nodes_in_group(&self, group: &Group) -> Result<Vec<NodeIndex>, TrellisError> {
        self.store.nodes_in_group(group)
    }

    pub fn edges_in_group(&self, group: &Group) -> Result<Vec<EdgeIndex>, TrellisError> {
        self.store.edges_in_group(group)
    }

    /// Source and target of an edge.
    pub fn edge_endpoints(&self, edge: &EdgeIndex) -> Result<(NodeIndex, NodeIndex), TrellisError> {
        self.store.edge_endpoints(edge)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Resolve an untyped query.
    pub fn run_query(&self, query: &Query) -> Result<QueryResult, TrellisError> {
        resolve(self.store.as_ref(), query)
    }

    /// Build a node query with the operand builder and return its typed result.
    pub fn query_nodes<R: ReturnOperand>(
        &self,
        query: impl FnOnce(&mut NodeOperand) -> R,
    ) -> Result<R::Output, TrellisError> {
        self.typed_query(query)
    }

    /// Build an edge query with the operand builder and return its typed result.
    pub fn query_edges<R: ReturnOperand>(
        &self,
        query: impl FnOnce(&mut EdgeOperand) -> R,
    ) -> Result<R::Output, TrellisError> {
        self.typed_query(query)
    }

    fn typed_query<E: Entity, R: ReturnOperand>(
        &self,
        query: impl FnOnce(&mut EntityOperand<E>) -> R,
    ) -> Result<R::Output, TrellisError> {
        let mut operand = EntityOperand::new();
        let query = query(&mut operand).into_query();
        R::extract(self.run_query(&query)?)
    }

    // -------------------------------------------------------------------------
    // Indexers
    // -------------------------------------------------------------------------

    /// Two-axis access to node attributes.
    pub fn node(&mut self) -> Indexer<'_, Node> {
        self.indexer()
    }

    /// Two-axis access to edge attributes.
    pub fn edge(&mut self) -> Indexer<'_, Edge> {
        self.indexer()
    }

    /// Two-axis access on the axis chosen by `E`.
    pub fn indexer<E: Entity>(&mut self) -> Indexer<'_, E> {
        Indexer::new(self)
    }

    // -------------------------------------------------------------------------
    // Entity mutations
    // -------------------------------------------------------------------------

    /// Insert nodes, optionally into `group` (created if absent).
    pub fn add_nodes(
        &mut self,
        nodes: Vec<(NodeIndex, Attributes)>,
        group: Option<Group>,
    ) -> Result<(), TrellisError> {
        if nodes.is_empty() {
            return Ok(());
        }
        self.intercept(
            "add_nodes",
            AddNodesContext { nodes, group },
            |plugin, session, context| plugin.before_add_nodes(session, context),
            |store, context| store.add_nodes(context.nodes.clone(), context.group.as_ref()),
            |plugin, session, context, _: &()| plugin.after_add_nodes(session, context),
        )
    }

    /// Insert edges between existing nodes. Returns the assigned indices.
    pub fn add_edges(
        &mut self,
        edges: Vec<(NodeIndex, NodeIndex, Attributes)>,
        group: Option<Group>,
    ) -> Result<Vec<EdgeIndex>, TrellisError> {
        if edges.is_empty() {
            return Ok(Vec::new());
        }
        self.intercept(
            "add_edges",
            AddEdgesContext { edges, group },
            |plugin, session, context| plugin.before_add_edges(session, context),
            |store, context| store.add_edges(context.edges.clone(), context.group.as_ref()),
            |plugin, session, context, edges: &Vec<EdgeIndex>| {
                plugin.after_add_edges(session, context, edges)
            },
        )
    }

    /// Remove nodes and their incident edges. Returns the removed attribute sets.
    pub fn remove_nodes(
        &mut self,
        nodes: impl Into<Selector<Node>>,
    ) -> Result<BTreeMap<NodeIndex, Attributes>, TrellisError> {
        let nodes = nodes.into().resolve(self.store())?.into_vec();
        if nodes.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.intercept(
            "remove_nodes",
            RemoveNodesContext { nodes },
            |plugin, session, context| plugin.before_remove_nodes(session, context),
            |store, context| store.remove_nodes(&context.nodes),
            |plugin, session, context, removed: &BTreeMap<NodeIndex, Attributes>| {
                plugin.after_remove_nodes(session, context, removed)
            },
        )
    }

    /// Remove edges. Returns the removed attribute sets.
    pub fn remove_edges(
        &mut self,
        edges: impl Into<Selector<Edge>>,
    ) -> Result<BTreeMap<EdgeIndex, Attributes>, TrellisError> {
        let edges = edges.into().resolve(self.store())?.into_vec();
        if edges.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.intercept(
            "remove_edges",
            RemoveEdgesContext { edges },
            |plugin, session, context| plugin.before_remove_edges(session, context),
            |store, context| store.remove_edges(&context.edges),
            |plugin, session, context, removed: &BTreeMap<EdgeIndex, Attributes>| {
                plugin.after_remove_edges(session, context, removed)
            },
        )
    }

    // -------------------------------------------------------------------------
    // Group mutations
    // -------------------------------------------------------------------------

    /// Create a group with optional initial members.
    pub fn add_group(
        &mut self,
        group: impl Into<Group>,
        nodes: Option<Selector<Node>>,
        edges: Option<Selector<Edge>>,
    ) -> Result<(), TrellisError> {
        let nodes = nodes
            .map(|selector| selector.resolve(self.store()).map(|targets| targets.into_vec()))
            .transpose()?;
        let edges = edges
            .map(|selector| selector.resolve(self.store()).map(|targets| targets.into_vec()))
            .transpose()?;
        self.intercept(
            "add_group",
            AddGroupContext {
                group: group.into(),
                nodes,
                edges,
            },
            |plugin, session, context| plugin.before_add_group(session, context),
            |store, context| {
                store.add_group(
                    context.group.clone(),
                    context.nodes.as_deref(),
                    context.edges.as_deref(),
                )
            },
            |plugin, session, context, _: &()| plugin.after_add_group(session, context),
        )
    }

    /// Remove groups. Their members stay in the graph.
    pub fn remove_groups<G: Into<Group>>(
        &mut self,
        groups: impl IntoIterator<Item = G>,
    ) -> Result<(), TrellisError> {
        let groups: Vec<Group> = groups.into_iter().map(Into::into).collect();
        if groups.is_empty() {
            return Ok(());
        }
        self.intercept(
            "remove_groups",
            RemoveGroupsContext { groups },
            |plugin, session, context| plugin.before_remove_groups(session, context),
            |store, context| store.remove_groups(&context.groups),
            |plugin, session, context, _: &()| plugin.after_remove_groups(session, context),
        )
    }

    pub fn add_nodes_to_group(
        &mut self,
        group: impl Into<Group>,
        nodes: impl Into<Selector<Node>>,
    ) -> Result<(), TrellisError> {
        let Some(context) = self.membership(group.into(), nodes.into())? else {
            return Ok(());
        };
        self.intercept(
            "add_nodes_to_group",
            context,
            |plugin, session, context| plugin.before_add_nodes_to_group(session, context),
            |store, context| store.add_nodes_to_group(&context.group, &context.indices),
            |plugin, session, context, _: &()| plugin.after_add_nodes_to_group(session, context),
        )
    }

    pub fn add_edges_to_group(
        &mut self,
        group: impl Into<Group>,
        edges: impl Into<Selector<Edge>>,
    ) -> Result<(), TrellisError> {
        let Some(context) = self.membership(group.into(), edges.into())? else {
            return Ok(());
        };
        self.intercept(
            "add_edges_to_group",
            context,
            |plugin, session, context| plugin.before_add_edges_to_group(session, context),
            |store, context| store.add_edges_to_group(&context.group, &context.indices),
            |plugin, session, context, _: &()| plugin.after_add_edges_to_group(session, context),
        )
    }

    pub fn remove_nodes_from_group(
        &mut self,
        group: impl Into<Group>,
        nodes: impl Into<Selector<Node>>,
    ) -> Result<(), TrellisError> {
        let Some(context) = self.membership(group.into(), nodes.into())? else {
            return Ok(());
        };
        self.intercept(
            "remove_nodes_from_group",
            context,
            |plugin, session, context| plugin.before_remove_nodes_from_group(session, context),
            |store, context| store.remove_nodes_from_group(&context.group, &context.indices),
            |plugin, session, context, _: &()| {
                plugin.after_remove_nodes_from_group(session, context)
            },
        )
    }

    pub fn remove_edges_from_group(
        &mut self,
        group: impl Into<Group>,
        edges: impl Into<Selector<Edge>>,
    ) -> Result<(), TrellisError> {
        let Some(context) = self.membership(group.into(), edges.into())? else {
            return Ok(());
        };
        self.intercept(
            "remove_edges_from_group",
            context,
            |plugin, session, context| plugin.before_remove_edges_from_group(session, context),
            |store, context| store.remove_edges_from_group(&context.group, &context.indices),
            |plugin, session, context, _: &()| {
                plugin.after_remove_edges_from_group(session, context)
            },
        )
    }

    fn membership<E: Entity>(
        &self,
        group: Group,
        selector: Selector<E>,
    ) -> Result<Option<MembershipContext<E::Index>>, TrellisError> {
        let indices = selector.resolve(self.store())?.into_vec();
        Ok((!indices.is_empty()).then_some(MembershipContext { group, indices }))
    }

    /// Remove every node, edge and group.
    pub fn clear(&mut self) -> Result<(), TrellisError> {
        self.intercept(
            "clear",
            (),
            |plugin, session, context| plugin.before_clear(session).map(|()| context),
            |store, _| {
                store.clear();
                Ok(())
            },
            |plugin, session, _, _: &()| plugin.after_clear(session),
        )
    }

    // -------------------------------------------------------------------------
    // Attribute mutations (driven by the indexer)
    // -------------------------------------------------------------------------

    pub(crate) fn update_attribute<E: Entity>(
        &mut self,
        indices: Vec<E::Index>,
        attribute: Attribute,
        value: Value,
    ) -> Result<(), TrellisError> {
        if indices.is_empty() {
            return Ok(());
        }
        self.intercept(
            "update_attribute",
            UpdateAttributeContext {
                kind: E::KIND,
                indices,
                attribute,
                value,
            },
            E::before_update,
            E::apply_update,
            E::after_update,
        )
    }

    pub(crate) fn remove_attribute<E: Entity>(
        &mut self,
        indices: Vec<E::Index>,
        attribute: Attribute,
    ) -> Result<(), TrellisError> {
        if indices.is_empty() {
            return Ok(());
        }
        self.intercept(
            "remove_attribute",
            RemoveAttributeContext {
                kind: E::KIND,
                indices,
                attribute,
            },
            E::before_remove,
            E::apply_remove,
            E::after_remove,
        )
    }

    pub(crate) fn replace_attributes<E: Entity>(
        &mut self,
        indices: Vec<E::Index>,
        attributes: Attributes,
    ) -> Result<(), TrellisError> {
        if indices.is_empty() {
            return Ok(());
        }
        self.intercept(
            "replace_attributes",
            ReplaceAttributesContext {
                kind: E::KIND,
                indices,
                attributes,
            },
            E::before_replace,
            E::apply_replace,
            E::after_replace,
        )
    }

    // -------------------------------------------------------------------------
    // Pipeline
    // -------------------------------------------------------------------------

    /// Run one mutation through the hook chain.
    ///
    /// The first failing before-hook aborts before the store is touched. A
    /// failing after-hook is returned, the store mutation stays applied, and
    /// later after-hooks do not run.
    fn intercept<C, T>(
        &mut self,
        operation: &'static str,
        context: C,
        before: impl Fn(&dyn Plugin, &mut Self, C) -> Result<C, TrellisError>,
        apply: impl FnOnce(&mut dyn GraphStore, &C) -> Result<T, TrellisError>,
        after: impl Fn(&dyn Plugin, &mut Self, &C, &T) -> Result<(), TrellisError>,
    ) -> Result<T, TrellisError> {
        let Some(_scope) = self.guard.try_enter() else {
            debug!(operation, "nested mutation, hooks skipped");
            return apply(self.store.as_mut(), &context);
        };

        let plugins = Arc::clone(&self.plugins);
        let mut context = context;
        for (position, plugin) in plugins.iter().enumerate() {
            debug!(operation, position, "before hook");
            context = before(plugin.as_ref(), self, context)?;
        }

        let result = apply(self.store.as_mut(), &context)?;

        for (position, plugin) in plugins.iter().enumerate() {
            debug!(operation, position, "after hook");
            if let Err(error) = after(plugin.as_ref(), self, &context, &result) {
                warn!(operation, position, %error, "after hook failed, mutation stays applied");
                return Err(error);
            }
        }
        Ok(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records hook calls into a shared log.
    #[derive(Debug)]
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn push(&self, entry: String) {
            self.log.lock().expect("log").push(entry);
        }
    }

    impl Plugin for Recorder {
        fn before_add_nodes(
            &self,
            _session: &mut Session,
            context: AddNodesContext,
        ) -> Result<AddNodesContext, TrellisError> {
            self.push(format!("{}.before", self.name));
            Ok(context)
        }

        fn after_add_nodes(
            &self,
            _session: &mut Session,
            _context: &AddNodesContext,
        ) -> Result<(), TrellisError> {
            self.push(format!("{}.after", self.name));
            Ok(())
        }
    }

    #[test]
    fn hooks_fire_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(Recorder {
                name: "p1",
                log: Arc::clone(&log),
            }),
            Box::new(Recorder {
                name: "p2",
                log: Arc::clone(&log),
            }),
        ];
        let mut session = Session::with_plugins(Graph::new(), plugins).expect("session");
        session
            .add_nodes(vec![(NodeIndex::from(0), Attributes::new())], None)
            .expect("add");
        assert_eq!(
            *log.lock().expect("log"),
            vec!["p1.before", "p2.before", "p1.after", "p2.after"]
        );
        assert!(!session.in_hooks());
    }

    #[test]
    fn empty_targets_fire_no_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(Recorder {
            name: "p",
            log: Arc::clone(&log),
        })];
        let mut session = Session::with_plugins(Graph::new(), plugins).expect("session");
        session.add_nodes(Vec::new(), None).expect("noop");
        assert!(log.lock().expect("log").is_empty());
    }

    #[test]
    fn guard_is_exclusive_and_released() {
        let guard = HookGuard::default();
        let scope = guard.try_enter();
        assert!(scope.is_some());
        assert!(guard.is_held());
        assert!(guard.try_enter().is_none());
        drop(scope);
        assert!(!guard.is_held());
        assert!(guard.try_enter().is_some());
    }

    #[test]
    fn remove_nodes_returns_attributes() {
        let mut session = Session::new();
        session
            .add_nodes(
                vec![
                    (NodeIndex::from("a"), Attributes::new()),
                    (NodeIndex::from("b"), Attributes::new()),
                ],
                Some(Group::from("g")),
            )
            .expect("add");
        session
            .add_edges(
                vec![(NodeIndex::from("a"), NodeIndex::from("b"), Attributes::new())],
                None,
            )
            .expect("edge");
        let removed = session.remove_nodes("a").expect("remove");
        assert_eq!(removed.len(), 1);
        assert_eq!(session.edge_count(), 0);
        assert_eq!(
            session.nodes_in_group(&Group::from("g")).expect("members"),
            vec![NodeIndex::from("b")]
        );
    }

    #[test]
    fn group_membership_through_selectors() {
        let mut session = Session::new();
        session
            .add_nodes(
                (0..4).map(|i| (NodeIndex::from(i), Attributes::new())).collect(),
                None,
            )
            .expect("add");
        session.add_group("all", Some(Selector::All), None).expect("group");
        session
            .remove_nodes_from_group("all", vec![NodeIndex::from(0), NodeIndex::from(3)])
            .expect("remove members");
        assert_eq!(
            session.nodes_in_group(&Group::from("all")).expect("members"),
            vec![NodeIndex::from(1), NodeIndex::from(2)]
        );
        session.remove_groups(["all"]).expect("remove group");
        assert!(session.groups().is_empty());
        assert_eq!(session.node_count(), 4);
    }

    #[test]
    fn typed_queries() {
        let mut session = Session::new();
        session
            .add_nodes(
                vec![
                    (
                        NodeIndex::from(0),
                        [(Attribute::from("age"), Value::Int(30))].into_iter().collect(),
                    ),
                    (
                        NodeIndex::from(1),
                        [(Attribute::from("age"), Value::Int(50))].into_iter().collect(),
                    ),
                ],
                None,
            )
            .expect("add");
        let oldest: Option<(NodeIndex, Value)> = session
            .query_nodes(|node| node.values("age").max())
            .expect("query");
        assert_eq!(oldest, Some((NodeIndex::from(1), Value::Int(50))));

        let (indices, count) = session
            .query_nodes(|node| (node.index(), node.values("age").count()))
            .expect("composite");
        assert_eq!(indices, vec![NodeIndex::from(0), NodeIndex::from(1)]);
        assert_eq!(count, Some(Value::Int(2)));

        let edges = session.query_edges(|edge| edge.index()).expect("edges");
        assert!(edges.is_empty());
    }

    #[test]
    fn clear_empties_everything() {
        let mut session = Session::new();
        session
            .add_nodes(vec![(NodeIndex::from(0), Attributes::new())], Some(Group::from("g")))
            .expect("add");
        session.clear().expect("clear");
        assert_eq!(session.node_count(), 0);
        assert!(session.groups().is_empty());
    }
}
