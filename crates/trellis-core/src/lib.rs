//! # trellis-core
//!
//! A typed facade over a graph attribute store.
//!
//! Nodes and edges carry named attributes and may belong to named groups.
//! On top of any [`GraphStore`] this crate provides:
//!
//! - **Typed queries**: an operand builder whose terminal operand fixes the
//!   result type, resolved through a small wire vocabulary ([`query`])
//! - **Two-axis indexing**: get/set/delete over entity and attribute
//!   [`Selector`]s ([`indexer`])
//! - **Interception**: ordered before/after [`Plugin`] hooks around every
//!   mutation, with a per-session reentrancy guard ([`session`])
//!
//! ## Constraints
//!
//! - Synchronous and single-threaded; no background work
//! - Deterministic: ordered collections only, so identical call sequences
//!   give identical results
//! - No persistence; [`Graph`] is an in-memory store

// =============================================================================
// MODULES
// =============================================================================

pub mod entity;
pub mod indexer;
pub mod plugin;
pub mod query;
pub mod selector;
pub mod session;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    Attribute, Attributes, EdgeIndex, EntityKey, EntityKind, Group, NodeIndex, TrellisError,
    Value,
};

// =============================================================================
// RE-EXPORTS: Facade
// =============================================================================

pub use entity::{Edge, Entity, Node};
pub use indexer::{Indexer, Lookup};
pub use plugin::{
    AUDIT_TARGET, AddEdgesContext, AddEdgesToGroupContext, AddGroupContext, AddNodesContext,
    AddNodesToGroupContext, MembershipContext, Plugin, RemoveAttributeContext,
    RemoveEdgesContext, RemoveEdgesFromGroupContext, RemoveGroupsContext, RemoveNodesContext,
    RemoveNodesFromGroupContext, ReplaceAttributesContext, TracingPlugin, UpdateAttributeContext,
};
pub use selector::{AttributeSelector, Selector};
pub use session::Session;

// =============================================================================
// RE-EXPORTS: Queries & Store
// =============================================================================

pub use query::{
    EdgeOperand, Groupable, NodeOperand, Query, QueryDescriptor, QueryResult, ResultKind,
    ReturnOperand, WireResult, WireShape,
};
pub use store::{Graph, GraphStore};
