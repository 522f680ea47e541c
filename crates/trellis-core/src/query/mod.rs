//! # Query Module
//!
//! Predicate queries over nodes and edges.
//!
//! A caller builds a query with the typed operand builder in [`operand`]; the
//! builder accumulates a [`QueryDescriptor`]: the entity axis, a list of
//! [`Filter`]s, and a [`Projection`] that fixes the [`ResultKind`].
//! The [`resolver`] collapses result kinds into four wire shapes for the
//! store call, then reconstructs the caller-visible [`QueryResult`].
//!
//! ## Result Kinds
//!
//! | kind | typed output |
//! |---|---|
//! | attribute tree | `BTreeMap<Index, Attributes>` |
//! | multiple attributes (with / without index) | `BTreeMap<Index, Attribute>` / `Vec<Attribute>` |
//! | single attribute (with / without index) | `Option<(Index, Attribute)>` / `Option<Attribute>` |
//! | indices | `Vec<Index>` |
//! | index | `Option<Index>` |
//! | multiple values (with / without index) | `BTreeMap<Index, Value>` / `Vec<Value>` |
//! | single value (with / without index) | `Option<(Index, Value)>` / `Option<Value>` |
//!
//! Every kind has a grouped variant evaluated once per store group, and any
//! fixed-arity tuple of return operands forms a composite query.

pub mod operand;
pub mod resolver;

pub use operand::{
    AttributeFilter, AttributeReturn, AttributesTreeOperand, EdgeOperand, EntityOperand, Grouped,
    Groupable, IndexOperand, IndexReturn, IndicesOperand, MultipleAttributesOperand,
    MultipleAttributesWithoutIndexOperand, MultipleValuesOperand,
    MultipleValuesWithoutIndexOperand, NodeOperand, ReturnOperand, SingleAttributeOperand,
    SingleAttributeWithoutIndexOperand, SingleValueOperand, SingleValueWithoutIndexOperand,
};
pub use resolver::{QueryResult, WireResult, WireShape, classify, reconstruct, resolve};

use crate::types::{Attribute, EntityKey, EntityKind, Group, NodeIndex, Value};
use serde::{Deserialize, Serialize};

// =============================================================================
// FILTERS
// =============================================================================

/// Comparison operator used by attribute filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

/// One predicate on the entities a query matches.
///
/// Filters combine conjunctively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Entity is a member of the group.
    InGroup(Group),
    /// Entity carries the attribute, whatever its value.
    HasAttribute(Attribute),
    /// Entity carries the attribute and its value compares as requested.
    Compare {
        attribute: Attribute,
        comparison: Comparison,
        value: Value,
    },
    /// Entity carries the attribute and its value equals one of the listed values.
    OneOf {
        attribute: Attribute,
        values: Vec<Value>,
    },
    /// Entity index is one of the listed keys.
    IndexIn(Vec<EntityKey>),
    /// Edge source is one of the listed nodes. Never matches nodes.
    SourceIn(Vec<NodeIndex>),
    /// Edge target is one of the listed nodes. Never matches nodes.
    TargetIn(Vec<NodeIndex>),
}

// =============================================================================
// PROJECTIONS
// =============================================================================

/// How a multiplicity result is reduced to a single optional result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reduction {
    Max,
    Min,
    First,
    Last,
}

/// What a query returns for the entities it matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Full attribute set per entity.
    AttributesTree,
    /// One attribute name per entity, chosen by `reduction`.
    MultipleAttributes {
        reduction: Reduction,
        with_index: bool,
    },
    /// One attribute name per entity (`per_entity`), then one across entities (`across`).
    SingleAttribute {
        per_entity: Reduction,
        across: Reduction,
        with_index: bool,
    },
    /// Every matching index.
    Indices,
    /// One matching index.
    Index { reduction: Reduction },
    /// The value of `attribute` on every matching entity that carries it.
    MultipleValues { attribute: Attribute, with_index: bool },
    /// One value of `attribute` across matching entities.
    SingleValue {
        attribute: Attribute,
        reduction: Reduction,
        with_index: bool,
    },
    /// Number of matching entities that carry `attribute`.
    ValueCount { attribute: Attribute },
}

/// The closed result-kind taxonomy.
///
/// Entity axis and grouping are carried separately on the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultKind {
    AttributesTree,
    MultipleAttributesWithIndex,
    MultipleAttributesWithoutIndex,
    SingleAttributeWithIndex,
    SingleAttributeWithoutIndex,
    Indices,
    Index,
    MultipleValuesWithIndex,
    MultipleValuesWithoutIndex,
    SingleValueWithIndex,
    SingleValueWithoutIndex,
}

impl ResultKind {
    /// Whether the kind yields at most one result.
    #[must_use]
    pub const fn is_singular(self) -> bool {
        matches!(
            self,
            Self::SingleAttributeWithIndex
                | Self::SingleAttributeWithoutIndex
                | Self::Index
                | Self::SingleValueWithIndex
                | Self::SingleValueWithoutIndex
        )
    }

    /// Whether the kind yields entity indices.
    #[must_use]
    pub const fn yields_indices(self) -> bool {
        matches!(self, Self::Indices | Self::Index)
    }

    /// Whether the kind yields attribute names.
    #[must_use]
    pub const fn yields_attribute_names(self) -> bool {
        matches!(
            self,
            Self::MultipleAttributesWithIndex
                | Self::MultipleAttributesWithoutIndex
                | Self::SingleAttributeWithIndex
                | Self::SingleAttributeWithoutIndex
        )
    }
}

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// Accumulated description of one predicate query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Entity axis the filters run over.
    pub entity: EntityKind,
    /// Conjunctive filters.
    pub filters: Vec<Filter>,
    /// What the query returns.
    pub projection: Projection,
    /// Evaluate once per store group instead of once overall.
    pub grouped: bool,
}

impl QueryDescriptor {
    /// Create an ungrouped descriptor with no filters.
    #[must_use]
    pub const fn new(entity: EntityKind, projection: Projection) -> Self {
        Self {
            entity,
            filters: Vec::new(),
            projection,
            grouped: false,
        }
    }

    /// Add a filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// The result kind implied by the projection.
    #[must_use]
    pub const fn kind(&self) -> ResultKind {
        match &self.projection {
            Projection::AttributesTree => ResultKind::AttributesTree,
            Projection::MultipleAttributes { with_index, .. } => {
                if *with_index {
                    ResultKind::MultipleAttributesWithIndex
                } else {
                    ResultKind::MultipleAttributesWithoutIndex
                }
            }
            Projection::SingleAttribute { with_index, .. } => {
                if *with_index {
                    ResultKind::SingleAttributeWithIndex
                } else {
                    ResultKind::SingleAttributeWithoutIndex
                }
            }
            Projection::Indices => ResultKind::Indices,
            Projection::Index { .. } => ResultKind::Index,
            Projection::MultipleValues { with_index, .. } => {
                if *with_index {
                    ResultKind::MultipleValuesWithIndex
                } else {
                    ResultKind::MultipleValuesWithoutIndex
                }
            }
            Projection::SingleValue { with_index, .. } => {
                if *with_index {
                    ResultKind::SingleValueWithIndex
                } else {
                    ResultKind::SingleValueWithoutIndex
                }
            }
            Projection::ValueCount { .. } => ResultKind::SingleValueWithoutIndex,
        }
    }
}

/// A query as handed to the resolver: one descriptor or a fixed-arity composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Single(QueryDescriptor),
    Composite(Vec<Query>),
}

impl From<QueryDescriptor> for Query {
    fn from(descriptor: QueryDescriptor) -> Self {
        Self::Single(descriptor)
    }
}

// =============================================================================
// TESTS
// =============================================================================
