//! # Operand Builder
//!
//! Typed construction of query descriptors.
//!
//! A query function receives a mutable [`EntityOperand`], narrows it with
//! filters, and returns a terminal operand. Every terminal operand
//! implements [`ReturnOperand`], whose associated `Output` is the statically
//! typed result the caller gets back:
//!
//! ```
//! use trellis_core::{NodeIndex, Session};
//!
//! let session = Session::new();
//! let all: Vec<NodeIndex> = session.query_nodes(|node| node.index()).expect("query");
//! let oldest: Option<NodeIndex> = session
//!     .query_nodes(|node| {
//!         node.has_attribute("age");
//!         node.index().max()
//!     })
//!     .expect("query");
//! assert!(all.is_empty() && oldest.is_none());
//! ```
//!
//! Tuples of return operands form composite queries, and `grouped()` turns
//! any single-descriptor operand into a per-group mapping.

use super::{Comparison, Filter, Projection, Query, QueryDescriptor, QueryResult, Reduction};
use crate::entity::{Edge, Entity};
use crate::types::{Attribute, Attributes, EntityKey, Group, NodeIndex, TrellisError, Value};
use std::collections::BTreeMap;
use std::marker::PhantomData;

// =============================================================================
// RETURN OPERANDS
// =============================================================================

/// A terminal operand: knows its query and how to type the result.
pub trait ReturnOperand {
    /// Statically typed result.
    type Output;

    /// The query this operand stands for.
    fn into_query(self) -> Query;

    /// Type a reconstructed result.
    fn extract(result: QueryResult) -> Result<Self::Output, TrellisError>;
}

/// A return operand backed by exactly one descriptor.
pub trait Groupable: ReturnOperand + Sized {
    /// The descriptor this operand stands for.
    fn into_descriptor(self) -> QueryDescriptor;

    /// Evaluate once per store group.
    #[must_use]
    fn grouped(self) -> Grouped<Self> {
        Grouped(self)
    }
}

/// Return operands that yield indices on axis `E`. Usable as entity selectors.
pub trait IndexReturn<E: Entity>: Groupable {}

/// Return operands that yield attribute names. Usable as attribute selectors.
pub trait AttributeReturn: Groupable {}

fn unexpected(expected: &str, result: &QueryResult) -> TrellisError {
    TrellisError::QueryShape(format!(
        "expected {expected} result, got {}",
        result.variant_name()
    ))
}

fn typed_keys<E: Entity, T>(
    entries: BTreeMap<EntityKey, T>,
) -> Result<BTreeMap<E::Index, T>, TrellisError> {
    entries
        .into_iter()
        .map(|(key, item)| Ok((E::from_key(key)?, item)))
        .collect()
}

fn typed_entry<E: Entity, T>(
    entry: Option<(EntityKey, T)>,
) -> Result<Option<(E::Index, T)>, TrellisError> {
    entry
        .map(|(key, item)| Ok((E::from_key(key)?, item)))
        .transpose()
}

// =============================================================================
// ENTITY OPERAND
// =============================================================================

/// Filters accumulated so far on one axis.
#[derive(Debug, Clone)]
struct Selection<E: Entity> {
    filters: Vec<Filter>,
    entity: PhantomData<E>,
}

impl<E: Entity> Selection<E> {
    fn descriptor(self, projection: Projection) -> QueryDescriptor {
        QueryDescriptor {
            entity: E::KIND,
            filters: self.filters,
            projection,
            grouped: false,
        }
    }
}

/// Builder handed to query functions.
#[derive(Debug, Clone)]
pub struct EntityOperand<E: Entity> {
    selection: Selection<E>,
}

/// Builder over nodes.
pub type NodeOperand = EntityOperand<crate::entity::Node>;

/// Builder over edges.
pub type EdgeOperand = EntityOperand<Edge>;

impl<E: Entity> EntityOperand<E> {
    pub(crate) fn new() -> Self {
        Self {
            selection: Selection {
                filters: Vec::new(),
                entity: PhantomData,
            },
        }
    }

    fn push(&mut self, filter: Filter) -> &mut Self {
        self.selection.filters.push(filter);
        self
    }

    /// Keep entities that belong to `group`.
    pub fn in_group(&mut self, group: impl Into<Group>) -> &mut Self {
        self.push(Filter::InGroup(group.into()))
    }

    /// Keep entities that carry `attribute`.
    pub fn has_attribute(&mut self, attribute: impl Into<Attribute>) -> &mut Self {
        self.push(Filter::HasAttribute(attribute.into()))
    }

    /// Start a value filter on `attribute`.
    pub fn attribute(&mut self, attribute: impl Into<Attribute>) -> AttributeFilter<'_, E> {
        AttributeFilter {
            operand: self,
            attribute: attribute.into(),
        }
    }

    /// Keep entities whose index is listed.
    pub fn index_in<I: Into<E::Index>>(&mut self, indices: impl IntoIterator<Item = I>) -> &mut Self {
        let keys = indices.into_iter().map(|index| E::key(index.into())).collect();
        self.push(Filter::IndexIn(keys))
    }

    /// Every matching index.
    #[must_use]
    pub fn index(&self) -> IndicesOperand<E> {
        IndicesOperand {
            selection: self.selection.clone(),
        }
    }

    /// Full attribute set of every matching entity.
    #[must_use]
    pub fn attributes(&self) -> AttributesTreeOperand<E> {
        AttributesTreeOperand {
            selection: self.selection.clone(),
        }
    }

    /// Value of `attribute` on every matching entity that carries it.
    #[must_use]
    pub fn values(&self, attribute: impl Into<Attribute>) -> MultipleValuesOperand<E> {
        MultipleValuesOperand {
            selection: self.selection.clone(),
            attribute: attribute.into(),
        }
    }
}

impl EntityOperand<Edge> {
    /// Keep edges leaving one of `nodes`.
    pub fn source_in<I: Into<NodeIndex>>(&mut self, nodes: impl IntoIterator<Item = I>) -> &mut Self {
        let nodes = nodes.into_iter().map(Into::into).collect();
        self.push(Filter::SourceIn(nodes))
    }

    /// Keep edges entering one of `nodes`.
    pub fn target_in<I: Into<NodeIndex>>(&mut self, nodes: impl IntoIterator<Item = I>) -> &mut Self {
        let nodes = nodes.into_iter().map(Into::into).collect();
        self.push(Filter::TargetIn(nodes))
    }
}

/// Pending value filter on one attribute.
#[derive(Debug)]
pub struct AttributeFilter<'a, E: Entity> {
    operand: &'a mut EntityOperand<E>,
    attribute: Attribute,
}

impl<'a, E: Entity> AttributeFilter<'a, E> {
    fn compare(self, comparison: Comparison, value: Value) -> &'a mut EntityOperand<E> {
        self.operand.push(Filter::Compare {
            attribute: self.attribute,
            comparison,
            value,
        })
    }

    pub fn equal_to(self, value: impl Into<Value>) -> &'a mut EntityOperand<E> {
        self.compare(Comparison::Equal, value.into())
    }

    pub fn not_equal_to(self, value: impl Into<Value>) -> &'a mut EntityOperand<E> {
        self.compare(Comparison::NotEqual, value.into())
    }

    pub fn greater_than(self, value: impl Into<Value>) -> &'a mut EntityOperand<E> {
        self.compare(Comparison::Greater, value.into())
    }

    pub fn greater_than_or_equal_to(self, value: impl Into<Value>) -> &'a mut EntityOperand<E> {
        self.compare(Comparison::GreaterOrEqual, value.into())
    }

    pub fn less_than(self, value: impl Into<Value>) -> &'a mut EntityOperand<E> {
        self.compare(Comparison::Less, value.into())
    }

    pub fn less_than_or_equal_to(self, value: impl Into<Value>) -> &'a mut EntityOperand<E> {
        self.compare(Comparison::LessOrEqual, value.into())
    }

    /// Value equals one of `values`.
    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> &'a mut EntityOperand<E> {
        self.operand.push(Filter::OneOf {
            attribute: self.attribute,
            values: values.into_iter().map(Into::into).collect(),
        })
    }
}

// =============================================================================
// TERMINAL OPERANDS
// =============================================================================

/// Adds `max`, `min`, `first` and `last` forwarding to a private `reduce`.
macro_rules! reductions {
    ($target:ident) => {
        #[must_use]
        pub fn max(self) -> $target<E> {
            self.reduce(Reduction::Max)
        }

        #[must_use]
        pub fn min(self) -> $target<E> {
            self.reduce(Reduction::Min)
        }

        #[must_use]
        pub fn first(self) -> $target<E> {
            self.reduce(Reduction::First)
        }

        #[must_use]
        pub fn last(self) -> $target<E> {
            self.reduce(Reduction::Last)
        }
    };
}

/// Implements `ReturnOperand` and `Groupable` for a terminal operand.
macro_rules! terminal {
    ($name:ident => $output:ty, |$this:ident| $projection:expr, |$result:ident| $extract:expr) => {
        impl<E: Entity> ReturnOperand for $name<E> {
            type Output = $output;

            fn into_query(self) -> Query {
                Query::Single(self.into_descriptor())
            }

            fn extract($result: QueryResult) -> Result<Self::Output, TrellisError> {
                $extract
            }
        }

        impl<E: Entity> Groupable for $name<E> {
            fn into_descriptor(self) -> QueryDescriptor {
                let $this = self;
                let projection = $projection;
                $this.selection.descriptor(projection)
            }
        }
    };
}

/// Every matching index.
#[derive(Debug, Clone)]
pub struct IndicesOperand<E: Entity> {
    selection: Selection<E>,
}

impl<E: Entity> IndicesOperand<E> {
    fn reduce(self, reduction: Reduction) -> IndexOperand<E> {
        IndexOperand {
            selection: self.selection,
            reduction,
        }
    }

    reductions!(IndexOperand);
}

terminal!(IndicesOperand => Vec<E::Index>, |this| Projection::Indices, |result| match result {
    QueryResult::Indices(keys) => keys.into_iter().map(E::from_key).collect(),
    other => Err(unexpected("indices", &other)),
});

impl<E: Entity> IndexReturn<E> for IndicesOperand<E> {}

/// One matching index.
#[derive(Debug, Clone)]
pub struct IndexOperand<E: Entity> {
    selection: Selection<E>,
    reduction: Reduction,
}

terminal!(IndexOperand => Option<E::Index>, |this| Projection::Index { reduction: this.reduction }, |result| match result {
    QueryResult::Index(key) => key.map(E::from_key).transpose(),
    other => Err(unexpected("index", &other)),
});

impl<E: Entity> IndexReturn<E> for IndexOperand<E> {}

/// Full attribute set per matching entity.
#[derive(Debug, Clone)]
pub struct AttributesTreeOperand<E: Entity> {
    selection: Selection<E>,
}

impl<E: Entity> AttributesTreeOperand<E> {
    fn reduce(self, reduction: Reduction) -> MultipleAttributesOperand<E> {
        MultipleAttributesOperand {
            selection: self.selection,
            reduction,
        }
    }

    reductions!(MultipleAttributesOperand);
}

terminal!(AttributesTreeOperand => BTreeMap<E::Index, Attributes>, |this| Projection::AttributesTree, |result| match result {
    QueryResult::AttributesTree(entries) => typed_keys::<E, _>(entries),
    other => Err(unexpected("attributes tree", &other)),
});

/// One attribute name per matching entity, keyed by index.
#[derive(Debug, Clone)]
pub struct MultipleAttributesOperand<E: Entity> {
    selection: Selection<E>,
    reduction: Reduction,
}

impl<E: Entity> MultipleAttributesOperand<E> {
    fn reduce(self, across: Reduction) -> SingleAttributeOperand<E> {
        SingleAttributeOperand {
            selection: self.selection,
            per_entity: self.reduction,
            across,
        }
    }

    reductions!(SingleAttributeOperand);

    /// Drop the entity index from the result.
    #[must_use]
    pub fn without_index(self) -> MultipleAttributesWithoutIndexOperand<E> {
        MultipleAttributesWithoutIndexOperand {
            selection: self.selection,
            reduction: self.reduction,
        }
    }
}

terminal!(MultipleAttributesOperand => BTreeMap<E::Index, Attribute>, |this| Projection::MultipleAttributes { reduction: this.reduction, with_index: true }, |result| match result {
    QueryResult::Attributes(entries) => typed_keys::<E, _>(entries),
    other => Err(unexpected("keyed attributes", &other)),
});

impl<E: Entity> AttributeReturn for MultipleAttributesOperand<E> {}

/// One attribute name per matching entity, in index order.
#[derive(Debug, Clone)]
pub struct MultipleAttributesWithoutIndexOperand<E: Entity> {
    selection: Selection<E>,
    reduction: Reduction,
}

impl<E: Entity> MultipleAttributesWithoutIndexOperand<E> {
    fn reduce(self, across: Reduction) -> SingleAttributeWithoutIndexOperand<E> {
        SingleAttributeWithoutIndexOperand {
            selection: self.selection,
            per_entity: self.reduction,
            across,
        }
    }

    reductions!(SingleAttributeWithoutIndexOperand);
}

terminal!(MultipleAttributesWithoutIndexOperand => Vec<Attribute>, |this| Projection::MultipleAttributes { reduction: this.reduction, with_index: false }, |result| match result {
    QueryResult::AttributeList(names) => Ok(names),
    other => Err(unexpected("attribute list", &other)),
});

impl<E: Entity> AttributeReturn for MultipleAttributesWithoutIndexOperand<E> {}

/// One attribute name across matching entities, with its entity.
#[derive(Debug, Clone)]
pub struct SingleAttributeOperand<E: Entity> {
    selection: Selection<E>,
    per_entity: Reduction,
    across: Reduction,
}

impl<E: Entity> SingleAttributeOperand<E> {
    /// Drop the entity index from the result.
    #[must_use]
    pub fn without_index(self) -> SingleAttributeWithoutIndexOperand<E> {
        SingleAttributeWithoutIndexOperand {
            selection: self.selection,
            per_entity: self.per_entity,
            across: self.across,
        }
    }
}

terminal!(SingleAttributeOperand => Option<(E::Index, Attribute)>, |this| Projection::SingleAttribute { per_entity: this.per_entity, across: this.across, with_index: true }, |result| match result {
    QueryResult::KeyedAttribute(entry) => typed_entry::<E, _>(entry),
    other => Err(unexpected("keyed attribute", &other)),
});

impl<E: Entity> AttributeReturn for SingleAttributeOperand<E> {}

/// One attribute name across matching entities.
#[derive(Debug, Clone)]
pub struct SingleAttributeWithoutIndexOperand<E: Entity> {
    selection: Selection<E>,
    per_entity: Reduction,
    across: Reduction,
}

terminal!(SingleAttributeWithoutIndexOperand => Option<Attribute>, |this| Projection::SingleAttribute { per_entity: this.per_entity, across: this.across, with_index: false }, |result| match result {
    QueryResult::Attribute(name) => Ok(name),
    other => Err(unexpected("attribute", &other)),
});

impl<E: Entity> AttributeReturn for SingleAttributeWithoutIndexOperand<E> {}

/// Values of one attribute, keyed by index.
#[derive(Debug, Clone)]
pub struct MultipleValuesOperand<E: Entity> {
    selection: Selection<E>,
    attribute: Attribute,
}

impl<E: Entity> MultipleValuesOperand<E> {
    fn reduce(self, reduction: Reduction) -> SingleValueOperand<E> {
        SingleValueOperand {
            selection: self.selection,
            attribute: self.attribute,
            reduction,
        }
    }

    reductions!(SingleValueOperand);

    /// Number of matching entities carrying the attribute.
    #[must_use]
    pub fn count(self) -> SingleValueWithoutIndexOperand<E> {
        SingleValueWithoutIndexOperand {
            selection: self.selection,
            projection: Projection::ValueCount {
                attribute: self.attribute,
            },
        }
    }

    /// Drop the entity index from the result.
    #[must_use]
    pub fn without_index(self) -> MultipleValuesWithoutIndexOperand<E> {
        MultipleValuesWithoutIndexOperand {
            selection: self.selection,
            attribute: self.attribute,
        }
    }
}

terminal!(MultipleValuesOperand => BTreeMap<E::Index, Value>, |this| Projection::MultipleValues { attribute: this.attribute.clone(), with_index: true }, |result| match result {
    QueryResult::Values(entries) => typed_keys::<E, _>(entries),
    other => Err(unexpected("keyed values", &other)),
});

/// Values of one attribute, in index order.
#[derive(Debug, Clone)]
pub struct MultipleValuesWithoutIndexOperand<E: Entity> {
    selection: Selection<E>,
    attribute: Attribute,
}

impl<E: Entity> MultipleValuesWithoutIndexOperand<E> {
    fn reduce(self, reduction: Reduction) -> SingleValueWithoutIndexOperand<E> {
        SingleValueWithoutIndexOperand {
            selection: self.selection,
            projection: Projection::SingleValue {
                attribute: self.attribute,
                reduction,
                with_index: false,
            },
        }
    }

    reductions!(SingleValueWithoutIndexOperand);

    /// Number of matching entities carrying the attribute.
    #[must_use]
    pub fn count(self) -> SingleValueWithoutIndexOperand<E> {
        SingleValueWithoutIndexOperand {
            selection: self.selection,
            projection: Projection::ValueCount {
                attribute: self.attribute,
            },
        }
    }
}

terminal!(MultipleValuesWithoutIndexOperand => Vec<Value>, |this| Projection::MultipleValues { attribute: this.attribute.clone(), with_index: false }, |result| match result {
    QueryResult::ValueList(values) => Ok(values),
    other => Err(unexpected("value list", &other)),
});

/// One value across matching entities, with its entity.
#[derive(Debug, Clone)]
pub struct SingleValueOperand<E: Entity> {
    selection: Selection<E>,
    attribute: Attribute,
    reduction: Reduction,
}

impl<E: Entity> SingleValueOperand<E> {
    /// Drop the entity index from the result.
    #[must_use]
    pub fn without_index(self) -> SingleValueWithoutIndexOperand<E> {
        SingleValueWithoutIndexOperand {
            selection: self.selection,
            projection: Projection::SingleValue {
                attribute: self.attribute,
                reduction: self.reduction,
                with_index: false,
            },
        }
    }
}

terminal!(SingleValueOperand => Option<(E::Index, Value)>, |this| Projection::SingleValue { attribute: this.attribute.clone(), reduction: this.reduction, with_index: true }, |result| match result {
    QueryResult::KeyedValue(entry) => typed_entry::<E, _>(entry),
    other => Err(unexpected("keyed value", &other)),
});

/// One value across matching entities, or a count.
#[derive(Debug, Clone)]
pub struct SingleValueWithoutIndexOperand<E: Entity> {
    selection: Selection<E>,
    projection: Projection,
}

terminal!(SingleValueWithoutIndexOperand => Option<Value>, |this| this.projection.clone(), |result| match result {
    QueryResult::Value(value) => Ok(value),
    other => Err(unexpected("value", &other)),
});

// =============================================================================
// GROUPED & COMPOSITE
// =============================================================================

/// Per-group evaluation of a single-descriptor operand.
#[derive(Debug, Clone)]
pub struct Grouped<R>(R);

impl<R: Groupable> ReturnOperand for Grouped<R> {
    type Output = BTreeMap<Group, R::Output>;

    fn into_query(self) -> Query {
        let mut descriptor = self.0.into_descriptor();
        descriptor.grouped = true;
        Query::Single(descriptor)
    }

    fn extract(result: QueryResult) -> Result<Self::Output, TrellisError> {
        match result {
            QueryResult::Grouped(entries) => entries
                .into_iter()
                .map(|(group, result)| Ok((group, R::extract(result)?)))
                .collect(),
            other => Err(unexpected("grouped", &other)),
        }
    }
}

/// Implements `ReturnOperand` for a tuple of return operands.
macro_rules! composite {
    ($($part:ident),+) => {
        impl<$($part: ReturnOperand),+> ReturnOperand for ($($part,)+) {
            type Output = ($($part::Output,)+);

            #[allow(non_snake_case)]
            fn into_query(self) -> Query {
                let ($($part,)+) = self;
                Query::Composite(vec![$($part.into_query()),+])
            }

            fn extract(result: QueryResult) -> Result<Self::Output, TrellisError> {
                let parts = match result {
                    QueryResult::Composite(parts) => parts,
                    other => return Err(unexpected("composite", &other)),
                };
                let mut parts = parts.into_iter();
                let output = ($(
                    $part::extract(parts.next().ok_or_else(|| {
                        TrellisError::QueryShape("composite result is missing an element".to_string())
                    })?)?,
                )+);
                if parts.next().is_some() {
                    return Err(TrellisError::QueryShape(
                        "composite result has extra elements".to_string(),
                    ));
                }
                Ok(output)
            }
        }
    };
}

composite!(A, B);
composite!(A, B, C);
composite!(A, B, C, D);

// =============================================================================
// TESTS
// =============================================================================
