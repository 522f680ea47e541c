//! # Query Result Resolver
//!
//! Collapses the result-kind taxonomy into four wire shapes for the store
//! call, and reconstructs the caller-visible [`QueryResult`] from the store's
//! [`WireResult`].
//!
//! Grouped descriptors are resolved here, once per store group, by adding an
//! `InGroup` filter to an ungrouped copy. Composite queries are never
//! collapsed: every element is resolved independently.

use super::{Filter, Query, QueryDescriptor, ResultKind};
use crate::store::GraphStore;
use crate::types::{Attribute, Attributes, EntityKey, Group, TrellisError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

// =============================================================================
// WIRE SHAPES
// =============================================================================

/// The four shapes a store result can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireShape {
    /// Bare optional value.
    Scalar,
    /// Ordered sequence of entity indices.
    IndexSequence,
    /// Attribute set keyed by entity index.
    KeyedAttributes,
    /// One value keyed by entity index.
    KeyedValues,
}

/// A store's answer to one ungrouped descriptor.
///
/// Attribute names travel as `Value`s inside `KeyedValues` and `Scalar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireResult {
    Scalar(Option<Value>),
    IndexSequence(Vec<EntityKey>),
    KeyedAttributes(Vec<(EntityKey, Attributes)>),
    KeyedValues(Vec<(EntityKey, Value)>),
}

impl WireResult {
    /// The shape of this result.
    #[must_use]
    pub const fn shape(&self) -> WireShape {
        match self {
            Self::Scalar(_) => WireShape::Scalar,
            Self::IndexSequence(_) => WireShape::IndexSequence,
            Self::KeyedAttributes(_) => WireShape::KeyedAttributes,
            Self::KeyedValues(_) => WireShape::KeyedValues,
        }
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// Reconstructed, caller-visible query result.
///
/// Singular kinds use `Option`: `None` means the query matched nothing, which
/// is distinct from a present `Value::Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryResult {
    AttributesTree(BTreeMap<EntityKey, Attributes>),
    Attributes(BTreeMap<EntityKey, Attribute>),
    AttributeList(Vec<Attribute>),
    KeyedAttribute(Option<(EntityKey, Attribute)>),
    Attribute(Option<Attribute>),
    Indices(Vec<EntityKey>),
    Index(Option<EntityKey>),
    Values(BTreeMap<EntityKey, Value>),
    ValueList(Vec<Value>),
    KeyedValue(Option<(EntityKey, Value)>),
    Value(Option<Value>),
    Grouped(Vec<(Group, QueryResult)>),
    Composite(Vec<QueryResult>),
}

impl QueryResult {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::AttributesTree(_) => "attributes tree",
            Self::Attributes(_) => "keyed attributes",
            Self::AttributeList(_) => "attribute list",
            Self::KeyedAttribute(_) => "keyed attribute",
            Self::Attribute(_) => "attribute",
            Self::Indices(_) => "indices",
            Self::Index(_) => "index",
            Self::Values(_) => "keyed values",
            Self::ValueList(_) => "value list",
            Self::KeyedValue(_) => "keyed value",
            Self::Value(_) => "value",
            Self::Grouped(_) => "grouped",
            Self::Composite(_) => "composite",
        }
    }
}

// =============================================================================
// CLASSIFY / RECONSTRUCT
// =============================================================================

/// Map a descriptor's result kind to the wire shape the store must return.
///
/// Grouped descriptors classify like their ungrouped kind.
#[must_use]
pub fn classify(descriptor: &QueryDescriptor) -> WireShape {
    let kind = descriptor.kind();
    let shape = match kind {
        ResultKind::AttributesTree => WireShape::KeyedAttributes,
        ResultKind::MultipleAttributesWithIndex
        | ResultKind::MultipleAttributesWithoutIndex
        | ResultKind::SingleAttributeWithIndex
        | ResultKind::MultipleValuesWithIndex
        | ResultKind::MultipleValuesWithoutIndex
        | ResultKind::SingleValueWithIndex => WireShape::KeyedValues,
        ResultKind::SingleAttributeWithoutIndex | ResultKind::SingleValueWithoutIndex => {
            WireShape::Scalar
        }
        ResultKind::Indices | ResultKind::Index => WireShape::IndexSequence,
    };
    trace!(?kind, ?shape, entity = %descriptor.entity, "classified query");
    shape
}

/// Rebuild the structured result for `kind` from a wire result.
pub fn reconstruct(kind: ResultKind, wire: WireResult) -> Result<QueryResult, TrellisError> {
    let result = match (kind, wire) {
        (ResultKind::AttributesTree, WireResult::KeyedAttributes(entries)) => {
            QueryResult::AttributesTree(entries.into_iter().collect())
        }
        (ResultKind::MultipleAttributesWithIndex, WireResult::KeyedValues(entries)) => {
            QueryResult::Attributes(
                entries
                    .into_iter()
                    .map(|(key, name)| Ok((key, Attribute::try_from(name)?)))
                    .collect::<Result<_, TrellisError>>()?,
            )
        }
        (ResultKind::MultipleAttributesWithoutIndex, WireResult::KeyedValues(entries)) => {
            QueryResult::AttributeList(
                entries
                    .into_iter()
                    .map(|(_, name)| Attribute::try_from(name))
                    .collect::<Result<_, _>>()?,
            )
        }
        (ResultKind::SingleAttributeWithIndex, WireResult::KeyedValues(entries)) => {
            QueryResult::KeyedAttribute(
                at_most_one(entries)?
                    .map(|(key, name)| Ok::<_, TrellisError>((key, Attribute::try_from(name)?)))
                    .transpose()?,
            )
        }
        (ResultKind::SingleAttributeWithoutIndex, WireResult::Scalar(name)) => {
            QueryResult::Attribute(name.map(Attribute::try_from).transpose()?)
        }
        (ResultKind::Indices, WireResult::IndexSequence(keys)) => QueryResult::Indices(keys),
        (ResultKind::Index, WireResult::IndexSequence(keys)) => {
            QueryResult::Index(at_most_one(keys)?)
        }
        (ResultKind::MultipleValuesWithIndex, WireResult::KeyedValues(entries)) => {
            QueryResult::Values(entries.into_iter().collect())
        }
        (ResultKind::MultipleValuesWithoutIndex, WireResult::KeyedValues(entries)) => {
            QueryResult::ValueList(entries.into_iter().map(|(_, value)| value).collect())
        }
        (ResultKind::SingleValueWithIndex, WireResult::KeyedValues(entries)) => {
            QueryResult::KeyedValue(at_most_one(entries)?)
        }
        (ResultKind::SingleValueWithoutIndex, WireResult::Scalar(value)) => {
            QueryResult::Value(value)
        }
        (kind, wire) => {
            return Err(TrellisError::QueryShape(format!(
                "{kind:?} cannot be built from a {:?} wire result",
                wire.shape()
            )));
        }
    };
    Ok(result)
}

fn at_most_one<T>(items: Vec<T>) -> Result<Option<T>, TrellisError> {
    if items.len() > 1 {
        return Err(TrellisError::QueryShape(format!(
            "expected at most one entry for a singular kind, got {}",
            items.len()
        )));
    }
    Ok(items.into_iter().next())
}

// =============================================================================
// RESOLVE
// =============================================================================

/// Run a query against a store and reconstruct its result.
pub fn resolve(store: &dyn GraphStore, query: &Query) -> Result<QueryResult, TrellisError> {
    match query {
        Query::Composite(parts) => parts
            .iter()
            .map(|part| resolve(store, part))
            .collect::<Result<Vec<_>, _>>()
            .map(QueryResult::Composite),
        Query::Single(descriptor) if descriptor.grouped => {
            let mut results = Vec::new();
            for group in store.groups() {
                let mut scoped = descriptor.clone();
                scoped.grouped = false;
                scoped.filters.push(Filter::InGroup(group.clone()));
                let result = resolve_descriptor(store, &scoped)?;
                results.push((group, result));
            }
            Ok(QueryResult::Grouped(results))
        }
        Query::Single(descriptor) => resolve_descriptor(store, descriptor),
    }
}

fn resolve_descriptor(
    store: &dyn GraphStore,
    descriptor: &QueryDescriptor,
) -> Result<QueryResult, TrellisError> {
    let expected = classify(descriptor);
    let wire = store.run_query(descriptor)?;
    if wire.shape() != expected {
        return Err(TrellisError::QueryShape(format!(
            "store returned {:?}, expected {:?}",
            wire.shape(),
            expected
        )));
    }
    reconstruct(descriptor.kind(), wire)
}

// =============================================================================
// TESTS
// =============================================================================
