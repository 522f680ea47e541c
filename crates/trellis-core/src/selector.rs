//! # Selectors
//!
//! The two axes of an indexer call.
//!
//! | shape | entity axis | attribute axis |
//! |---|---|---|
//! | `Single` | one index | one attribute name |
//! | `Many` | ordered, de-duplicated index list | ordered, de-duplicated name list |
//! | `Predicate` | query returning indices | query returning attribute names |
//! | `All` | every entity at call time | every attribute present at call time |
//!
//! Ranges are accepted only as the true wildcard (`..` or `":"`). A range with
//! any explicit bound is `InvalidSelector`, never a partial range.
//!
//! ## Text Form
//!
//! `FromStr` accepts `:` (wildcard), `[a, b]` (list), or a bare key.

use crate::entity::{Edge, Entity, Node};
use crate::query::{
    AttributeReturn, EntityOperand, IndexReturn, Query, QueryDescriptor, QueryResult, resolve,
};
use crate::store::GraphStore;
use crate::types::{Attribute, EdgeIndex, NodeIndex, TrellisError};
use std::collections::BTreeSet;
use std::ops::{Bound, RangeBounds, RangeFull};
use std::str::FromStr;

// =============================================================================
// ENTITY SELECTOR
// =============================================================================

/// Which entities an indexer call targets.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector<E: Entity> {
    Single(E::Index),
    Many(Vec<E::Index>),
    /// An ungrouped index query on the same axis.
    Predicate(QueryDescriptor),
    All,
}

/// Entities a selector resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Targets<I> {
    One(I),
    Many(Vec<I>),
    /// A singular predicate matched nothing.
    Nothing,
}

impl<I> Targets<I> {
    pub(crate) fn into_vec(self) -> Vec<I> {
        match self {
            Self::One(index) => vec![index],
            Self::Many(indices) => indices,
            Self::Nothing => Vec::new(),
        }
    }
}

impl<E: Entity> Selector<E> {
    /// A key list, de-duplicated in first-seen order.
    pub fn many<I: Into<E::Index>>(indices: impl IntoIterator<Item = I>) -> Self {
        Self::Many(dedupe(indices.into_iter().map(Into::into)))
    }

    /// A predicate built with the operand builder.
    pub fn query<R: IndexReturn<E>>(query: impl FnOnce(&mut EntityOperand<E>) -> R) -> Self {
        let mut operand = EntityOperand::new();
        Self::Predicate(query(&mut operand).into_descriptor())
    }

    /// Accept a Rust range only when it is fully unbounded.
    pub fn range(bounds: impl RangeBounds<E::Index>) -> Result<Self, TrellisError> {
        if is_unbounded(&bounds) {
            Ok(Self::All)
        } else {
            Err(TrellisError::InvalidSelector(
                "invalid range, only ':' is allowed".to_string(),
            ))
        }
    }

    /// Resolve to concrete indices against the current store.
    ///
    /// `Many` fails on the first absent key before anything is read or written.
    pub(crate) fn resolve(&self, store: &dyn GraphStore) -> Result<Targets<E::Index>, TrellisError> {
        match self {
            Self::Single(index) => Ok(Targets::One(index.clone())),
            Self::Many(indices) => {
                if let Some(missing) = indices.iter().find(|index| !E::contains(store, index)) {
                    return Err(E::not_found(missing));
                }
                Ok(Targets::Many(dedupe(indices.iter().cloned())))
            }
            Self::Predicate(descriptor) => resolve_index_predicate::<E>(store, descriptor),
            Self::All => Ok(Targets::Many(E::indices(store))),
        }
    }
}

fn resolve_index_predicate<E: Entity>(
    store: &dyn GraphStore,
    descriptor: &QueryDescriptor,
) -> Result<Targets<E::Index>, TrellisError> {
    if descriptor.entity != E::KIND || descriptor.grouped || !descriptor.kind().yields_indices() {
        return Err(TrellisError::InvalidSelector(format!(
            "a {} selector needs an ungrouped {} index query, got {}{:?}",
            E::KIND,
            E::KIND,
            if descriptor.grouped { "grouped " } else { "" },
            descriptor.kind()
        )));
    }
    match resolve(store, &Query::Single(descriptor.clone()))? {
        QueryResult::Indices(keys) => Ok(Targets::Many(
            keys.into_iter()
                .map(E::from_key)
                .collect::<Result<_, _>>()?,
        )),
        QueryResult::Index(Some(key)) => Ok(Targets::One(E::from_key(key)?)),
        QueryResult::Index(None) => Ok(Targets::Nothing),
        other => Err(TrellisError::QueryShape(format!(
            "index predicate produced a {} result",
            other.variant_name()
        ))),
    }
}

impl<E: Entity> From<RangeFull> for Selector<E> {
    fn from(_: RangeFull) -> Self {
        Self::All
    }
}

impl From<NodeIndex> for Selector<Node> {
    fn from(index: NodeIndex) -> Self {
        Self::Single(index)
    }
}

impl From<i64> for Selector<Node> {
    fn from(index: i64) -> Self {
        Self::Single(NodeIndex::from(index))
    }
}

impl From<i32> for Selector<Node> {
    fn from(index: i32) -> Self {
        Self::Single(NodeIndex::from(index))
    }
}

impl From<&str> for Selector<Node> {
    fn from(index: &str) -> Self {
        Self::Single(NodeIndex::from(index))
    }
}

impl From<Vec<NodeIndex>> for Selector<Node> {
    fn from(indices: Vec<NodeIndex>) -> Self {
        Self::many(indices)
    }
}

impl From<EdgeIndex> for Selector<Edge> {
    fn from(index: EdgeIndex) -> Self {
        Self::Single(index)
    }
}

impl From<u32> for Selector<Edge> {
    fn from(index: u32) -> Self {
        Self::Single(EdgeIndex(index))
    }
}

impl From<Vec<EdgeIndex>> for Selector<Edge> {
    fn from(indices: Vec<EdgeIndex>) -> Self {
        Self::many(indices)
    }
}

impl<E: Entity> FromStr for Selector<E> {
    type Err = TrellisError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(match parse(text)? {
            Parsed::All => Self::All,
            Parsed::Many(items) => Self::Many(dedupe(
                items
                    .into_iter()
                    .map(E::parse_index)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Parsed::Single(item) => Self::Single(E::parse_index(item)?),
        })
    }
}

// =============================================================================
// ATTRIBUTE SELECTOR
// =============================================================================

/// Which attributes an indexer call targets.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSelector {
    Single(Attribute),
    Many(Vec<Attribute>),
    /// An ungrouped query returning attribute names, on either axis.
    Predicate(QueryDescriptor),
    All,
}

/// Attributes a selector resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttributeTargets {
    One(Attribute),
    Many(Vec<Attribute>),
    All,
    /// A singular predicate matched nothing.
    Nothing,
}

impl AttributeSelector {
    /// A name list, de-duplicated in first-seen order.
    pub fn many<A: Into<Attribute>>(attributes: impl IntoIterator<Item = A>) -> Self {
        Self::Many(dedupe(attributes.into_iter().map(Into::into)))
    }

    /// A predicate over node attribute names.
    pub fn query_nodes<R: AttributeReturn>(query: impl FnOnce(&mut EntityOperand<Node>) -> R) -> Self {
        let mut operand = EntityOperand::new();
        Self::Predicate(query(&mut operand).into_descriptor())
    }

    /// A predicate over edge attribute names.
    pub fn query_edges<R: AttributeReturn>(query: impl FnOnce(&mut EntityOperand<Edge>) -> R) -> Self {
        let mut operand = EntityOperand::new();
        Self::Predicate(query(&mut operand).into_descriptor())
    }

    /// Accept a Rust range only when it is fully unbounded.
    pub fn range(bounds: impl RangeBounds<Attribute>) -> Result<Self, TrellisError> {
        if is_unbounded(&bounds) {
            Ok(Self::All)
        } else {
            Err(TrellisError::InvalidSelector(
                "invalid range, only ':' is allowed".to_string(),
            ))
        }
    }

    pub(crate) fn resolve(&self, store: &dyn GraphStore) -> Result<AttributeTargets, TrellisError> {
        match self {
            Self::Single(attribute) => Ok(AttributeTargets::One(attribute.clone())),
            Self::Many(attributes) => Ok(AttributeTargets::Many(dedupe(attributes.iter().cloned()))),
            Self::Predicate(descriptor) => resolve_attribute_predicate(store, descriptor),
            Self::All => Ok(AttributeTargets::All),
        }
    }
}

fn resolve_attribute_predicate(
    store: &dyn GraphStore,
    descriptor: &QueryDescriptor,
) -> Result<AttributeTargets, TrellisError> {
    if descriptor.grouped || !descriptor.kind().yields_attribute_names() {
        return Err(TrellisError::InvalidSelector(format!(
            "an attribute selector needs an ungrouped attribute-name query, got {}{:?}",
            if descriptor.grouped { "grouped " } else { "" },
            descriptor.kind()
        )));
    }
    Ok(match resolve(store, &Query::Single(descriptor.clone()))? {
        QueryResult::Attributes(names) => AttributeTargets::Many(dedupe(names.into_values())),
        QueryResult::AttributeList(names) => AttributeTargets::Many(dedupe(names)),
        QueryResult::KeyedAttribute(Some((_, name))) | QueryResult::Attribute(Some(name)) => {
            AttributeTargets::One(name)
        }
        QueryResult::KeyedAttribute(None) | QueryResult::Attribute(None) => {
            AttributeTargets::Nothing
        }
        other => {
            return Err(TrellisError::QueryShape(format!(
                "attribute predicate produced a {} result",
                other.variant_name()
            )));
        }
    })
}

impl From<Attribute> for AttributeSelector {
    fn from(attribute: Attribute) -> Self {
        Self::Single(attribute)
    }
}

impl From<&str> for AttributeSelector {
    fn from(attribute: &str) -> Self {
        Self::Single(Attribute::from(attribute))
    }
}

impl From<String> for AttributeSelector {
    fn from(attribute: String) -> Self {
        Self::Single(Attribute::from(attribute))
    }
}

impl From<i64> for AttributeSelector {
    fn from(attribute: i64) -> Self {
        Self::Single(Attribute::from(attribute))
    }
}

impl From<i32> for AttributeSelector {
    fn from(attribute: i32) -> Self {
        Self::Single(Attribute::from(attribute))
    }
}

impl From<Vec<Attribute>> for AttributeSelector {
    fn from(attributes: Vec<Attribute>) -> Self {
        Self::many(attributes)
    }
}

impl<const N: usize> From<[&str; N]> for AttributeSelector {
    fn from(attributes: [&str; N]) -> Self {
        Self::many(attributes)
    }
}

impl From<RangeFull> for AttributeSelector {
    fn from(_: RangeFull) -> Self {
        Self::All
    }
}

impl FromStr for AttributeSelector {
    type Err = TrellisError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(match parse(text)? {
            Parsed::All => Self::All,
            Parsed::Many(items) => Self::many(items.into_iter().map(Attribute::parse)),
            Parsed::Single(item) => Self::Single(Attribute::parse(item)),
        })
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Drop repeats, keeping first-seen order.
fn dedupe<T: Ord + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = BTreeSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn is_unbounded<T: ?Sized, R: RangeBounds<T> + ?Sized>(bounds: &R) -> bool {
    matches!(
        (bounds.start_bound(), bounds.end_bound()),
        (Bound::Unbounded, Bound::Unbounded)
    )
}

/// Syntactic form of a selector string.
enum Parsed<'a> {
    All,
    Many(Vec<&'a str>),
    Single(&'a str),
}

fn is_range(text: &str) -> bool {
    text.contains(':') || text.contains("..")
}

fn parse(text: &str) -> Result<Parsed<'_>, TrellisError> {
    let text = text.trim();
    if text == ":" || text == ".." {
        return Ok(Parsed::All);
    }
    if let Some(inner) = text.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        let items: Vec<&str> = inner
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect();
        if let Some(item) = items.iter().find(|item| is_range(item)) {
            return Err(TrellisError::InvalidSelector(format!(
                "{item:?} is not a key, ranges are not allowed inside a list"
            )));
        }
        return Ok(Parsed::Many(items));
    }
    if text.is_empty() {
        return Err(TrellisError::InvalidSelector("empty selector".to_string()));
    }
    if is_range(text) {
        return Err(TrellisError::InvalidSelector(format!(
            "invalid range {text:?}, only ':' is allowed"
        )));
    }
    Ok(Parsed::Single(text))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Graph;
    use crate::types::Attributes;

    fn n(i: i64) -> NodeIndex {
        NodeIndex::from(i)
    }

    fn graph() -> Graph {
        let mut graph = Graph::new();
        let with_age = |age: i64| -> Attributes {
            [(Attribute::from("age"), crate::types::Value::Int(age))]
                .into_iter()
                .collect()
        };
        graph
            .add_nodes(vec![(n(0), with_age(10)), (n(1), with_age(20))], None)
            .expect("add");
        graph
    }

    #[test]
    fn parse_selector_strings() {
        assert_eq!("0".parse::<Selector<Node>>().expect("parse"), Selector::Single(n(0)));
        assert_eq!(":".parse::<Selector<Node>>().expect("parse"), Selector::All);
        assert_eq!(
            "[1, 0, 1]".parse::<Selector<Node>>().expect("parse"),
            Selector::Many(vec![n(1), n(0)])
        );
        assert_eq!(
            "[a,b]".parse::<AttributeSelector>().expect("parse"),
            AttributeSelector::Many(vec![Attribute::from("a"), Attribute::from("b")])
        );
        assert_eq!(
            "3".parse::<Selector<Edge>>().expect("parse"),
            Selector::Single(EdgeIndex(3))
        );
    }

    #[test]
    fn dedupe_keeps_first_seen_order() {
        let items = (0..5_000).rev().chain(0..5_000).map(|i| i % 2_500);
        let unique = dedupe(items);
        assert_eq!(unique.len(), 2_500);
        assert_eq!(unique.first(), Some(&(4_999 % 2_500)));
        assert_eq!(unique, (0..2_500).rev().collect::<Vec<i64>>());
    }

    #[test]
    fn bounded_ranges_are_invalid() {
        for text in ["1:", ":5", "1:5", "0..2", "[1:2]", ""] {
            assert!(
                matches!(text.parse::<Selector<Node>>(), Err(TrellisError::InvalidSelector(_))),
                "{text:?}"
            );
            assert!(
                matches!(text.parse::<AttributeSelector>(), Err(TrellisError::InvalidSelector(_))),
                "{text:?}"
            );
        }
    }

    #[test]
    fn rust_ranges() {
        assert_eq!(Selector::<Node>::range(..).expect("full"), Selector::All);
        assert!(matches!(
            Selector::<Node>::range(n(1)..),
            Err(TrellisError::InvalidSelector(_))
        ));
        assert!(matches!(
            AttributeSelector::range(..Attribute::from("z")),
            Err(TrellisError::InvalidSelector(_))
        ));
        assert_eq!(AttributeSelector::range(..).expect("full"), AttributeSelector::All);
    }

    #[test]
    fn many_fails_on_first_absent_key() {
        let store = graph();
        let result = Selector::<Node>::many([0, 50, 1]).resolve(&store);
        assert!(matches!(result, Err(TrellisError::NodeNotFound(NodeIndex::Int(50)))));
    }

    #[test]
    fn all_snapshots_existing_entities() {
        let store = graph();
        let targets = Selector::<Node>::All.resolve(&store).expect("resolve");
        assert_eq!(targets, Targets::Many(vec![n(0), n(1)]));
    }

    #[test]
    fn predicate_resolution() {
        let store = graph();
        let many = Selector::<Node>::query(|node| {
            node.attribute("age").greater_than(15);
            node.index()
        });
        assert_eq!(many.resolve(&store).expect("resolve"), Targets::Many(vec![n(1)]));

        let empty_single = Selector::<Node>::query(|node| {
            node.attribute("age").greater_than(99);
            node.index().max()
        });
        assert_eq!(empty_single.resolve(&store).expect("resolve"), Targets::Nothing);
    }

    #[test]
    fn predicate_of_wrong_kind_is_invalid() {
        let store = graph();
        let values = Selector::<Node>::Predicate(
            crate::query::QueryDescriptor::new(
                crate::types::EntityKind::Node,
                crate::query::Projection::AttributesTree,
            ),
        );
        assert!(matches!(values.resolve(&store), Err(TrellisError::InvalidSelector(_))));

        let other_axis = Selector::<Edge>::Predicate(crate::query::QueryDescriptor::new(
            crate::types::EntityKind::Node,
            crate::query::Projection::Indices,
        ));
        assert!(matches!(
            other_axis.resolve(&store),
            Err(TrellisError::InvalidSelector(_))
        ));
    }

    #[test]
    fn attribute_predicate_resolution() {
        let store = graph();
        let names = AttributeSelector::query_nodes(|node| node.attributes().first());
        assert_eq!(
            names.resolve(&store).expect("resolve"),
            AttributeTargets::Many(vec![Attribute::from("age")])
        );

        let none = AttributeSelector::query_nodes(|node| {
            node.in_group("missing");
            node.attributes().first().max()
        });
        assert_eq!(none.resolve(&store).expect("resolve"), AttributeTargets::Nothing);
    }
}
