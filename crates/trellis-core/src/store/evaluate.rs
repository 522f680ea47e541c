//! Query evaluation for the in-memory [`Graph`].
//!
//! Filters select candidates in index order; the projection turns the
//! matches into the wire shape its result kind classifies to.

use super::Graph;
use crate::query::{Comparison, Filter, Projection, QueryDescriptor, Reduction, WireResult};
use crate::types::{Attribute, Attributes, EntityKey, NodeIndex, TrellisError, Value};
use std::cmp::Ordering;

/// One entity seen by the evaluator.
pub(super) struct Candidate<'a> {
    pub(super) key: EntityKey,
    pub(super) attributes: &'a Attributes,
    /// Source and target for edges.
    pub(super) endpoints: Option<(&'a NodeIndex, &'a NodeIndex)>,
}

pub(super) fn run(graph: &Graph, descriptor: &QueryDescriptor) -> Result<WireResult, TrellisError> {
    if descriptor.grouped {
        return Err(TrellisError::Query(
            "grouped descriptors are resolved per group before reaching the store".to_string(),
        ));
    }
    let matched: Vec<Candidate<'_>> = graph
        .candidates(descriptor.entity)
        .into_iter()
        .filter(|candidate| {
            descriptor
                .filters
                .iter()
                .all(|filter| matches(graph, candidate, filter))
        })
        .collect();
    project(&descriptor.projection, matched)
}

fn matches(graph: &Graph, candidate: &Candidate<'_>, filter: &Filter) -> bool {
    match filter {
        Filter::InGroup(group) => graph.is_member(group, &candidate.key),
        Filter::HasAttribute(attribute) => candidate.attributes.contains_key(attribute),
        Filter::Compare {
            attribute,
            comparison,
            value,
        } => candidate
            .attributes
            .get(attribute)
            .is_some_and(|actual| compare(actual, *comparison, value)),
        Filter::OneOf { attribute, values } => candidate
            .attributes
            .get(attribute)
            .is_some_and(|actual| values.iter().any(|value| value == actual)),
        Filter::IndexIn(keys) => keys.contains(&candidate.key),
        Filter::SourceIn(nodes) => candidate
            .endpoints
            .is_some_and(|(source, _)| nodes.contains(source)),
        Filter::TargetIn(nodes) => candidate
            .endpoints
            .is_some_and(|(_, target)| nodes.contains(target)),
    }
}

fn compare(actual: &Value, comparison: Comparison, expected: &Value) -> bool {
    let ordering = actual.partial_cmp(expected);
    match comparison {
        Comparison::Equal => ordering == Some(Ordering::Equal),
        Comparison::NotEqual => ordering != Some(Ordering::Equal),
        Comparison::Greater => ordering == Some(Ordering::Greater),
        Comparison::GreaterOrEqual => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        Comparison::Less => ordering == Some(Ordering::Less),
        Comparison::LessOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
    }
}

fn project(projection: &Projection, matched: Vec<Candidate<'_>>) -> Result<WireResult, TrellisError> {
    Ok(match projection {
        Projection::AttributesTree => WireResult::KeyedAttributes(
            matched
                .into_iter()
                .map(|candidate| (candidate.key, candidate.attributes.clone()))
                .collect(),
        ),
        Projection::MultipleAttributes { reduction, .. } => {
            WireResult::KeyedValues(
                attribute_names(matched, *reduction)?
                    .into_iter()
                    .map(|(key, name)| (key, Value::from(name)))
                    .collect(),
            )
        }
        Projection::SingleAttribute {
            per_entity,
            across,
            with_index,
        } => {
            let chosen = pick(attribute_names(matched, *per_entity)?, *across, |a, b| {
                Ok(a.1.cmp(&b.1))
            })?
            .map(|(key, name)| (key, Value::from(name)));
            singular(chosen, *with_index)
        }
        Projection::Indices => {
            WireResult::IndexSequence(matched.into_iter().map(|candidate| candidate.key).collect())
        }
        Projection::Index { reduction } => {
            let keys = matched.into_iter().map(|candidate| candidate.key).collect();
            WireResult::IndexSequence(
                pick(keys, *reduction, |a, b| Ok(a.cmp(b)))?
                    .into_iter()
                    .collect(),
            )
        }
        Projection::MultipleValues { attribute, .. } => {
            WireResult::KeyedValues(values_of(matched, attribute))
        }
        Projection::SingleValue {
            attribute,
            reduction,
            with_index,
        } => {
            let chosen = pick(values_of(matched, attribute), *reduction, |a, b| {
                order(&a.1, &b.1)
            })?;
            singular(chosen, *with_index)
        }
        Projection::ValueCount { attribute } => {
            let count = values_of(matched, attribute).len();
            WireResult::Scalar(Some(Value::Int(count as i64)))
        }
    })
}

fn singular(chosen: Option<(EntityKey, Value)>, with_index: bool) -> WireResult {
    if with_index {
        WireResult::KeyedValues(chosen.into_iter().collect())
    } else {
        WireResult::Scalar(chosen.map(|(_, value)| value))
    }
}

/// One attribute name per entity; entities without attributes drop out.
fn attribute_names(
    matched: Vec<Candidate<'_>>,
    reduction: Reduction,
) -> Result<Vec<(EntityKey, Attribute)>, TrellisError> {
    let mut chosen = Vec::with_capacity(matched.len());
    for candidate in matched {
        let names: Vec<&Attribute> = candidate.attributes.keys().collect();
        if let Some(name) = pick(names, reduction, |a, b| Ok(a.cmp(b)))? {
            chosen.push((candidate.key, name.clone()));
        }
    }
    Ok(chosen)
}

/// The value of `attribute` on every candidate that carries it.
fn values_of(matched: Vec<Candidate<'_>>, attribute: &Attribute) -> Vec<(EntityKey, Value)> {
    matched
        .into_iter()
        .filter_map(|candidate| {
            let value = candidate.attributes.get(attribute)?.clone();
            Some((candidate.key, value))
        })
        .collect()
}

/// Order two values for `max`/`min`. Values without an ordering are a query error.
fn order(a: &Value, b: &Value) -> Result<Ordering, TrellisError> {
    a.partial_cmp(b).ok_or_else(|| {
        TrellisError::Query(format!(
            "cannot compare values of types {} and {}",
            a.type_name(),
            b.type_name()
        ))
    })
}

/// Reduce to one item. Ties keep the earlier item.
fn pick<T>(
    items: Vec<T>,
    reduction: Reduction,
    compare: impl Fn(&T, &T) -> Result<Ordering, TrellisError>,
) -> Result<Option<T>, TrellisError> {
    let wanted = match reduction {
        Reduction::First => return Ok(items.into_iter().next()),
        Reduction::Last => return Ok(items.into_iter().last()),
        Reduction::Max => Ordering::Greater,
        Reduction::Min => Ordering::Less,
    };
    let mut best: Option<T> = None;
    for item in items {
        best = match best {
            Some(current) if compare(&item, &current)? != wanted => Some(current),
            _ => Some(item),
        };
    }
    Ok(best)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::store::GraphStore;
    use crate::types::{EdgeIndex, EntityKind, Group};

    fn n(i: i64) -> NodeIndex {
        NodeIndex::from(i)
    }

    fn people() -> Graph {
        let mut graph = Graph::new();
        let person = |age: i64, name: &str| -> Attributes {
            [
                (Attribute::from("age"), Value::Int(age)),
                (Attribute::from("name"), Value::from(name)),
            ]
            .into_iter()
            .collect()
        };
        graph
            .add_nodes(
                vec![
                    (n(0), person(30, "ada")),
                    (n(1), person(45, "bob")),
                    (n(2), person(20, "cy")),
                    (n(3), Attributes::new()),
                ],
                None,
            )
            .expect("add nodes");
        graph
            .add_edges(
                vec![(n(0), n(1), Attributes::new()), (n(1), n(2), Attributes::new())],
                None,
            )
            .expect("add edges");
        graph
            .add_group(Group::from("adults"), Some(&[n(0), n(1)]), None)
            .expect("group");
        graph
    }

    fn node_query(projection: Projection, filters: Vec<Filter>) -> QueryDescriptor {
        let mut descriptor = QueryDescriptor::new(EntityKind::Node, projection);
        descriptor.filters = filters;
        descriptor
    }

    #[test]
    fn filters_combine_conjunctively() {
        let graph = people();
        let descriptor = node_query(
            Projection::Indices,
            vec![
                Filter::InGroup(Group::from("adults")),
                Filter::Compare {
                    attribute: Attribute::from("age"),
                    comparison: Comparison::Greater,
                    value: Value::Int(35),
                },
            ],
        );
        assert_eq!(
            graph.run_query(&descriptor).expect("query"),
            WireResult::IndexSequence(vec![EntityKey::Node(n(1))])
        );
    }

    #[test]
    fn comparisons_skip_incomparable_values() {
        let graph = people();
        let descriptor = node_query(
            Projection::Indices,
            vec![Filter::Compare {
                attribute: Attribute::from("name"),
                comparison: Comparison::Less,
                value: Value::Int(100),
            }],
        );
        assert_eq!(
            graph.run_query(&descriptor).expect("query"),
            WireResult::IndexSequence(Vec::new())
        );
    }

    #[test]
    fn single_value_max_with_and_without_index() {
        let graph = people();
        let with_index = node_query(
            Projection::SingleValue {
                attribute: Attribute::from("age"),
                reduction: Reduction::Max,
                with_index: true,
            },
            Vec::new(),
        );
        assert_eq!(
            graph.run_query(&with_index).expect("query"),
            WireResult::KeyedValues(vec![(EntityKey::Node(n(1)), Value::Int(45))])
        );

        let without_index = node_query(
            Projection::SingleValue {
                attribute: Attribute::from("age"),
                reduction: Reduction::Min,
                with_index: false,
            },
            Vec::new(),
        );
        assert_eq!(
            graph.run_query(&without_index).expect("query"),
            WireResult::Scalar(Some(Value::Int(20)))
        );
    }

    #[test]
    fn empty_match_yields_empty_singular() {
        let graph = people();
        let descriptor = node_query(
            Projection::SingleValue {
                attribute: Attribute::from("missing"),
                reduction: Reduction::Max,
                with_index: false,
            },
            Vec::new(),
        );
        assert_eq!(
            graph.run_query(&descriptor).expect("query"),
            WireResult::Scalar(None)
        );
    }

    #[test]
    fn attribute_names_skip_bare_entities() {
        let graph = people();
        let descriptor = node_query(
            Projection::MultipleAttributes {
                reduction: Reduction::Min,
                with_index: true,
            },
            Vec::new(),
        );
        let WireResult::KeyedValues(entries) = graph.run_query(&descriptor).expect("query") else {
            unreachable!("multiple attributes classify to keyed values");
        };
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|(_, name)| *name == Value::from("age")));
    }

    #[test]
    fn value_count_counts_carriers() {
        let graph = people();
        let descriptor = node_query(
            Projection::ValueCount {
                attribute: Attribute::from("age"),
            },
            Vec::new(),
        );
        assert_eq!(
            graph.run_query(&descriptor).expect("query"),
            WireResult::Scalar(Some(Value::Int(3)))
        );
    }

    #[test]
    fn edge_endpoint_filters() {
        let graph = people();
        let mut descriptor = QueryDescriptor::new(EntityKind::Edge, Projection::Indices);
        descriptor.filters = vec![Filter::SourceIn(vec![n(1)])];
        assert_eq!(
            graph.run_query(&descriptor).expect("query"),
            WireResult::IndexSequence(vec![EntityKey::Edge(EdgeIndex(1))])
        );

        let nodes = node_query(Projection::Indices, vec![Filter::TargetIn(vec![n(1)])]);
        assert_eq!(
            graph.run_query(&nodes).expect("query"),
            WireResult::IndexSequence(Vec::new())
        );
    }

    #[test]
    fn grouped_descriptor_rejected() {
        let graph = people();
        let mut descriptor = node_query(Projection::Indices, Vec::new());
        descriptor.grouped = true;
        assert!(matches!(
            graph.run_query(&descriptor),
            Err(TrellisError::Query(_))
        ));
        // The resolver expands the same descriptor per group.
        assert!(crate::query::resolve(&graph, &Query::Single(descriptor)).is_ok());
    }

    #[test]
    fn pick_keeps_earliest_tie() {
        let items = vec![(1, 5), (2, 9), (3, 9)];
        let best = pick(items, Reduction::Max, |a, b| Ok(a.1.cmp(&b.1))).expect("pick");
        assert_eq!(best, Some((2, 9)));
    }

    #[test]
    fn pick_rejects_mixed_types() {
        for reduction in [Reduction::Max, Reduction::Min] {
            let items = vec![Value::from("x"), Value::Int(5), Value::Int(9)];
            assert!(matches!(
                pick(items, reduction, |a, b| order(a, b)),
                Err(TrellisError::Query(_))
            ));
        }

        let items = vec![Value::from("x"), Value::Int(5)];
        assert_eq!(
            pick(items, Reduction::First, |a, b| order(a, b)).expect("first"),
            Some(Value::from("x"))
        );
    }

    #[test]
    fn single_value_over_mixed_types_is_a_query_error() {
        let mut graph = Graph::new();
        graph
            .add_nodes(
                vec![
                    (n(0), [(Attribute::from("v"), Value::from("x"))].into_iter().collect()),
                    (n(1), [(Attribute::from("v"), Value::Int(5))].into_iter().collect()),
                    (n(2), [(Attribute::from("v"), Value::Int(9))].into_iter().collect()),
                ],
                None,
            )
            .expect("nodes");
        for reduction in [Reduction::Max, Reduction::Min] {
            let descriptor = QueryDescriptor::new(
                EntityKind::Node,
                Projection::SingleValue {
                    attribute: Attribute::from("v"),
                    reduction,
                    with_index: false,
                },
            );
            assert!(matches!(
                graph.run_query(&descriptor),
                Err(TrellisError::Query(_))
            ));
        }
    }

    #[test]
    fn attribute_names_of_mixed_kinds_still_reduce() {
        let mut graph = Graph::new();
        graph
            .add_nodes(
                vec![
                    (n(0), [(Attribute::from("name"), Value::Null)].into_iter().collect()),
                    (n(1), [(Attribute::Int(3), Value::Null)].into_iter().collect()),
                ],
                None,
            )
            .expect("nodes");
        let descriptor = QueryDescriptor::new(
            EntityKind::Node,
            Projection::SingleAttribute {
                per_entity: Reduction::First,
                across: Reduction::Min,
                with_index: true,
            },
        );
        assert_eq!(
            graph.run_query(&descriptor).expect("query"),
            WireResult::KeyedValues(vec![(EntityKey::Node(n(1)), Value::Int(3))])
        );
    }
}
