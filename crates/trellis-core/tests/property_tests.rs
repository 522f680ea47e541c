//! # Property-Based Tests
//!
//! Selector dispatch invariants checked over generated graphs.

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use std::collections::BTreeMap;
use trellis_core::{
    Attribute, Attributes, Lookup, Node, NodeIndex, Selector, Session, TrellisError, Value,
};

fn attribute_set() -> impl Strategy<Value = Attributes> {
    btree_map(
        prop_oneof![
            "[a-e]".prop_map(Attribute::from),
            (0i64..5).prop_map(Attribute::from),
        ],
        prop_oneof![
            any::<i64>().prop_map(Value::Int),
            "[a-z]{0,6}".prop_map(Value::from),
            any::<bool>().prop_map(Value::Bool),
        ],
        0..5,
    )
}

fn session_with(entities: &BTreeMap<i64, Attributes>) -> Session {
    let mut session = Session::new();
    session
        .add_nodes(
            entities
                .iter()
                .map(|(index, attributes)| (NodeIndex::from(*index), attributes.clone()))
                .collect(),
            None,
        )
        .expect("seed");
    session
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Overwriting every attribute of every entity keeps the attribute names.
    #[test]
    fn full_overwrite_keeps_names(
        entities in btree_map(0i64..1000, attribute_set(), 0..20),
        value in any::<i64>(),
    ) {
        let mut session = session_with(&entities);
        session.node().set(.., .., value).expect("set");
        let after = session
            .node()
            .get(.., ..)
            .expect("get")
            .into_entities()
            .expect("entities");

        prop_assert_eq!(after.len(), entities.len());
        for (index, attributes) in &entities {
            let expected: Attributes = attributes
                .keys()
                .map(|name| (name.clone(), Value::Int(value)))
                .collect();
            prop_assert_eq!(&after[&NodeIndex::from(*index)], &expected);
        }
    }

    /// A key list with an absent key fails and leaves the store untouched.
    #[test]
    fn absent_key_leaves_store_untouched(
        entities in btree_map(0i64..100, attribute_set(), 1..10),
        absent in 100i64..200,
    ) {
        let mut session = session_with(&entities);
        let mut keys: Vec<NodeIndex> = entities.keys().map(|index| NodeIndex::from(*index)).collect();
        keys.insert(keys.len() / 2, NodeIndex::from(absent));

        let before = session.node().get(.., ..).expect("before");
        let result = session.node().set(Selector::<Node>::many(keys.clone()), "z", true);
        prop_assert!(matches!(result, Err(TrellisError::NodeNotFound(_))));
        let result = session.node().delete(Selector::<Node>::many(keys), ..);
        prop_assert!(matches!(result, Err(TrellisError::NodeNotFound(_))));
        prop_assert_eq!(session.node().get(.., ..).expect("after"), before);
    }

    /// Broadcasting one attribute adds it everywhere and keeps everything else.
    #[test]
    fn broadcast_adds_one_attribute(
        entities in btree_map(0i64..1000, attribute_set(), 0..20),
        text in "[a-z]{1,8}",
    ) {
        let mut session = session_with(&entities);
        session.node().set(.., "tag", text.as_str()).expect("set");
        let after = session
            .node()
            .get(.., ..)
            .expect("get")
            .into_entities()
            .expect("entities");
        for (index, attributes) in &entities {
            let mut expected = attributes.clone();
            expected.insert(Attribute::from("tag"), Value::from(text.as_str()));
            prop_assert_eq!(&after[&NodeIndex::from(*index)], &expected);
        }
    }

    /// A multiplicity predicate gets exactly what the equivalent query returns.
    #[test]
    fn predicate_matches_query(
        entities in btree_map(0i64..1000, attribute_set(), 0..20),
        threshold in any::<i64>(),
    ) {
        let mut session = session_with(&entities);
        let matched: Vec<NodeIndex> = session
            .query_nodes(|node| {
                node.attribute("a").greater_than(threshold);
                node.index()
            })
            .expect("query");
        let selector = Selector::<Node>::query(|node| {
            node.attribute("a").greater_than(threshold);
            node.index()
        });
        let lookup = session.node().get(selector, "a").expect("get");
        let Lookup::Values(values) = lookup else {
            return Err(TestCaseError::fail("multiplicity predicate must yield values"));
        };
        prop_assert_eq!(values.keys().cloned().collect::<Vec<_>>(), matched);
    }

    /// Selector strings with a bound around ':' never parse.
    #[test]
    fn bounded_range_strings_rejected(start in 0u32..100, end in 0u32..100) {
        for text in [format!("{start}:"), format!(":{end}"), format!("{start}:{end}")] {
            prop_assert!(matches!(
                text.parse::<Selector<Node>>(),
                Err(TrellisError::InvalidSelector(_))
            ));
        }
    }

    /// Key lists de-duplicate in first-seen order.
    #[test]
    fn many_deduplicates(keys in vec(0i64..10, 0..30)) {
        let Selector::Many(unique) = Selector::<Node>::many(keys.clone()) else {
            return Err(TestCaseError::fail("many builds a Many selector"));
        };
        let mut expected: Vec<NodeIndex> = Vec::new();
        for key in keys {
            let key = NodeIndex::from(key);
            if !expected.contains(&key) {
                expected.push(key);
            }
        }
        prop_assert_eq!(unique, expected);
    }
}
