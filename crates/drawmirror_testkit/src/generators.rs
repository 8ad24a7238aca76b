//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random drawings, nodes and archives
//! that maintain the invariants the archive codec relies on.

use drawmirror_core::{Archive, Drawing, DrawingId, Node, Value};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating drawing IDs.
pub fn drawing_id_strategy() -> impl Strategy<Value = DrawingId> {
    prop::array::uniform16(any::<u8>()).prop_map(DrawingId::from_bytes)
}

/// Strategy for generating finite attribute values, nested a few levels.
pub fn attribute_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9f64..1.0e9f64).prop_map(Value::Float),
        "[a-zA-Z0-9 #./-]{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z]{1,8}", inner, 0..4).prop_map(Value::text_map),
        ]
    })
}

/// Strategy for generating drawing attribute bags.
///
/// Always a map with a `name`; other keys are arbitrary.
pub fn drawing_data_strategy() -> impl Strategy<Value = Value> {
    (
        "[A-Za-z][A-Za-z0-9 ]{0,15}",
        prop::collection::btree_map("[a-z]{1,8}", attribute_value_strategy(), 0..5),
    )
        .prop_map(|(name, extra)| {
            let mut pairs: BTreeMap<String, Value> = extra;
            pairs.insert("name".to_string(), Value::Text(name));
            Value::text_map(pairs)
        })
}

/// Strategy for generating up to `max` drawings with distinct IDs.
pub fn drawings_strategy(max: usize) -> impl Strategy<Value = Vec<Drawing>> {
    prop::collection::btree_map(drawing_id_strategy(), drawing_data_strategy(), 0..=max).prop_map(
        |entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (id, data))| Drawing {
                    id,
                    data,
                    modified_at: 1_700_000_000_000 + i as u64,
                })
                .collect()
        },
    )
}

/// Strategy for generating node entries with distinct names and endpoints.
pub fn nodes_strategy(max: usize) -> impl Strategy<Value = Vec<Node>> {
    prop::collection::btree_set("[a-z][a-z0-9-]{0,11}", 0..=max).prop_map(|names| {
        names
            .into_iter()
            .map(|name| {
                let endpoint = format!("http://{name}.local:8080");
                Node::new(&name, &endpoint, 1_700_000_000_000)
            })
            .collect()
    })
}

/// Strategy for generating well-formed archives.
pub fn archive_strategy(max_drawings: usize, max_nodes: usize) -> impl Strategy<Value = Archive> {
    (drawings_strategy(max_drawings), nodes_strategy(max_nodes))
        .prop_map(|(drawings, nodes)| Archive { drawings, nodes })
}
