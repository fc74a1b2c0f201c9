//! Key Determinism Tests
//!
//! Storage keys depend on argument values only, never on declaration order,
//! and field policies fan list arguments out to one entity per element.

use crate::common::*;
use graphcache::cache_key::{default_storage_key, key_args_keys};
use graphcache::{CacheError, DataObject, ReadError};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn arguments(pairs: &[(String, i64)]) -> Value {
    Value::Object(pairs.iter().map(|(k, v)| (k.clone(), json!(v))).collect::<Map<_, _>>())
}

fn starships_query(ids: Value) -> Operation {
    Operation::query(
        "Starships",
        SelectionSet::new("Query").field(
            Field::new(
                "starships",
                OutputType::object(
                    SelectionSet::new("Starship")
                        .field(Field::new("id", OutputType::scalar("ID").non_null()))
                        .field(Field::new("name", OutputType::scalar("String").non_null())),
                )
                .non_null()
                .list(),
            )
            .argument("ids", InputValue::variable("ids"))
            .key_args(["ids"]),
        ),
    )
    .variable("ids", ids)
}

fn starships_data(ids: &[String]) -> DataObject {
    let ships: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "name": format!("ship {id}")}))
        .collect();
    DataObject::from(json!({ "starships": ships }))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn test_argument_order_never_changes_storage_key(
        pairs in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..6),
    ) {
        let forward: Vec<(String, i64)> = pairs.into_iter().collect();
        let mut backward = forward.clone();
        backward.reverse();

        prop_assert_eq!(
            default_storage_key("field", &arguments(&forward)),
            default_storage_key("field", &arguments(&backward))
        );
    }

    #[test]
    fn test_changing_key_argument_changes_key(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(a != b);
        let paths = vec!["id".to_string()];
        let first = key_args_keys("ship", &paths, &json!({"id": a}));
        let second = key_args_keys("ship", &paths, &json!({"id": b}));
        prop_assert_ne!(first, second);
    }

    #[test]
    fn test_list_key_argument_fans_out_in_order(
        ids in proptest::collection::btree_set("[A-Z][a-z0-9]{0,6}", 1..8),
    ) {
        let store = CacheStore::in_memory();
        let ids: Vec<String> = ids.into_iter().collect();
        let query = starships_query(json!(ids));
        store.write(&starships_data(&ids), &query).unwrap();

        let keys: Vec<RecordKey> = ids.iter().map(|id| RecordKey::new(format!("starships:{id}"))).collect();
        prop_assert_eq!(store.load_records(&keys).unwrap().len(), ids.len());

        let mut reversed = ids.clone();
        reversed.reverse();
        let read = store.read(&starships_query(json!(reversed))).unwrap();
        prop_assert_eq!(read, starships_data(&reversed));
    }
}

// ============================================================================
// Examples
// ============================================================================

#[test]
fn test_nested_input_object_order_is_canonical() {
    let a = default_storage_key("search", &json!({"filter": {"b": 1, "a": [2, {"d": 0, "c": 1}]}}));
    let b = default_storage_key("search", &json!({"filter": {"a": [2, {"c": 1, "d": 0}], "b": 1}}));
    assert_eq!(a, b);
}

#[test]
fn test_list_argument_with_uncached_element_is_missing() {
    let store = CacheStore::in_memory();
    let ids = vec!["X1".to_string(), "X2".to_string()];
    store.write(&starships_data(&ids), &starships_query(json!(ids))).unwrap();

    let err = store.read(&starships_query(json!(["X1", "X3"]))).unwrap_err();
    assert!(matches!(err, CacheError::Read(ReadError::MissingValue { .. })));
}
