//! Round-Trip Tests
//!
//! Any result that conforms to its selection reads back unchanged after a
//! write, however entities are shared between positions in the tree.

use crate::common::*;
use graphcache::{CacheValue, DataObject};
use proptest::prelude::*;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct Hero {
    name: Option<String>,
    mass: Option<i64>,
    friends: Vec<usize>,
}

fn hero_json(id: usize, hero: &Hero) -> Value {
    json!({"id": id.to_string(), "name": hero.name, "mass": hero.mass})
}

/// A roster of distinct heroes and a squad of roster members. Every hero has
/// one fixed friends list, so a hero appearing at several positions always
/// carries the same field values.
fn squad_strategy() -> impl Strategy<Value = (Vec<Hero>, Vec<usize>)> {
    (1usize..8).prop_flat_map(|n| {
        let hero = (
            proptest::option::of("[a-zA-Z ]{0,12}"),
            proptest::option::of(any::<i64>()),
            proptest::collection::vec(0..n, 0..4),
        )
            .prop_map(|(name, mass, friends)| Hero { name, mass, friends });
        (
            proptest::collection::vec(hero, n),
            proptest::collection::vec(0..n, 0..6),
        )
    })
}

fn squad_data(roster: &[Hero], squad: &[usize]) -> DataObject {
    let members: Vec<Value> = squad
        .iter()
        .map(|&member| {
            let mut value = hero_json(member, &roster[member]);
            value["friends"] = roster[member]
                .friends
                .iter()
                .map(|&f| hero_json(f, &roster[f]))
                .collect();
            value
        })
        .collect();
    DataObject::from(json!({ "squad": members }))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn test_write_then_read_returns_same_tree((roster, squad) in squad_strategy()) {
        let store = id_store();
        let query = squad_query();
        let data = squad_data(&roster, &squad);

        store.write(&data, &query).unwrap();

        prop_assert_eq!(store.read(&query).unwrap(), data);
    }

    #[test]
    fn test_shared_entities_stored_once((roster, squad) in squad_strategy()) {
        let store = id_store();
        store.write(&squad_data(&roster, &squad), &squad_query()).unwrap();

        let root = store.load_records(&[RecordKey::query_root()]).unwrap();
        match root[0].get("squad") {
            Some(CacheValue::List(items)) => {
                prop_assert_eq!(items.len(), squad.len());
                for (item, member) in items.iter().zip(&squad) {
                    prop_assert_eq!(item, &CacheValue::Reference(RecordKey::new(format!("Hero:{member}"))));
                }
            }
            other => prop_assert!(false, "squad stored as {:?}", other),
        }
    }

    #[test]
    fn test_rewriting_same_tree_changes_nothing((roster, squad) in squad_strategy()) {
        let store = id_store();
        let query = squad_query();
        let data = squad_data(&roster, &squad);
        store.write(&data, &query).unwrap();

        let notices = record_notices(&store);
        store.write(&data, &query).unwrap();

        prop_assert!(notices.lock().is_empty());
    }
}

// ============================================================================
// Examples
// ============================================================================

#[test]
fn test_entity_shared_between_queries_updates_both() {
    let store = id_store();
    let squad = squad_query();
    store
        .write(
            &DataObject::from(json!({"squad": [
                {"id": "1", "name": "Luke", "mass": 77, "friends": [{"id": "2", "name": "Leia", "mass": 49}]},
            ]})),
            &squad,
        )
        .unwrap();

    store.write(&hero_data("2", "Leia Organa", 49), &hero_query("2")).unwrap();

    let result = store.read(&squad).unwrap().to_json();
    assert_eq!(result["squad"][0]["friends"][0]["name"], "Leia Organa");
}
