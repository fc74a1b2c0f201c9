//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::sync::Arc;

pub use graphcache::{
    CacheConfig, CacheStore, ChangeNotice, DataObject, Field, IdFieldConfiguration, InputValue,
    Operation, OutputType, RecordKey, SelectionSet,
};
use parking_lot::Mutex;
use serde_json::json;

// ============================================================================
// Initialization
// ============================================================================

/// Route engine logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Store that identifies objects by their `id` field
pub fn id_store() -> CacheStore {
    init_tracing();
    CacheStore::with_schema(Arc::new(IdFieldConfiguration))
}

// ============================================================================
// Operations
// ============================================================================

/// `Hero` fields shared by the fixtures
pub fn hero_fields() -> SelectionSet {
    SelectionSet::new("Hero")
        .field(Field::new("id", OutputType::scalar("ID").non_null()))
        .field(Field::new("name", OutputType::scalar("String")))
        .field(Field::new("mass", OutputType::scalar("Int")))
}

/// `hero(id: $id) { id name mass }`
pub fn hero_query(id: &str) -> Operation {
    Operation::query(
        "Hero",
        SelectionSet::new("Query").field(
            Field::new("hero", OutputType::object(hero_fields()))
                .argument("id", InputValue::variable("id")),
        ),
    )
    .variable("id", id)
}

/// `squad { id name mass friends { id name mass } }`
pub fn squad_query() -> Operation {
    Operation::query(
        "Squad",
        SelectionSet::new("Query").field(Field::new(
            "squad",
            OutputType::object(hero_fields().field(Field::new(
                "friends",
                OutputType::object(hero_fields()).non_null().list(),
            )))
            .non_null()
            .list()
            .non_null(),
        )),
    )
}

/// Result data for `hero_query`
pub fn hero_data(id: &str, name: &str, mass: i64) -> DataObject {
    DataObject::from(json!({"hero": {"id": id, "name": name, "mass": mass}}))
}

// ============================================================================
// Notice Recording
// ============================================================================

/// Collects every change notice the store publishes
pub fn record_notices(store: &CacheStore) -> Arc<Mutex<Vec<ChangeNotice>>> {
    let notices = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notices);
    store.subscribe(move |notice| sink.lock().push(notice.clone()));
    notices
}
