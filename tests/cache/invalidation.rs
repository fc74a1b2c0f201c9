//! Invalidation Precision Tests
//!
//! Change sets name exactly the field keys whose values changed, and watchers
//! react only to changes inside what they read.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use crate::common::*;
use graphcache::{CachePolicy, Client, DataObject, NetworkError, NetworkTransport};
use parking_lot::Mutex;
use proptest::prelude::*;

/// Transport for caches that are always seeded first
struct Unreachable;

impl NetworkTransport for Unreachable {
    fn send(&self, _operation: &Operation) -> Result<DataObject, NetworkError> {
        Err(NetworkError::new("offline"))
    }
}

fn counting_watch(client: &Client, id: &str) -> (graphcache::QueryWatcher, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    let watcher = client.watch(hero_query(id), CachePolicy::CacheOnly, move |result| {
        assert!(result.is_ok(), "unexpected error: {result:?}");
        sink.fetch_add(1, Ordering::SeqCst);
    });
    (watcher, count)
}

// ============================================================================
// Change Sets
// ============================================================================

#[test]
fn test_change_set_is_exact() {
    let store = id_store();
    store.write(&hero_data("1", "Luke", 77), &hero_query("1")).unwrap();
    let notices = record_notices(&store);

    store.write(&hero_data("1", "Luke", 78), &hero_query("1")).unwrap();

    let notices = notices.lock();
    assert_eq!(notices.len(), 1);
    let changed: Vec<&str> = notices[0].changed.fields().iter().map(|k| k.as_str()).collect();
    assert_eq!(changed, vec!["Hero:1.mass"]);
}

#[test]
fn test_removal_marks_every_field_changed() {
    let store = id_store();
    store.write(&hero_data("1", "Luke", 77), &hero_query("1")).unwrap();
    let notices = record_notices(&store);

    store.remove_object(&RecordKey::new("Hero:1")).unwrap();

    let notices = notices.lock();
    for field in ["Hero:1.id", "Hero:1.name", "Hero:1.mass"] {
        assert!(notices[0].changed.contains(field), "{field} not reported");
    }
}

proptest! {
    #[test]
    fn test_changed_keys_match_differing_fields(
        before in proptest::collection::vec(0i64..3, 4),
        after in proptest::collection::vec(0i64..3, 4),
    ) {
        let store = id_store();
        for (i, mass) in before.iter().enumerate() {
            store.write(&hero_data(&i.to_string(), "Hero", *mass), &hero_query(&i.to_string())).unwrap();
        }
        let notices = record_notices(&store);

        store
            .with_write_transaction(|txn| {
                for (i, mass) in after.iter().enumerate() {
                    txn.write(&hero_data(&i.to_string(), "Hero", *mass), &hero_query(&i.to_string()))?;
                }
                Ok(())
            })
            .unwrap();

        let expected: Vec<String> = before
            .iter()
            .zip(&after)
            .enumerate()
            .filter(|(_, (b, a))| b != a)
            .map(|(i, _)| format!("Hero:{i}.mass"))
            .collect();
        let notices = notices.lock();
        if expected.is_empty() {
            prop_assert!(notices.is_empty());
        } else {
            let changed: Vec<String> = notices[0].changed.fields().iter().map(|k| k.to_string()).collect();
            prop_assert_eq!(changed, expected);
        }
    }
}

// ============================================================================
// Watchers
// ============================================================================

#[test]
fn test_only_intersecting_watcher_triggers() {
    let store = Arc::new(id_store());
    store.write(&hero_data("1", "Luke", 77), &hero_query("1")).unwrap();
    store.write(&hero_data("2", "Leia", 49), &hero_query("2")).unwrap();
    let client = Client::new(Arc::clone(&store), Arc::new(Unreachable));

    let (_luke, luke_count) = counting_watch(&client, "1");
    let (_leia, leia_count) = counting_watch(&client, "2");

    store.write(&hero_data("2", "Leia Organa", 49), &hero_query("2")).unwrap();

    assert_eq!(luke_count.load(Ordering::SeqCst), 1);
    assert_eq!(leia_count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_identical_commits_trigger_once() {
    let store = Arc::new(id_store());
    store.write(&hero_data("1", "Luke", 77), &hero_query("1")).unwrap();
    let client = Client::new(Arc::clone(&store), Arc::new(Unreachable));
    let (_watcher, count) = counting_watch(&client, "1");

    let num_threads = 2;
    let barrier = Arc::new(Barrier::new(num_threads));
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.write(&hero_data("1", "Luke", 80), &hero_query("1")).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_changed_dependency_with_equal_result_is_not_redelivered() {
    let store = Arc::new(id_store());
    store
        .write(&DataObject::from(serde_json::json!({"hero": {"id": "1", "name": "Luke"}})), &hero_query("1"))
        .unwrap();
    let client = Client::new(Arc::clone(&store), Arc::new(Unreachable));
    let (_watcher, count) = counting_watch(&client, "1");
    let notices = record_notices(&store);

    // Absent optional mass already reads as null; storing an explicit null
    // changes the field key but not the result
    store
        .write(
            &DataObject::from(serde_json::json!({"hero": {"id": "1", "name": "Luke", "mass": null}})),
            &hero_query("1"),
        )
        .unwrap();

    let notices = notices.lock();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].changed.contains("Hero:1.mass"));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_watcher_follows_moved_dependencies() {
    let store = Arc::new(id_store());
    let client = Client::new(Arc::clone(&store), Arc::new(Unreachable));
    let squad = |friend: &str| {
        DataObject::from(serde_json::json!({"squad": [
            {"id": "1", "name": "Luke", "mass": 77, "friends": [{"id": friend, "name": "Friend", "mass": 1}]},
        ]}))
    };
    store.write(&squad("2"), &squad_query()).unwrap();

    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&names);
    let _watcher = client.watch(squad_query(), CachePolicy::CacheOnly, move |result| {
        if let Ok(result) = result {
            sink.lock().push(result.data.to_json()["squad"][0]["friends"][0]["mass"].clone());
        }
    });

    // Point Luke at a new friend; the old friend is no longer a dependency
    store.write(&squad("3"), &squad_query()).unwrap();
    store.write(&hero_data("2", "Friend", 2), &hero_query("2")).unwrap();
    store.write(&hero_data("3", "Friend", 3), &hero_query("3")).unwrap();

    assert_eq!(*names.lock(), vec![serde_json::json!(1), serde_json::json!(1), serde_json::json!(3)]);
}
