//! Concurrency Tests
//!
//! Readers of a stable store agree; write transactions commit entirely or
//! not at all, and readers never observe half of one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use crate::common::*;
use graphcache::{CacheError, DataObject};
use serde_json::json;

#[test]
fn test_concurrent_readers_see_identical_results() {
    let store = Arc::new(id_store());
    store
        .write(
            &DataObject::from(json!({"squad": [
                {"id": "1", "name": "Luke", "mass": 77, "friends": [{"id": "2", "name": "Leia", "mass": 49}]},
                {"id": "2", "name": "Leia", "mass": 49, "friends": []},
            ]})),
            &squad_query(),
        )
        .unwrap();

    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..50)
                    .map(|_| store.read(&squad_query()).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let expected = store.read(&squad_query()).unwrap();
    for handle in handles {
        for result in handle.join().unwrap() {
            assert_eq!(result, expected);
        }
    }
}

#[test]
fn test_readers_never_observe_partial_commits() {
    let store = Arc::new(id_store());
    store.write(&hero_data("1", "gen 0", 0), &hero_query("1")).unwrap();
    store.write(&hero_data("2", "gen 0", 0), &hero_query("2")).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    // Each commit rewrites both heroes to the same generation
    let writer = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for generation in 1..=200i64 {
                store
                    .with_write_transaction(|txn| {
                        for id in ["1", "2"] {
                            txn.write(&hero_data(id, &format!("gen {generation}"), generation), &hero_query(id))?;
                        }
                        Ok(())
                    })
                    .unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    let (one, two) = store
                        .with_read_transaction(|txn| {
                            Ok((txn.read(&hero_query("1"))?, txn.read(&hero_query("2"))?))
                        })
                        .unwrap();
                    assert_eq!(one.to_json()["hero"]["mass"], two.to_json()["hero"]["mass"]);
                    assert_eq!(one.to_json()["hero"]["name"], two.to_json()["hero"]["name"]);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_failed_transactions_leave_no_trace() {
    let store = Arc::new(id_store());
    store.write(&hero_data("1", "Luke", 77), &hero_query("1")).unwrap();
    let notices = record_notices(&store);

    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));
    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.with_write_transaction(|txn| {
                    let id = format!("{}", 100 + i);
                    txn.write(&hero_data(&id, "Temp", 1), &hero_query(&id))?;
                    // Odd threads abort after a successful first write
                    if i % 2 == 1 {
                        txn.write(&DataObject::from(json!({"hero": {"name": "no id"}})), &hero_query("x"))?;
                    }
                    Ok(())
                })
            })
        })
        .collect();

    let outcomes: Vec<Result<(), CacheError>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for (i, outcome) in outcomes.iter().enumerate() {
        let key = RecordKey::new(format!("Hero:{}", 100 + i));
        let stored = store.load_records(&[key]).unwrap();
        if i % 2 == 1 {
            assert!(outcome.is_err());
            assert!(stored.is_empty(), "aborted write of thread {i} leaked");
        } else {
            assert!(outcome.is_ok());
            assert_eq!(stored.len(), 1);
        }
    }
    assert_eq!(notices.lock().len(), num_threads / 2);
    let metrics = store.metrics();
    assert_eq!(metrics.aborted, (num_threads / 2) as u64);
}
