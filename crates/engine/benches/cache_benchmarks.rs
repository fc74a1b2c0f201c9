//! Cache Performance Benchmarks
//!
//! Measures the write (normalize + commit) and read (execute) paths over a
//! list of entities, and read throughput under concurrent readers.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use graphcache_core::{DataObject, Field, IdFieldConfiguration, Operation, OutputType, SelectionSet};
use graphcache_engine::CacheStore;
use serde_json::json;
use std::sync::Arc;
use std::thread;

fn friends_query() -> Operation {
    Operation::query(
        "Friends",
        SelectionSet::new("Query").field(Field::new(
            "friends",
            OutputType::object(
                SelectionSet::new("Hero")
                    .field(Field::new("id", OutputType::scalar("ID").non_null()))
                    .field(Field::new("name", OutputType::scalar("String").non_null()))
                    .field(Field::new("mass", OutputType::scalar("Int"))),
            )
            .non_null()
            .list()
            .non_null(),
        )),
    )
}

fn friends_data(count: usize, generation: usize) -> DataObject {
    let friends: Vec<_> = (0..count)
        .map(|i| json!({"id": i.to_string(), "name": format!("hero {i}"), "mass": generation}))
        .collect();
    DataObject::from(json!({ "friends": friends }))
}

fn store() -> CacheStore {
    CacheStore::with_schema(Arc::new(IdFieldConfiguration))
}

/// Benchmark: normalize and commit a list of N entities
fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    let query = friends_query();

    for count in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let store = store();
            let mut generation = 0;
            b.iter(|| {
                generation += 1;
                let data = friends_data(count, generation);
                black_box(store.write(&data, &query).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark: read a list of N entities back with dependency tracking
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    let query = friends_query();

    for count in [10usize, 100, 1000] {
        let store = store();
        store.write(&friends_data(count, 0), &query).unwrap();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(store.read_with_dependencies(&query).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark: 4 threads reading concurrently
fn bench_concurrent_reads(c: &mut Criterion) {
    let query = friends_query();
    let store = Arc::new(store());
    store.write(&friends_data(100, 0), &query).unwrap();

    c.bench_function("concurrent_reads_4x100", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let query = query.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            black_box(store.read(&query).unwrap());
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
}

criterion_group!(benches, bench_write, bench_read, bench_concurrent_reads);
criterion_main!(benches);
