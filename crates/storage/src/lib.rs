//! Storage layer for graphcache
//!
//! This crate implements record store backends:
//! - InMemoryRecordStore: FxHashMap-based default backend
//! - testing: fault-injecting wrapper for failure-path tests
//!
//! Backends hold `RecordKey -> Record` and nothing else; synchronization,
//! transactions and change publication live in the layers above.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod testing;

pub use memory::InMemoryRecordStore;
