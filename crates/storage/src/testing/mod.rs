//! Testing utilities for record store failure handling
//!
//! This module provides tools for testing how upper layers react to backend
//! failures:
//!
//! - **Fault injection**: a `RecordStore` wrapper whose loads, merges and
//!   removals can be made to fail on demand
//!
//! # Example
//!
//! ```
//! use graphcache_core::RecordStore;
//! use graphcache_storage::testing::{FaultSwitch, FaultyRecordStore};
//! use graphcache_storage::InMemoryRecordStore;
//!
//! let switch = FaultSwitch::new();
//! let store = FaultyRecordStore::new(InMemoryRecordStore::new(), switch.clone());
//! switch.fail_loads(true);
//! assert!(store.load(&[]).is_err());
//! ```

mod fault;

pub use fault::{FaultSwitch, FaultyRecordStore};
