//! Concurrency layer for graphcache
//!
//! This crate implements the transaction manager:
//! - TransactionManager: single synchronization boundary around the record store
//! - ReadContext: shared, snapshot-consistent view for concurrent readers
//! - WriteContext: exclusive view with a buffered overlay (read-your-writes)
//! - TransactionMetrics: observational counters
//!
//! Writers are linearizable with respect to each other; readers see either
//! the state before a commit or after it, never a record mid-merge.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;

pub use manager::{TransactionManager, TransactionMetrics};
pub use transaction::{PendingOperations, ReadContext, WriteContext};
