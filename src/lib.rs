//! graphcache - normalized, watchable cache for GraphQL query results
//!
//! Tree-shaped operation results are flattened into records keyed by entity
//! identity, so two queries that touch the same object share one copy of it.
//! Reads reassemble trees from those records and report the field keys they
//! consulted; watchers use those keys to re-deliver only when something they
//! depend on actually changed.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use graphcache::{
//!     CacheStore, DataObject, Field, IdFieldConfiguration, Operation, OutputType, SelectionSet,
//! };
//!
//! let store = CacheStore::with_schema(Arc::new(IdFieldConfiguration));
//! let query = Operation::query(
//!     "Hero",
//!     SelectionSet::new("Query").field(Field::new(
//!         "hero",
//!         OutputType::object(
//!             SelectionSet::new("Hero")
//!                 .field(Field::new("id", OutputType::scalar("ID").non_null()))
//!                 .field(Field::new("name", OutputType::scalar("String"))),
//!         ),
//!     )),
//! );
//!
//! let data = DataObject::from(serde_json::json!({"hero": {"id": "1", "name": "Luke"}}));
//! store.write(&data, &query)?;
//!
//! let (result, dependencies) = store.read_with_dependencies(&query)?;
//! assert_eq!(result, data);
//! assert!(dependencies.contains("Hero:1.name"));
//! # Ok::<(), graphcache::CacheError>(())
//! ```
//!
//! # Architecture
//!
//! - `graphcache-core`: keys, records, values, selections, errors, traits
//! - `graphcache-storage`: record store backends
//! - `graphcache-concurrency`: the transaction manager
//! - `graphcache-engine`: normalizer, executor, store facade, client, watchers

pub use graphcache_core::*;
pub use graphcache_engine::*;
pub use graphcache_storage::InMemoryRecordStore;

/// Transaction manager internals, for callers that assemble their own store
pub mod concurrency {
    pub use graphcache_concurrency::{
        PendingOperations, ReadContext, TransactionManager, TransactionMetrics, WriteContext,
    };
}

/// Record store backends and failure-injection helpers
pub mod storage {
    pub use graphcache_storage::*;
}
