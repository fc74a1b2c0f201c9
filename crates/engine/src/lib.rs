//! Cache engine for graphcache
//!
//! This crate orchestrates the lower layers:
//! - Cache keys: storage keys, entity identity, field policies
//! - Normalizer: tree-shaped results into flat records
//! - Executor: records back into results, with dependency tracking and
//!   deferred fragments
//! - CacheStore: transactions over the record store plus change publication
//! - Client and watchers: cache policies, invalidation, refetching
//!
//! The engine is the only component that knows about:
//! - Selection semantics (arguments, fragments, inclusion, defer)
//! - Who to tell when records change

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache_key;
pub mod client;
pub mod executor;
pub mod normalizer;
pub mod notifier;
pub mod store;
pub mod watcher;

pub use cache_key::{EntityKeys, KeyResolver};
pub use client::{CachePolicy, Client, GraphResult, NetworkTransport, ResultSource};
pub use executor::execute;
pub use normalizer::{normalize, normalize_partial};
pub use notifier::{ChangeNotice, ChangeNotifier, ContextId, SubscriptionId};
pub use store::{CacheConfig, CacheStore, ConfigError, ReadTransaction, ReadWriteTransaction};
pub use watcher::QueryWatcher;
