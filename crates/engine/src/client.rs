//! Client: cache policies over a network transport
//!
//! The client decides, per operation, whether a result comes from the cache,
//! from the network, or both, and keeps the cache up to date with every
//! server result it writes.
//!
//! | Policy                       | Cache read | Network | Writes result |
//! |------------------------------|------------|---------|---------------|
//! | `server-only`                | no         | always  | no            |
//! | `network-then-cache-always`  | no         | always  | yes           |
//! | `cache-only`                 | yes        | never   | -             |
//! | `cache-else-network`         | yes        | on miss | yes           |
//! | `cache-then-network`         | yes        | always  | yes           |
//!
//! A store failure is reported as is; it never triggers a network fallback.

use std::fmt;
use std::sync::Arc;

use graphcache_core::{
    CacheError, CacheResult, DataObject, DependentKeySet, NetworkError, Operation,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::notifier::ContextId;
use crate::store::CacheStore;
use crate::watcher::QueryWatcher;

/// Where results for an operation come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Network only; the result is not written to the cache
    ServerOnly,
    /// Network only; the result is always written to the cache
    NetworkThenCacheAlways,
    /// Cache only; a miss is an error
    CacheOnly,
    /// Cache, falling back to the network on a miss
    #[default]
    CacheElseNetwork,
    /// Cache hit (if any) first, then always the network
    CacheThenNetwork,
}

impl CachePolicy {
    /// Whether this policy consults the cache before the network
    pub fn reads_cache(self) -> bool {
        matches!(
            self,
            CachePolicy::CacheOnly | CachePolicy::CacheElseNetwork | CachePolicy::CacheThenNetwork
        )
    }

    /// Whether server results under this policy are written to the cache
    pub fn writes_cache(self) -> bool {
        !matches!(self, CachePolicy::ServerOnly | CachePolicy::CacheOnly)
    }
}

/// Sends operations to a GraphQL server
pub trait NetworkTransport: Send + Sync {
    /// Execute `operation` remotely and return its `data`
    fn send(&self, operation: &Operation) -> Result<DataObject, NetworkError>;
}

/// Origin of a delivered result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultSource {
    /// Read from the cache
    Cache,
    /// Returned by the server
    Server,
}

/// One delivered operation result
#[derive(Debug, Clone, PartialEq)]
pub struct GraphResult {
    /// Result data
    pub data: DataObject,
    /// Where it came from
    pub source: ResultSource,
    /// Field keys the result depends on, when it is backed by the cache
    pub dependent_keys: Option<DependentKeySet>,
}

/// GraphQL client with a normalized cache
///
/// Cheap to clone; clones share the store and transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) store: Arc<CacheStore>,
    transport: Arc<dyn NetworkTransport>,
}

impl Client {
    /// Create a client over `store` and `transport`
    pub fn new(store: Arc<CacheStore>, transport: Arc<dyn NetworkTransport>) -> Self {
        Client {
            inner: Arc::new(ClientInner { store, transport }),
        }
    }

    /// The cache store
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.inner.store
    }

    /// Fetch `operation` under `policy`, delivering each result to `on_result`
    ///
    /// `on_result` is called once, or twice for `cache-then-network` with a
    /// cache hit, before this returns.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use graphcache_engine::{CachePolicy, CacheStore, Client, NetworkTransport, ResultSource};
    /// use graphcache_core::{DataObject, Field, NetworkError, Operation, OutputType, SelectionSet};
    /// use serde_json::json;
    ///
    /// struct Hello;
    /// impl NetworkTransport for Hello {
    ///     fn send(&self, _: &Operation) -> Result<DataObject, NetworkError> {
    ///         Ok(DataObject::from(json!({"greeting": "hello"})))
    ///     }
    /// }
    ///
    /// let client = Client::new(Arc::new(CacheStore::in_memory()), Arc::new(Hello));
    /// let query = Operation::query(
    ///     "Greeting",
    ///     SelectionSet::new("Query").field(Field::new("greeting", OutputType::scalar("String").non_null())),
    /// );
    ///
    /// let mut sources = Vec::new();
    /// client.fetch(&query, CachePolicy::CacheElseNetwork, |r| sources.push(r.unwrap().source));
    /// client.fetch(&query, CachePolicy::CacheElseNetwork, |r| sources.push(r.unwrap().source));
    /// assert_eq!(sources, vec![ResultSource::Server, ResultSource::Cache]);
    /// ```
    pub fn fetch<F>(&self, operation: &Operation, policy: CachePolicy, mut on_result: F)
    where
        F: FnMut(CacheResult<GraphResult>),
    {
        self.inner.fetch(operation, policy, None, &mut on_result);
    }

    /// Fetch `operation` under the store's configured default policy
    pub fn query<F>(&self, operation: &Operation, on_result: F)
    where
        F: FnMut(CacheResult<GraphResult>),
    {
        let policy = self.inner.store.config().default_cache_policy;
        self.fetch(operation, policy, on_result);
    }

    /// Fetch `operation` and keep delivering results as the cache changes
    ///
    /// The watcher stops when cancelled or dropped.
    pub fn watch<F>(&self, operation: Operation, policy: CachePolicy, on_result: F) -> QueryWatcher
    where
        F: Fn(CacheResult<GraphResult>) + Send + Sync + 'static,
    {
        QueryWatcher::start(&self.inner, operation, policy, Box::new(on_result))
    }
}

impl ClientInner {
    pub(crate) fn fetch(
        &self,
        operation: &Operation,
        policy: CachePolicy,
        context: Option<ContextId>,
        on_result: &mut dyn FnMut(CacheResult<GraphResult>),
    ) {
        if policy.reads_cache() {
            match self.store.read_with_dependencies(operation) {
                Ok((data, dependent_keys)) => {
                    debug!(target: "graphcache::client", operation = %operation.name, ?policy, "Cache hit");
                    on_result(Ok(GraphResult {
                        data,
                        source: ResultSource::Cache,
                        dependent_keys: Some(dependent_keys),
                    }));
                    if policy != CachePolicy::CacheThenNetwork {
                        return;
                    }
                }
                Err(e) if e.is_cache_miss() && policy != CachePolicy::CacheOnly => {
                    debug!(
                        target: "graphcache::client",
                        operation = %operation.name,
                        ?policy,
                        reason = %e,
                        "Cache miss, fetching from network"
                    );
                }
                Err(e) => {
                    on_result(Err(e));
                    return;
                }
            }
        }
        on_result(self.fetch_from_network(operation, policy.writes_cache(), context));
    }

    /// Send `operation` and, if `write` is set, store the result
    pub(crate) fn fetch_from_network(
        &self,
        operation: &Operation,
        write: bool,
        context: Option<ContextId>,
    ) -> CacheResult<GraphResult> {
        let data = self.transport.send(operation).map_err(|e| {
            warn!(target: "graphcache::client", operation = %operation.name, error = %e, "Network request failed");
            CacheError::from(e)
        })?;

        let dependent_keys = if write {
            self.store.with_write_transaction_from(context, |txn| {
                txn.write(&data, operation)?;
                match txn.read_with_dependencies(operation) {
                    Ok((_, keys)) => Ok(Some(keys)),
                    Err(e) if e.is_cache_miss() => Ok(None),
                    Err(e) => Err(e),
                }
            })?
        } else {
            None
        };

        debug!(
            target: "graphcache::client",
            operation = %operation.name,
            written = write,
            "Server result"
        );
        Ok(GraphResult {
            data,
            source: ResultSource::Server,
            dependent_keys,
        })
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}
