//! The normalized cache store
//!
//! `CacheStore` owns the transaction manager (and through it the record
//! store), the schema configuration that decides entity identity, and the
//! change notifier. Every write goes through a write transaction; on commit
//! the exact `ChangedKeys` are published to subscribers.
//!
//! ## Example
//!
//! ```
//! use graphcache_engine::CacheStore;
//! use graphcache_core::{DataObject, Field, Operation, OutputType, SelectionSet};
//! use serde_json::json;
//!
//! let store = CacheStore::in_memory();
//! let query = Operation::query(
//!     "Greeting",
//!     SelectionSet::new("Query").field(Field::new("greeting", OutputType::scalar("String"))),
//! );
//!
//! store.write(&DataObject::from(json!({"greeting": "hello"})), &query)?;
//! assert_eq!(store.read(&query)?.to_json(), json!({"greeting": "hello"}));
//! # Ok::<(), graphcache_core::CacheError>(())
//! ```

pub mod config;
mod transactions;

pub use config::{CacheConfig, ConfigError, CONFIG_FILE_NAME};
pub use transactions::{ReadTransaction, ReadWriteTransaction};

use std::fmt;
use std::sync::Arc;

use graphcache_concurrency::{TransactionManager, TransactionMetrics};
use graphcache_core::{
    CacheResult, ChangedKeys, DataObject, DefaultSchemaConfiguration, DependentKeySet, Operation,
    Record, RecordKey, RecordStore, SchemaConfiguration, SelectionSet, Variables,
};
use graphcache_storage::InMemoryRecordStore;
use tracing::info;

use crate::notifier::{ChangeNotice, ChangeNotifier, ContextId, SubscriptionId};

/// Normalized cache over a record store
pub struct CacheStore {
    manager: TransactionManager,
    schema: Arc<dyn SchemaConfiguration>,
    notifier: ChangeNotifier,
    config: CacheConfig,
}

impl CacheStore {
    /// Create a store over `backend`
    pub fn new(
        backend: impl RecordStore + 'static,
        schema: Arc<dyn SchemaConfiguration>,
        config: CacheConfig,
    ) -> Self {
        CacheStore {
            manager: TransactionManager::new(backend),
            schema,
            notifier: ChangeNotifier::new(),
            config,
        }
    }

    /// In-memory store with no identity hooks and default configuration
    pub fn in_memory() -> Self {
        Self::with_schema(Arc::new(DefaultSchemaConfiguration))
    }

    /// In-memory store with `schema` deciding entity identity
    pub fn with_schema(schema: Arc<dyn SchemaConfiguration>) -> Self {
        Self::new(InMemoryRecordStore::new(), schema, CacheConfig::default())
    }

    /// Configuration this store was created with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Schema configuration used for identity
    pub fn schema(&self) -> &dyn SchemaConfiguration {
        &*self.schema
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Run `body` against a consistent snapshot of the store
    pub fn with_read_transaction<T, F>(&self, body: F) -> CacheResult<T>
    where
        F: FnOnce(&ReadTransaction<'_, '_>) -> CacheResult<T>,
    {
        self.manager
            .read(|ctx| body(&ReadTransaction::new(ctx, &*self.schema)))
    }

    /// Run `body` as one write transaction
    ///
    /// The body's writes become visible atomically when it returns `Ok`;
    /// subscribers are then told exactly which fields changed. If the body
    /// (or the commit) fails nothing is applied and nothing is published.
    ///
    /// # Example
    ///
    /// ```
    /// use graphcache_engine::CacheStore;
    /// use graphcache_core::RecordKey;
    ///
    /// let store = CacheStore::in_memory();
    /// let removed = store.with_write_transaction(|txn| txn.remove_object(&RecordKey::new("Hero:1")))?;
    /// assert!(removed.is_none());
    /// # Ok::<(), graphcache_core::CacheError>(())
    /// ```
    pub fn with_write_transaction<T, F>(&self, body: F) -> CacheResult<T>
    where
        F: FnOnce(&mut ReadWriteTransaction<'_, '_>) -> CacheResult<T>,
    {
        self.with_write_transaction_from(None, body)
    }

    /// Run `body` as one write transaction originating from `context`
    ///
    /// The context is attached to the published change notice so its
    /// originator can recognise its own writes.
    pub fn with_write_transaction_from<T, F>(
        &self,
        context: Option<ContextId>,
        body: F,
    ) -> CacheResult<T>
    where
        F: FnOnce(&mut ReadWriteTransaction<'_, '_>) -> CacheResult<T>,
    {
        let (value, changed) = self
            .manager
            .write(|ctx| body(&mut ReadWriteTransaction::new(ctx, &*self.schema)))?;
        self.publish(changed, context);
        Ok(value)
    }

    fn publish(&self, changed: ChangedKeys, context: Option<ContextId>) {
        if changed.is_empty() && !self.config.notify_on_empty_changes {
            return;
        }
        self.notifier.publish(&ChangeNotice { changed, context });
    }

    // ========================================================================
    // Convenience Operations
    // ========================================================================

    /// Read an operation's result from the cache
    ///
    /// # Errors
    ///
    /// `CacheError::Read` on a cache miss; see `CacheError::is_cache_miss`.
    pub fn read(&self, operation: &Operation) -> CacheResult<DataObject> {
        self.with_read_transaction(|txn| txn.read(operation))
    }

    /// Read an operation's result together with the field keys it consulted
    pub fn read_with_dependencies(
        &self,
        operation: &Operation,
    ) -> CacheResult<(DataObject, DependentKeySet)> {
        self.with_read_transaction(|txn| txn.read_with_dependencies(operation))
    }

    /// Read `selection_set` starting at the record `key`
    pub fn read_object(
        &self,
        selection_set: &SelectionSet,
        key: &RecordKey,
        variables: &Variables,
    ) -> CacheResult<DataObject> {
        self.with_read_transaction(|txn| txn.read_object(selection_set, key, variables))
    }

    /// Write an operation result into the cache
    pub fn write(&self, data: &DataObject, operation: &Operation) -> CacheResult<()> {
        self.with_write_transaction(|txn| txn.write(data, operation))
    }

    /// Write `data` into the record `key`
    pub fn write_object(
        &self,
        data: &DataObject,
        selection_set: &SelectionSet,
        key: &RecordKey,
        variables: &Variables,
    ) -> CacheResult<()> {
        self.with_write_transaction(|txn| txn.write_object(data, selection_set, key, variables))
    }

    /// Read, mutate and write back the object at `key`
    ///
    /// See [`ReadWriteTransaction::update_object`].
    pub fn update_object<F>(
        &self,
        selection_set: &SelectionSet,
        key: &RecordKey,
        variables: &Variables,
        mutator: F,
    ) -> CacheResult<DataObject>
    where
        F: FnOnce(&mut DataObject),
    {
        self.with_write_transaction(|txn| txn.update_object(selection_set, key, variables, mutator))
    }

    /// Remove one record; references to it become dangling
    pub fn remove_object(&self, key: &RecordKey) -> CacheResult<Option<Record>> {
        self.with_write_transaction(|txn| txn.remove_object(key))
    }

    /// Remove every record whose key matches `pattern`
    pub fn remove_objects(&self, pattern: &str) -> CacheResult<Vec<Record>> {
        self.with_write_transaction(|txn| txn.remove_objects(pattern))
    }

    /// Remove every record
    pub fn clear_all(&self) -> CacheResult<()> {
        self.with_write_transaction(|txn| {
            txn.clear_all();
            Ok(())
        })?;
        info!(target: "graphcache::store", "Cache cleared");
        Ok(())
    }

    /// Raw records for `keys`, for diagnostics
    pub fn load_records(&self, keys: &[RecordKey]) -> CacheResult<Vec<Record>> {
        self.with_read_transaction(|txn| txn.load_records(keys))
    }

    // ========================================================================
    // Subscriptions & Metrics
    // ========================================================================

    /// Be told about every committed change
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeNotice) + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    /// Stop a subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Transaction counters
    pub fn metrics(&self) -> TransactionMetrics {
        self.manager.metrics()
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("manager", &self.manager)
            .field("notifier", &self.notifier)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphcache_core::{CacheError, Field, IdFieldConfiguration, OutputType};
    use graphcache_storage::testing::{FaultSwitch, FaultyRecordStore};
    use parking_lot::Mutex;
    use serde_json::json;

    fn name_query() -> Operation {
        Operation::query(
            "Name",
            SelectionSet::new("Query").field(Field::new(
                "hero",
                OutputType::object(
                    SelectionSet::new("Hero")
                        .field(Field::new("id", OutputType::scalar("ID").non_null()))
                        .field(Field::new("name", OutputType::scalar("String"))),
                ),
            )),
        )
    }

    fn recorder(store: &CacheStore) -> Arc<Mutex<Vec<ChangeNotice>>> {
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notices);
        store.subscribe(move |n| sink.lock().push(n.clone()));
        notices
    }

    #[test]
    fn test_write_publishes_exact_changes() {
        let store = CacheStore::with_schema(Arc::new(IdFieldConfiguration));
        let notices = recorder(&store);

        let data = DataObject::from(json!({"hero": {"id": "1", "name": "Luke"}}));
        store.write(&data, &name_query()).unwrap();
        // Identical second write changes nothing and publishes nothing
        store.write(&data, &name_query()).unwrap();

        let notices = notices.lock();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].changed.contains("Hero:1.name"));
        assert!(notices[0].changed.contains("QUERY_ROOT.hero"));
        assert_eq!(notices[0].context, None);
    }

    #[test]
    fn test_empty_changes_published_when_configured() {
        let config = CacheConfig {
            notify_on_empty_changes: true,
            ..CacheConfig::default()
        };
        let store = CacheStore::new(InMemoryRecordStore::new(), Arc::new(DefaultSchemaConfiguration), config);
        let notices = recorder(&store);

        store.with_write_transaction(|_| Ok(())).unwrap();
        assert_eq!(notices.lock().len(), 1);
        assert!(notices.lock()[0].changed.is_empty());
    }

    #[test]
    fn test_context_travels_with_notice() {
        let store = CacheStore::in_memory();
        let notices = recorder(&store);
        let context = ContextId::next();

        let data = DataObject::from(json!({"hero": {"id": "1", "name": "Luke"}}));
        store
            .with_write_transaction_from(Some(context), |txn| txn.write(&data, &name_query()))
            .unwrap();
        assert_eq!(notices.lock()[0].context, Some(context));
    }

    #[test]
    fn test_failed_transaction_publishes_nothing() {
        let store = CacheStore::in_memory();
        let notices = recorder(&store);

        let result: CacheResult<()> = store.with_write_transaction(|txn| {
            txn.write(
                &DataObject::from(json!({"hero": {"id": "1", "name": "Luke"}})),
                &name_query(),
            )?;
            Err(CacheError::InvalidOperation("changed my mind".into()))
        });

        assert!(result.is_err());
        assert!(notices.lock().is_empty());
        assert!(store.read(&name_query()).unwrap().has_null_value("hero"));
        assert_eq!(store.metrics().aborted, 1);
    }

    #[test]
    fn test_commit_failure_is_store_failure() {
        let switch = FaultSwitch::new();
        let store = CacheStore::new(
            FaultyRecordStore::new(InMemoryRecordStore::new(), switch.clone()),
            Arc::new(DefaultSchemaConfiguration),
            CacheConfig::default(),
        );
        let notices = recorder(&store);

        switch.fail_merges(true);
        let err = store
            .write(&DataObject::from(json!({"hero": {"id": "1"}})), &name_query())
            .unwrap_err();
        assert!(err.is_store_failure());
        assert!(notices.lock().is_empty());
    }

    #[test]
    fn test_clear_all_publishes_removed_fields() {
        let store = CacheStore::in_memory();
        store
            .write(&DataObject::from(json!({"hero": {"id": "1", "name": "Luke"}})), &name_query())
            .unwrap();
        let notices = recorder(&store);

        store.clear_all().unwrap();
        let notices = notices.lock();
        assert!(notices[0].changed.contains("QUERY_ROOT.hero"));
        assert!(notices[0].changed.contains("QUERY_ROOT.hero.name"));
        assert!(store.load_records(&[RecordKey::query_root()]).unwrap().is_empty());
    }

    #[test]
    fn test_remove_objects_by_pattern() {
        let store = CacheStore::with_schema(Arc::new(IdFieldConfiguration));
        for id in ["1", "2"] {
            store
                .write(&DataObject::from(json!({"hero": {"id": id, "name": "x"}})), &name_query())
                .unwrap();
        }
        let removed = store.remove_objects("hero:").unwrap();
        assert_eq!(removed.len(), 2);
    }
}
