//! Transaction manager: the single synchronization boundary around the store
//!
//! Every access to the record store funnels through here:
//!
//! - `read`: runs a body under the shared lock; any number may run at once
//! - `write`: runs a body under the exclusive lock against a buffered
//!   overlay, then applies the overlay before releasing the lock
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Acquire the exclusive lock (waits for in-flight reads and writes)
//! 2. Run the body against a WriteContext (overlay only, backend untouched)
//! 3. IF the body fails: drop the overlay, count an abort, return the error
//! 4. Apply the overlay to the backend, computing the changed field keys
//! 5. Release the lock and return (value, changed keys)
//! ```
//!
//! Readers never observe step 4 in progress: they hold the shared lock,
//! which cannot coexist with the exclusive one.

use crate::transaction::{ReadContext, WriteContext};
use graphcache_core::{ChangedKeys, RecordStore, StoreError};
use graphcache_storage::InMemoryRecordStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Snapshot of transaction counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionMetrics {
    /// Write transactions started
    pub started: u64,
    /// Write transactions committed
    pub committed: u64,
    /// Write transactions aborted
    pub aborted: u64,
    /// Write transactions currently running or waiting for the lock
    pub active: u64,
    /// Read transactions run
    pub reads: u64,
}

impl TransactionMetrics {
    /// Fraction of finished write transactions that committed
    pub fn commit_rate(&self) -> f64 {
        let finished = self.committed + self.aborted;
        if finished == 0 {
            0.0
        } else {
            self.committed as f64 / finished as f64
        }
    }
}

/// Owns the record store and serializes access to it
///
/// # Memory Ordering
///
/// The metric counters use Relaxed ordering: they are purely observational
/// and do not synchronize any other memory operations. The lock provides
/// all ordering between transactions.
pub struct TransactionManager {
    store: RwLock<Box<dyn RecordStore>>,
    next_txn_id: AtomicU64,
    active_count: AtomicU64,
    total_started: AtomicU64,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
    total_reads: AtomicU64,
}

impl TransactionManager {
    /// Wrap a record store backend
    pub fn new(store: impl RecordStore + 'static) -> Self {
        TransactionManager {
            store: RwLock::new(Box::new(store)),
            next_txn_id: AtomicU64::new(1),
            active_count: AtomicU64::new(0),
            total_started: AtomicU64::new(0),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
            total_reads: AtomicU64::new(0),
        }
    }

    /// Manager over an empty in-memory store
    pub fn in_memory() -> Self {
        Self::new(InMemoryRecordStore::new())
    }

    fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run `body` in a read transaction
    ///
    /// Blocks while a write transaction is committing. The context cannot
    /// escape the body, so no access outlives the shared lock.
    pub fn read<T, F>(&self, body: F) -> T
    where
        F: FnOnce(&ReadContext<'_>) -> T,
    {
        let txn_id = self.next_txn_id();
        self.total_reads.fetch_add(1, Ordering::Relaxed);
        let guard = self.store.read();
        let ctx = ReadContext::new(txn_id, &**guard);
        body(&ctx)
    }

    /// Run `body` in a read-write transaction and commit it
    ///
    /// # Arguments
    /// * `body` - Transaction body; every load inside it observes the
    ///   transaction's own earlier writes
    ///
    /// # Returns
    /// The body's value and the field keys the commit changed.
    ///
    /// # Errors
    ///
    /// Returns the body's error (nothing is applied), or a `StoreError`
    /// converted into `E` if the backend rejects the commit.
    pub fn write<T, E, F>(&self, body: F) -> Result<(T, ChangedKeys), E>
    where
        F: FnOnce(&mut WriteContext<'_>) -> Result<T, E>,
        E: From<StoreError> + std::fmt::Display,
    {
        let txn_id = self.next_txn_id();
        self.active_count.fetch_add(1, Ordering::Relaxed);
        self.total_started.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.store.write();
        debug!(target: "graphcache::txn", txn_id, "Transaction started");

        let outcome = {
            let mut ctx = WriteContext::new(txn_id, &**guard);
            match body(&mut ctx) {
                Ok(value) => Ok((value, ctx.into_pending())),
                Err(e) => Err(e),
            }
        };

        let result = match outcome {
            Ok((value, pending)) => pending
                .apply(txn_id, &mut **guard)
                .map(|changed| (value, changed))
                .map_err(E::from),
            Err(e) => Err(e),
        };
        drop(guard);

        self.active_count.fetch_sub(1, Ordering::Relaxed);
        match &result {
            Ok((_, changed)) => {
                self.total_committed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    target: "graphcache::txn",
                    txn_id,
                    changed_fields = changed.len(),
                    "Transaction committed"
                );
            }
            Err(e) => {
                self.total_aborted.fetch_add(1, Ordering::Relaxed);
                warn!(target: "graphcache::txn", txn_id, error = %e, "Transaction aborted");
            }
        }
        result
    }

    /// Current transaction counters
    pub fn metrics(&self) -> TransactionMetrics {
        TransactionMetrics {
            started: self.total_started.load(Ordering::Relaxed),
            committed: self.total_committed.load(Ordering::Relaxed),
            aborted: self.total_aborted.load(Ordering::Relaxed),
            active: self.active_count.load(Ordering::Relaxed),
            reads: self.total_reads.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphcache_core::{CacheValue, Record, RecordKey, RecordSource};
    use graphcache_storage::testing::{FaultSwitch, FaultyRecordStore};
    use serde_json::json;

    fn hero(name: &str) -> Record {
        Record::with_fields(RecordKey::new("Hero:1"), [("name", CacheValue::Scalar(json!(name)))])
    }

    fn name_of(manager: &TransactionManager) -> Option<CacheValue> {
        manager.read(|txn| {
            txn.load_record(&RecordKey::new("Hero:1"))
                .unwrap()
                .and_then(|r| r.get("name").cloned())
        })
    }

    #[test]
    fn test_commit_publishes_changed_keys() {
        let manager = TransactionManager::in_memory();
        let ((), changed) = manager
            .write(|txn| {
                txn.merge(std::iter::once(hero("Luke")).collect());
                Ok::<_, StoreError>(())
            })
            .unwrap();
        assert!(changed.contains("Hero:1.name"));
        assert_eq!(name_of(&manager), Some(CacheValue::Scalar(json!("Luke"))));

        let metrics = manager.metrics();
        assert_eq!(metrics.started, 1);
        assert_eq!(metrics.committed, 1);
        assert_eq!(metrics.active, 0);
    }

    #[test]
    fn test_failing_body_applies_nothing() {
        let manager = TransactionManager::in_memory();
        let result: Result<((), ChangedKeys), StoreError> = manager.write(|txn| {
            txn.merge(std::iter::once(hero("Luke")).collect());
            Err(StoreError::Backend("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(name_of(&manager), None);
        assert_eq!(manager.metrics().aborted, 1);
        assert_eq!(manager.metrics().commit_rate(), 0.0);
    }

    #[test]
    fn test_backend_failure_aborts_commit() {
        let switch = FaultSwitch::new();
        let manager = TransactionManager::new(FaultyRecordStore::new(
            InMemoryRecordStore::new(),
            switch.clone(),
        ));
        switch.fail_merges(true);

        let result = manager.write(|txn| {
            txn.merge(std::iter::once(hero("Luke")).collect());
            Ok::<_, StoreError>(())
        });
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(manager.metrics().aborted, 1);

        switch.fail_merges(false);
        assert_eq!(name_of(&manager), None);
    }

    #[test]
    fn test_failed_removal_rolls_back_whole_commit() {
        let switch = FaultSwitch::new();
        let leia = Record::with_fields(RecordKey::new("Hero:2"), [("name", CacheValue::Scalar(json!("Leia")))]);
        let manager = TransactionManager::new(FaultyRecordStore::new(
            InMemoryRecordStore::with_records(std::iter::once(leia).collect()),
            switch.clone(),
        ));
        switch.fail_removals(true);

        let result = manager.write(|txn| {
            txn.merge(std::iter::once(hero("Luke")).collect());
            txn.remove_record(&RecordKey::new("Hero:2"))?;
            Ok::<_, StoreError>(())
        });
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(manager.metrics().aborted, 1);

        // Neither the merge nor the removal reached the backend
        switch.fail_removals(false);
        assert_eq!(name_of(&manager), None);
        let still_there = manager.read(|txn| txn.load_record(&RecordKey::new("Hero:2")).unwrap());
        assert!(still_there.is_some());
        assert_eq!(switch.merge_calls(), 0);
    }

    #[test]
    fn test_identical_rewrite_changes_nothing() {
        let manager = TransactionManager::in_memory();
        for _ in 0..2 {
            manager
                .write(|txn| {
                    txn.merge(std::iter::once(hero("Luke")).collect());
                    Ok::<_, StoreError>(())
                })
                .unwrap();
        }
        let ((), changed) = manager
            .write(|txn| {
                txn.merge(std::iter::once(hero("Luke")).collect());
                Ok::<_, StoreError>(())
            })
            .unwrap();
        assert!(changed.is_empty());
    }
}
