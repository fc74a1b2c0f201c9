//! Transaction contexts
//!
//! This module implements the handles a transaction body works through:
//!
//! - `ReadContext`: shared view over the committed store state
//! - `WriteContext`: exclusive view with a buffered overlay of pending
//!   merges and removals
//!
//! A write context never touches the backend while the body runs. Every
//! merge or removal lands in the overlay, and every load consults the
//! overlay first, so reads inside the transaction observe its own writes.
//! The overlay is applied to the backend only by `TransactionManager` after
//! the body returns `Ok`, as a single all-or-nothing `RecordStore::commit`;
//! a failing body simply drops it.

use graphcache_core::{
    ChangedKeys, Record, RecordKey, RecordSet, RecordSource, RecordStore, StoreResult,
    WriteBatch,
};
use rustc_hash::FxHashMap;
use tracing::error;

/// Summary of buffered operations that would be discarded on abort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingOperations {
    /// Records with pending merged fields
    pub merges: usize,
    /// Records pending removal
    pub removals: usize,
    /// Records removed and then rewritten
    pub replacements: usize,
    /// Whether the whole store is pending clear
    pub cleared: bool,
}

impl PendingOperations {
    /// Total number of buffered record operations
    pub fn total(&self) -> usize {
        self.merges + self.removals + self.replacements
    }

    /// Check if committing would do nothing
    pub fn is_empty(&self) -> bool {
        self.total() == 0 && !self.cleared
    }
}

/// Buffered state of one record inside a write transaction
#[derive(Debug, Clone, PartialEq)]
enum PendingRecord {
    /// Record removed
    Removed,
    /// Record removed (or cleared) and then written again; replaces the
    /// committed record entirely
    Replaced(Record),
    /// Fields to merge into the committed record
    Merged(Record),
}

// ============================================================================
// ReadContext
// ============================================================================

/// Shared read view over committed state
///
/// Holds the manager's shared lock for its whole lifetime, so every load in
/// one read transaction observes the same committed state.
pub struct ReadContext<'a> {
    txn_id: u64,
    store: &'a dyn RecordStore,
}

impl<'a> ReadContext<'a> {
    pub(crate) fn new(txn_id: u64, store: &'a dyn RecordStore) -> Self {
        ReadContext { txn_id, store }
    }

    /// Identifier of this transaction
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    /// Load every present record among `keys`, in the order given
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn load_records(&self, keys: &[RecordKey]) -> StoreResult<Vec<Record>> {
        let mut loaded = self.store.load(keys)?;
        Ok(keys.iter().filter_map(|k| loaded.remove(k)).collect())
    }
}

impl RecordSource for ReadContext<'_> {
    fn load_record(&self, key: &RecordKey) -> StoreResult<Option<Record>> {
        Ok(self.store.load(std::slice::from_ref(key))?.remove(key))
    }
}

// ============================================================================
// WriteContext
// ============================================================================

/// Exclusive read-write view with a buffered overlay
///
/// # Example
///
/// ```
/// use graphcache_concurrency::TransactionManager;
/// use graphcache_core::{CacheValue, Record, RecordKey, RecordSource, StoreError};
///
/// let manager = TransactionManager::in_memory();
/// let (seen, changed) = manager
///     .write(|txn| {
///         let record = Record::with_fields(RecordKey::new("A"), [("x", CacheValue::Null)]);
///         txn.merge(std::iter::once(record).collect());
///         // Read-your-writes before commit
///         Ok::<_, StoreError>(txn.load_record(&RecordKey::new("A"))?.is_some())
///     })
///     .unwrap();
/// assert!(seen);
/// assert!(changed.contains("A.x"));
/// ```
pub struct WriteContext<'a> {
    txn_id: u64,
    store: &'a dyn RecordStore,
    overlay: FxHashMap<RecordKey, PendingRecord>,
    cleared: bool,
}

impl<'a> WriteContext<'a> {
    pub(crate) fn new(txn_id: u64, store: &'a dyn RecordStore) -> Self {
        WriteContext {
            txn_id,
            store,
            overlay: FxHashMap::default(),
            cleared: false,
        }
    }

    /// Identifier of this transaction
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    /// Buffer a field-level merge of `records`
    ///
    /// Later values of a field win, both within `records` and across
    /// successive merges in the same transaction.
    pub fn merge(&mut self, records: RecordSet) {
        for record in records.into_records() {
            let key = record.key().clone();
            let next = match self.overlay.remove(&key) {
                Some(PendingRecord::Merged(mut pending)) => {
                    pending.merge(record);
                    PendingRecord::Merged(pending)
                }
                Some(PendingRecord::Replaced(mut pending)) => {
                    pending.merge(record);
                    PendingRecord::Replaced(pending)
                }
                Some(PendingRecord::Removed) => PendingRecord::Replaced(record),
                None if self.cleared => PendingRecord::Replaced(record),
                None => PendingRecord::Merged(record),
            };
            self.overlay.insert(key, next);
        }
    }

    /// Buffer the removal of one record, returning its current state
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails while loading the record.
    pub fn remove_record(&mut self, key: &RecordKey) -> StoreResult<Option<Record>> {
        let current = self.load_record(key)?;
        self.overlay.insert(key.clone(), PendingRecord::Removed);
        Ok(current)
    }

    /// Buffer the removal of every record whose key matches `pattern`
    ///
    /// Matching is case-insensitive substring search and covers records
    /// written earlier in this transaction as well as committed ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn remove_records(&mut self, pattern: &str) -> StoreResult<Vec<Record>> {
        let mut keys: Vec<RecordKey> = if self.cleared {
            Vec::new()
        } else {
            self.store.keys_matching(pattern)?
        };
        for (key, pending) in &self.overlay {
            if !matches!(pending, PendingRecord::Removed)
                && key.matches_pattern(pattern)
                && !keys.contains(key)
            {
                keys.push(key.clone());
            }
        }

        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.remove_record(&key)? {
                removed.push(record);
            }
        }
        Ok(removed)
    }

    /// Buffer the removal of every record
    pub fn clear(&mut self) {
        self.cleared = true;
        self.overlay.clear();
    }

    /// Load every present record among `keys`, in the order given
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn load_records(&self, keys: &[RecordKey]) -> StoreResult<Vec<Record>> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.load_record(key)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Get summary of pending operations
    pub fn pending_operations(&self) -> PendingOperations {
        let mut ops = PendingOperations {
            cleared: self.cleared,
            ..PendingOperations::default()
        };
        for pending in self.overlay.values() {
            match pending {
                PendingRecord::Removed => ops.removals += 1,
                PendingRecord::Replaced(_) => ops.replacements += 1,
                PendingRecord::Merged(_) => ops.merges += 1,
            }
        }
        ops
    }

    pub(crate) fn into_pending(self) -> PendingWrites {
        PendingWrites {
            overlay: self.overlay,
            cleared: self.cleared,
        }
    }
}

impl RecordSource for WriteContext<'_> {
    fn load_record(&self, key: &RecordKey) -> StoreResult<Option<Record>> {
        match self.overlay.get(key) {
            Some(PendingRecord::Removed) => Ok(None),
            Some(PendingRecord::Replaced(record)) => Ok(Some(record.clone())),
            Some(PendingRecord::Merged(pending)) => {
                let mut record = self
                    .store
                    .load(std::slice::from_ref(key))?
                    .remove(key)
                    .unwrap_or_else(|| Record::new(key.clone()));
                record.merge(pending.clone());
                Ok(Some(record))
            }
            None if self.cleared => Ok(None),
            None => Ok(self.store.load(std::slice::from_ref(key))?.remove(key)),
        }
    }
}

// ============================================================================
// Commit
// ============================================================================

/// Overlay detached from its context, ready to apply
pub(crate) struct PendingWrites {
    overlay: FxHashMap<RecordKey, PendingRecord>,
    cleared: bool,
}

impl PendingWrites {
    /// Apply the overlay to `store` as one backend commit
    ///
    /// # Returns
    /// Exactly the field keys whose committed value changed. Fields of
    /// removed records that were not written again all count as changed.
    ///
    /// # Apply order
    ///
    /// 1. load the pre-image of every touched record (every record when
    ///    clearing)
    /// 2. diff the pre-image against the post-image the overlay describes
    /// 3. hand clear, merges, removals and replacements to the backend as
    ///    one `WriteBatch`
    ///
    /// Steps 1 and 2 only read, so a failure at any point leaves the store
    /// exactly as it was.
    pub(crate) fn apply(self, txn_id: u64, store: &mut dyn RecordStore) -> StoreResult<ChangedKeys> {
        let mut touched: Vec<RecordKey> = if self.cleared {
            store.all_keys()?
        } else {
            Vec::new()
        };
        touched.extend(self.overlay.keys().cloned());
        touched.sort();
        touched.dedup();
        let before = store.load(&touched)?;

        let mut batch = WriteBatch {
            clear: self.cleared,
            ..WriteBatch::default()
        };
        let mut after: FxHashMap<RecordKey, Record> = FxHashMap::default();
        for (key, pending) in self.overlay {
            match pending {
                PendingRecord::Merged(record) => {
                    let mut merged = before
                        .get(&key)
                        .cloned()
                        .unwrap_or_else(|| Record::new(key.clone()));
                    merged.merge(record.clone());
                    after.insert(key, merged);
                    batch.merges.insert(record);
                }
                PendingRecord::Replaced(record) => {
                    after.insert(key, record.clone());
                    batch.replacements.push(record);
                }
                PendingRecord::Removed => batch.removals.push(key),
            }
        }

        let mut changed = ChangedKeys::new();
        for (key, old) in &before {
            match after.get(key) {
                Some(new) => diff_fields(key, old, new, &mut changed),
                None => changed.insert_record(old),
            }
        }
        for (key, new) in &after {
            if !before.contains_key(key) {
                changed.insert_record(new);
            }
        }

        if !batch.is_empty() {
            store.commit(batch).map_err(|e| {
                error!(target: "graphcache::txn", txn_id, error = %e, "Commit rejected by backend");
                e
            })?;
        }

        Ok(changed)
    }
}

/// Record into `changed` every field whose value differs between `old` and `new`
fn diff_fields(key: &RecordKey, old: &Record, new: &Record, changed: &mut ChangedKeys) {
    for (field, value) in new.fields() {
        if old.get(field) != Some(value) {
            changed.insert(key, field);
        }
    }
    for (field, _) in old.fields() {
        if !new.contains(field) {
            changed.insert(key, field);
        }
    }
}
