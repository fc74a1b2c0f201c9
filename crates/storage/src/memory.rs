//! InMemoryRecordStore: default record store backend
//!
//! This module implements the `RecordStore` trait using:
//! - `FxHashMap<RecordKey, Record>` for O(1) lookups with a fast non-crypto hash
//! - Field-level merge with structural change detection
//!
//! # Design Notes
//!
//! - **No internal locking**: the transaction manager owns the single
//!   synchronization boundary, so the backend is a plain map
//! - **No cascading deletes**: removing a record leaves references to it
//!   dangling; the executor reports them at read time

use std::collections::HashMap;

use graphcache_core::{
    ChangedKeys, Record, RecordKey, RecordSet, RecordStore, StoreResult, WriteBatch,
};
use rustc_hash::FxHashMap;
use tracing::debug;

/// In-memory record store
///
/// # Example
///
/// ```
/// use graphcache_core::{CacheValue, Record, RecordKey, RecordStore};
/// use graphcache_storage::InMemoryRecordStore;
/// use serde_json::json;
///
/// let mut store = InMemoryRecordStore::new();
/// let record = Record::with_fields(RecordKey::new("Hero:1"), [("name", CacheValue::Scalar(json!("Luke")))]);
/// let changed = store.merge(std::iter::once(record).collect()).unwrap();
/// assert!(changed.contains("Hero:1.name"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    data: FxHashMap<RecordKey, Record>,
}

impl InMemoryRecordStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`
    pub fn with_records(records: RecordSet) -> Self {
        let mut store = Self::new();
        for record in records.into_records() {
            store.merge_one(record, &mut ChangedKeys::new());
        }
        store
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn merge_one(&mut self, record: Record, changed: &mut ChangedKeys) {
        let key = record.key().clone();
        match self.data.get_mut(&key) {
            Some(existing) => {
                for field in existing.merge(record) {
                    changed.insert(&key, &field);
                }
            }
            None => {
                for (field, _) in record.fields() {
                    changed.insert(&key, field);
                }
                self.data.insert(key, record);
            }
        }
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load(&self, keys: &[RecordKey]) -> StoreResult<HashMap<RecordKey, Record>> {
        Ok(keys
            .iter()
            .filter_map(|key| self.data.get(key).map(|r| (key.clone(), r.clone())))
            .collect())
    }

    fn merge(&mut self, records: RecordSet) -> StoreResult<ChangedKeys> {
        let mut changed = ChangedKeys::new();
        let count = records.len();
        for record in records.into_records() {
            self.merge_one(record, &mut changed);
        }
        debug!(
            target: "graphcache::store",
            records = count,
            changed_fields = changed.len(),
            "Merged records"
        );
        Ok(changed)
    }

    fn remove_record(&mut self, key: &RecordKey) -> StoreResult<Option<Record>> {
        Ok(self.data.remove(key))
    }

    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<RecordKey>> {
        Ok(self
            .data
            .keys()
            .filter(|key| key.matches_pattern(pattern))
            .cloned()
            .collect())
    }

    fn clear(&mut self) -> StoreResult<Vec<Record>> {
        Ok(std::mem::take(&mut self.data).into_values().collect())
    }

    fn all_keys(&self) -> StoreResult<Vec<RecordKey>> {
        Ok(self.data.keys().cloned().collect())
    }

    fn commit(&mut self, batch: WriteBatch) -> StoreResult<()> {
        // Plain map operations cannot fail part-way
        if batch.clear {
            self.data.clear();
        }
        let merges = batch.merges.len();
        let mut scratch = ChangedKeys::new();
        for record in batch.merges.into_records() {
            self.merge_one(record, &mut scratch);
        }
        for key in &batch.removals {
            self.data.remove(key);
        }
        let replacements = batch.replacements.len();
        for record in batch.replacements {
            self.data.insert(record.key().clone(), record);
        }
        debug!(
            target: "graphcache::store",
            cleared = batch.clear,
            merges,
            removals = batch.removals.len(),
            replacements,
            "Applied write batch"
        );
        Ok(())
    }
}
