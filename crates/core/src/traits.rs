//! Core traits for record storage abstraction
//!
//! This module defines the `RecordStore` and `RecordSource` traits that
//! enable swapping backends without touching upper layers (concurrency,
//! normalizer, executor).

use std::collections::HashMap;

use crate::error::StoreResult;
use crate::key::RecordKey;
use crate::record::{ChangedKeys, Record, RecordSet};

/// Pluggable key/value backend holding `RecordKey -> Record`
///
/// Backends carry no business logic. They are only ever accessed through the
/// transaction manager, which owns the single synchronization boundary, so
/// mutating methods take `&mut self`.
///
/// # Contract
///
/// - `merge` returns exactly the field keys whose stored value changed,
///   compared structurally
/// - Removing a record never cascades to records referencing it
/// - Pattern matching is case-insensitive substring search over record keys
/// - `commit` applies a whole `WriteBatch` or nothing at all
pub trait RecordStore: Send + Sync {
    /// Load the records for `keys`
    ///
    /// Keys without a record are simply absent from the returned map.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn load(&self, keys: &[RecordKey]) -> StoreResult<HashMap<RecordKey, Record>>;

    /// Merge records field by field into the store
    ///
    /// # Returns
    /// The changed field keys (and the records they belong to).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn merge(&mut self, records: RecordSet) -> StoreResult<ChangedKeys>;

    /// Remove one record, returning it if it existed
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn remove_record(&mut self, key: &RecordKey) -> StoreResult<Option<Record>>;

    /// Keys of every record matching `pattern`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<RecordKey>>;

    /// Remove every record whose key matches `pattern`, returning them
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn remove_records(&mut self, pattern: &str) -> StoreResult<Vec<Record>> {
        let mut removed = Vec::new();
        for key in self.keys_matching(pattern)? {
            if let Some(record) = self.remove_record(&key)? {
                removed.push(record);
            }
        }
        Ok(removed)
    }

    /// Remove every record, returning them
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn clear(&mut self) -> StoreResult<Vec<Record>>;

    /// Key of every stored record
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn all_keys(&self) -> StoreResult<Vec<RecordKey>>;

    /// Apply one transaction's writes as a unit
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails, in which case no part of
    /// `batch` has been applied.
    fn commit(&mut self, batch: WriteBatch) -> StoreResult<()>;
}

/// One transaction's writes, applied by `RecordStore::commit`
///
/// A record key appears at most once across `merges`, `removals` and
/// `replacements`. When `clear` is set it takes effect before the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    /// Remove every record first
    pub clear: bool,
    /// Field-level merges into stored records
    pub merges: RecordSet,
    /// Records to remove
    pub removals: Vec<RecordKey>,
    /// Records that replace whatever is stored under their key
    pub replacements: Vec<Record>,
}

impl WriteBatch {
    /// Check if applying the batch would do nothing
    pub fn is_empty(&self) -> bool {
        !self.clear && self.merges.is_empty() && self.removals.is_empty() && self.replacements.is_empty()
    }
}

/// Read view over records, as consumed by the executor
///
/// Implemented by transaction contexts so that every read goes through a
/// transaction handle and never touches a raw backend.
pub trait RecordSource {
    /// Load one record
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn load_record(&self, key: &RecordKey) -> StoreResult<Option<Record>>;
}
