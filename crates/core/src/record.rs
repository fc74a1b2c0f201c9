//! Normalized records and key sets
//!
//! - `Record`: flat mapping of field storage key to `CacheValue`
//! - `RecordSet`: the records produced by one normalization pass
//! - `ChangedKeys`: what a commit actually changed (record and field level)
//! - `DependentKeySet`: what a read actually consulted
//!
//! A record may be partial: not every field selected by some query has to be
//! present. Merging a record only ever adds or replaces fields.

use crate::key::{FieldKey, RecordKey};
use crate::value::CacheValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

/// One normalized entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    key: RecordKey,
    fields: BTreeMap<String, CacheValue>,
}

impl Record {
    /// Create an empty record
    pub fn new(key: RecordKey) -> Self {
        Record {
            key,
            fields: BTreeMap::new(),
        }
    }

    /// Create a record from an iterator of fields
    pub fn with_fields<I, S>(key: RecordKey, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, CacheValue)>,
        S: Into<String>,
    {
        Record {
            key,
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Key of this record
    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    /// Get a field value by storage key
    pub fn get(&self, field_key: &str) -> Option<&CacheValue> {
        self.fields.get(field_key)
    }

    /// Check whether a field is present (null counts as present)
    pub fn contains(&self, field_key: &str) -> bool {
        self.fields.contains_key(field_key)
    }

    /// Set a field, returning the previous value
    pub fn insert(&mut self, field_key: impl Into<String>, value: CacheValue) -> Option<CacheValue> {
        self.fields.insert(field_key.into(), value)
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, field_key: &str) -> Option<CacheValue> {
        self.fields.remove(field_key)
    }

    /// Iterate over fields in storage-key order
    pub fn fields(&self) -> btree_map::Iter<'_, String, CacheValue> {
        self.fields.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field keys of every field in this record
    pub fn field_keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.fields.keys().map(move |f| self.key.field(f))
    }

    /// Merge `other`'s fields into this record
    ///
    /// Returns the storage keys of fields whose value changed, compared
    /// structurally. Writing an identical value is not a change.
    pub fn merge(&mut self, other: Record) -> Vec<String> {
        let mut changed = Vec::new();
        for (field, value) in other.fields {
            match self.fields.get(&field) {
                Some(existing) if *existing == value => {}
                _ => {
                    changed.push(field.clone());
                    self.fields.insert(field, value);
                }
            }
        }
        changed
    }
}

/// Records produced by one write, keyed by record key
///
/// Inserting a record whose key is already present merges the fields; the
/// later value of a field wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: IndexMap<RecordKey, Record>,
}

impl RecordSet {
    /// Create an empty record set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a record
    pub fn insert(&mut self, record: Record) {
        match self.records.get_mut(record.key()) {
            Some(existing) => {
                existing.merge(record);
            }
            None => {
                self.records.insert(record.key().clone(), record);
            }
        }
    }

    /// Set a single field, creating the record if needed
    pub fn insert_field(&mut self, key: &RecordKey, field_key: impl Into<String>, value: CacheValue) {
        self.records
            .entry(key.clone())
            .or_insert_with(|| Record::new(key.clone()))
            .insert(field_key, value);
    }

    /// Merge every record of `other` into this set
    pub fn merge(&mut self, other: RecordSet) {
        for (_, record) in other.records {
            self.insert(record);
        }
    }

    /// Get a record by key
    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.records.get(key)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the set holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Consume the set, yielding its records in insertion order
    pub fn into_records(self) -> impl Iterator<Item = Record> {
        self.records.into_values()
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

/// Keys changed by a committed write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedKeys {
    records: BTreeSet<RecordKey>,
    fields: BTreeSet<FieldKey>,
}

impl ChangedKeys {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `field_key` of `record` changed
    pub fn insert(&mut self, record: &RecordKey, field_key: &str) {
        self.records.insert(record.clone());
        self.fields.insert(record.field(field_key));
    }

    /// Record that every field of `record` changed (used for removals)
    pub fn insert_record(&mut self, record: &Record) {
        self.records.insert(record.key().clone());
        self.fields.extend(record.field_keys());
    }

    /// Merge another change set into this one
    pub fn extend(&mut self, other: ChangedKeys) {
        self.records.extend(other.records);
        self.fields.extend(other.fields);
    }

    /// Keys of records with at least one changed field
    pub fn records(&self) -> &BTreeSet<RecordKey> {
        &self.records
    }

    /// Changed field keys
    pub fn fields(&self) -> &BTreeSet<FieldKey> {
        &self.fields
    }

    /// Check whether a field key changed
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains(key)
    }

    /// Number of changed fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if nothing changed
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check whether any changed field was consulted by a read
    pub fn intersects(&self, dependents: &DependentKeySet) -> bool {
        // Iterate the smaller side.
        if self.fields.len() <= dependents.len() {
            self.fields.iter().any(|k| dependents.contains(k.as_str()))
        } else {
            dependents.iter().any(|k| self.fields.contains(k))
        }
    }
}

/// Exact set of `record.field` pairs consulted by one read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependentKeySet {
    keys: BTreeSet<FieldKey>,
}

impl DependentKeySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `field_key` of `record` was consulted
    pub fn insert(&mut self, record: &RecordKey, field_key: &str) {
        self.keys.insert(record.field(field_key));
    }

    /// Merge another dependent set into this one
    pub fn extend(&mut self, other: DependentKeySet) {
        self.keys.extend(other.keys);
    }

    /// Check membership by field key string
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of field keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if no field was consulted
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over field keys in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &FieldKey> {
        self.keys.iter()
    }
}

impl<'a> FromIterator<&'a str> for DependentKeySet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        DependentKeySet {
            keys: iter.into_iter().map(FieldKey::from).collect(),
        }
    }
}
