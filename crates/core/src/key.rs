//! Record and field keys
//!
//! This module defines the identifiers used throughout the cache:
//! - `RecordKey`: identifies one normalized record
//! - `FieldKey`: identifies one field of one record (`"<RecordKey>.<fieldKey>"`)
//!
//! ## Contract
//!
//! - Record keys are case-sensitive for lookup
//! - Pattern removal matches record keys by case-insensitive substring search
//! - An empty pattern matches nothing (use `clear_all` to drop every record)

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Record key of the root query record
pub const QUERY_ROOT: &str = "QUERY_ROOT";

/// Record key of the root mutation record
pub const MUTATION_ROOT: &str = "MUTATION_ROOT";

/// Record key of the root subscription record
pub const SUBSCRIPTION_ROOT: &str = "SUBSCRIPTION_ROOT";

/// Opaque identifier of one normalized record
///
/// References between records are expressed as record keys, never as owning
/// pointers, so cycles in the entity graph are plain data.
///
/// # Examples
///
/// ```
/// use graphcache_core::key::RecordKey;
///
/// let key = RecordKey::new("Hero:1000");
/// assert!(key.matches_pattern("hero"));
/// assert_eq!(key.field("name").as_str(), "Hero:1000.name");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Create a record key from any string
    pub fn new(key: impl Into<String>) -> Self {
        RecordKey(key.into())
    }

    /// Key of the root query record
    pub fn query_root() -> Self {
        RecordKey::new(QUERY_ROOT)
    }

    /// Key of the root mutation record
    pub fn mutation_root() -> Self {
        RecordKey::new(MUTATION_ROOT)
    }

    /// Key of the root subscription record
    pub fn subscription_root() -> Self {
        RecordKey::new(SUBSCRIPTION_ROOT)
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path-derived key for an object nested under `field_key` of this record
    ///
    /// Used when neither a type identity nor a field policy yields a key.
    pub fn child(&self, field_key: &str) -> RecordKey {
        RecordKey(format!("{}.{}", self.0, field_key))
    }

    /// Path-derived key for the `index`-th element of a list nested under `field_key`
    pub fn child_at(&self, field_key: &str, index: usize) -> RecordKey {
        RecordKey(format!("{}.{}.{}", self.0, field_key, index))
    }

    /// Field key addressing `field_key` on this record
    pub fn field(&self, field_key: &str) -> FieldKey {
        FieldKey(format!("{}.{}", self.0, field_key))
    }

    /// Case-insensitive substring match used by pattern removal
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        if pattern.is_empty() {
            return false;
        }
        self.0.to_lowercase().contains(&pattern.to_lowercase())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(key: &str) -> Self {
        RecordKey::new(key)
    }
}

impl From<String> for RecordKey {
    fn from(key: String) -> Self {
        RecordKey(key)
    }
}

impl Borrow<str> for RecordKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of one field of one record: `"<RecordKey>.<fieldStorageKey>"`
///
/// Change sets and dependent key sets are sets of field keys; invalidation is
/// their intersection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldKey(String);

impl FieldKey {
    /// Build a field key from its record key and field storage key
    pub fn new(record: &RecordKey, field_key: &str) -> Self {
        record.field(field_key)
    }

    /// Borrow the field key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldKey {
    fn from(key: &str) -> Self {
        FieldKey(key.to_string())
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
