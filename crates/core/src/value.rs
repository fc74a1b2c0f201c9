//! Stored field values
//!
//! `CacheValue` is the closed set of shapes a record field can hold once
//! normalized. Objects never appear here: the normalizer replaces every
//! nested object with a `Reference` to the record it was flattened into.
//!
//! ## Equality
//!
//! Change detection compares old and new field values structurally, so two
//! values are equal exactly when their shape and contents are equal. A
//! `Reference` equals another `Reference` only when the keys match; the
//! referenced records are never compared.

use crate::key::RecordKey;
use serde::{Deserialize, Serialize};

/// Leaf payload of a scalar field (any JSON value, including custom scalars)
pub type Scalar = serde_json::Value;

/// Value of one field inside a normalized record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    /// Explicit null (distinct from an absent field)
    Null,
    /// Leaf value
    Scalar(Scalar),
    /// Ordered list
    List(Vec<CacheValue>),
    /// Pointer to another record
    Reference(RecordKey),
}

impl CacheValue {
    /// Check whether this value is an explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, CacheValue::Null)
    }

    /// Get the referenced key if this value is a reference
    pub fn as_reference(&self) -> Option<&RecordKey> {
        match self {
            CacheValue::Reference(key) => Some(key),
            _ => None,
        }
    }

    /// Get the scalar payload if this value is a scalar
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            CacheValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Collect every record key referenced by this value, in list order
    pub fn references(&self) -> Vec<&RecordKey> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a RecordKey>) {
        match self {
            CacheValue::Reference(key) => out.push(key),
            CacheValue::List(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            CacheValue::Null | CacheValue::Scalar(_) => {}
        }
    }
}

impl From<Scalar> for CacheValue {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Null => CacheValue::Null,
            other => CacheValue::Scalar(other),
        }
    }
}

impl From<RecordKey> for CacheValue {
    fn from(key: RecordKey) -> Self {
        CacheValue::Reference(key)
    }
}
