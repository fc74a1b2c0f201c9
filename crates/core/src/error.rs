//! Error types for graphcache
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Taxonomy
//!
//! - `StoreError`: backend I/O or corruption; fatal to the operation
//! - `ReadError`: missing or null data found by the executor; a cache miss
//!   unless it wraps a `StoreError`
//! - `WriteError`: shape mismatch or missing required data on write; the
//!   surrounding transaction aborts without publishing anything
//! - `CacheError`: everything a caller of the store or client can see

use crate::path::ResponsePath;
use std::io;
use thiserror::Error;

/// Result type alias for record store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for cache-level operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Record store backend failure
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error in a persistent backend
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stored data could not be decoded
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Failure to assemble a result from cached records
#[derive(Debug, Error)]
pub enum ReadError {
    /// A required field (or referenced record) is absent
    #[error("Missing value at path '{path}'")]
    MissingValue {
        /// Response path of the absent value
        path: ResponsePath,
    },

    /// A non-nullable field is stored as null
    #[error("Null value for non-nullable field at path '{path}'")]
    NullValue {
        /// Response path of the null value
        path: ResponsePath,
    },

    /// An inclusion condition variable is not a boolean
    #[error("Variable '${name}' must be a boolean")]
    InvalidVariable {
        /// Variable name
        name: String,
    },

    /// The record store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReadError {
    /// True for missing and null values; false for store and variable failures
    ///
    /// Cache misses are recoverable by fetching from the network.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, ReadError::MissingValue { .. } | ReadError::NullValue { .. })
    }

    /// Response path of a missing or null value
    pub fn path(&self) -> Option<&ResponsePath> {
        match self {
            ReadError::MissingValue { path } | ReadError::NullValue { path } => Some(path),
            _ => None,
        }
    }
}

/// Why a write was rejected
#[derive(Debug, Error)]
pub enum WriteErrorReason {
    /// A required field is absent from the input
    #[error("missing required field")]
    MissingField,

    /// A non-nullable field is null in the input
    #[error("null value for non-nullable field")]
    NullValue,

    /// The input value's shape does not match the declared type
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Declared shape
        expected: &'static str,
        /// Shape found in the input
        found: &'static str,
    },

    /// An inclusion condition variable is not a boolean
    #[error("variable '${0}' must be a boolean")]
    InvalidVariable(String),

    /// The record store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rejected write with the offending response path
#[derive(Debug, Error)]
#[error("Write failed at path '{path}': {reason}")]
pub struct WriteError {
    /// Response path of the offending value
    pub path: ResponsePath,
    /// What went wrong
    pub reason: WriteErrorReason,
}

impl WriteError {
    /// Create a write error
    pub fn new(path: ResponsePath, reason: WriteErrorReason) -> Self {
        WriteError { path, reason }
    }
}

impl From<StoreError> for WriteError {
    fn from(e: StoreError) -> Self {
        WriteError::new(ResponsePath::root(), WriteErrorReason::Store(e))
    }
}

/// Network collaborator failure
#[derive(Debug, Clone, Error)]
#[error("Network error: {message}")]
pub struct NetworkError {
    /// Human-readable description
    pub message: String,
}

impl NetworkError {
    /// Create a network error
    pub fn new(message: impl Into<String>) -> Self {
        NetworkError {
            message: message.into(),
        }
    }
}

/// Any failure visible to callers of the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Record store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Read failure (missing/null data)
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Write failure
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Network failure
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Operation not allowed in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl CacheError {
    /// True when the failure is a recoverable cache miss
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, CacheError::Read(e) if e.is_cache_miss())
    }

    /// True when the record store itself failed, however deep it is wrapped
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            CacheError::Store(_)
                | CacheError::Read(ReadError::Store(_))
                | CacheError::Write(WriteError {
                    reason: WriteErrorReason::Store(_),
                    ..
                })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_missing_value() {
        let err = ReadError::MissingValue {
            path: ResponsePath::from("hero.friends.1"),
        };
        let msg = err.to_string();
        assert!(msg.contains("Missing value"));
        assert!(msg.contains("hero.friends.1"));
    }

    #[test]
    fn test_error_display_write() {
        let err = WriteError::new(
            ResponsePath::from("hero.name"),
            WriteErrorReason::TypeMismatch {
                expected: "object",
                found: "scalar",
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("hero.name"));
        assert!(msg.contains("expected object, found scalar"));
    }

    #[test]
    fn test_cache_miss_classification() {
        let missing = ReadError::MissingValue {
            path: ResponsePath::root(),
        };
        let null = ReadError::NullValue {
            path: ResponsePath::root(),
        };
        let store = ReadError::Store(StoreError::Corruption("bad".to_string()));
        assert!(missing.is_cache_miss());
        assert!(null.is_cache_miss());
        assert!(!store.is_cache_miss());
    }

    #[test]
    fn test_cache_error_wraps_read() {
        let err: CacheError = ReadError::NullValue {
            path: ResponsePath::from("hero"),
        }
        .into();
        assert!(err.is_cache_miss());
        assert!(!err.is_store_failure());
    }

    #[test]
    fn test_store_failure_is_detected_through_wrappers() {
        let read: CacheError = ReadError::Store(StoreError::Backend("down".to_string())).into();
        let write: CacheError = WriteError::from(StoreError::Backend("down".to_string())).into();
        assert!(read.is_store_failure());
        assert!(write.is_store_failure());
        assert!(!read.is_cache_miss());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: StoreError = io_err.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
