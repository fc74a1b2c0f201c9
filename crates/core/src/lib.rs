//! Core types and traits for graphcache
//!
//! This crate defines the foundational types used throughout the system:
//! - RecordKey / FieldKey: identifiers of records and of record fields
//! - CacheValue: closed set of stored field shapes
//! - Record / RecordSet: normalized entities
//! - ChangedKeys / DependentKeySet: invalidation bookkeeping
//! - DataValue / DataObject: tree-shaped results (write input, read output)
//! - Selection descriptors: fields, fragments, conditions, defer labels
//! - Error: error type hierarchy
//! - Traits: RecordStore, RecordSource, SchemaConfiguration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod data;
pub mod error;
pub mod key;
pub mod path;
pub mod record;
pub mod schema;
pub mod selection;
pub mod traits;
pub mod value;

pub use data::{DataObject, DataValue, DeferredState, TYPENAME};
pub use error::{
    CacheError, CacheResult, NetworkError, ReadError, StoreError, StoreResult, WriteError,
    WriteErrorReason,
};
pub use key::{FieldKey, RecordKey, MUTATION_ROOT, QUERY_ROOT, SUBSCRIPTION_ROOT};
pub use path::{PathSegment, ResponsePath};
pub use record::{ChangedKeys, DependentKeySet, Record, RecordSet};
pub use schema::{
    CacheKeyInfo, DefaultSchemaConfiguration, FieldCacheKeys, FieldKeyContext,
    IdFieldConfiguration, SchemaConfiguration,
};
pub use selection::{
    Argument, Field, FragmentDefinition, FragmentSpread, InclusionCondition, InlineFragment,
    InputValue, Operation, OperationKind, OutputType, Selection, SelectionSet, TypeCondition,
    Variables,
};
pub use traits::{RecordSource, RecordStore, WriteBatch};
pub use value::{CacheValue, Scalar};
