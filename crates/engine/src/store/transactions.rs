//! Transaction handles handed to `CacheStore` transaction bodies
//!
//! A body never sees the raw record store: everything it does goes through
//! one of these handles, whose lifetime is bounded by the transaction.

use graphcache_concurrency::{PendingOperations, ReadContext, WriteContext};
use graphcache_core::{
    CacheResult, DataObject, DependentKeySet, Operation, Record, RecordKey, SchemaConfiguration,
    SelectionSet, Variables, TYPENAME,
};
use tracing::debug;

use crate::executor::execute;
use crate::normalizer::{normalize, normalize_partial};

// ============================================================================
// Read Transaction
// ============================================================================

/// Read-only view of the committed store
pub struct ReadTransaction<'t, 'a> {
    ctx: &'t ReadContext<'a>,
    schema: &'t dyn SchemaConfiguration,
}

impl<'t, 'a> ReadTransaction<'t, 'a> {
    pub(crate) fn new(ctx: &'t ReadContext<'a>, schema: &'t dyn SchemaConfiguration) -> Self {
        ReadTransaction { ctx, schema }
    }

    /// Read an operation's result from its root record
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Read` for missing or null required data and
    /// `CacheError::Read(ReadError::Store)` when the backend fails.
    pub fn read(&self, operation: &Operation) -> CacheResult<DataObject> {
        Ok(self.read_with_dependencies(operation)?.0)
    }

    /// Read an operation's result together with the field keys it consulted
    pub fn read_with_dependencies(
        &self,
        operation: &Operation,
    ) -> CacheResult<(DataObject, DependentKeySet)> {
        Ok(execute(
            self.ctx,
            &operation.selection_set,
            &operation.root_key(),
            &operation.variables,
            self.schema,
        )?)
    }

    /// Read `selection_set` starting at an arbitrary record
    pub fn read_object(
        &self,
        selection_set: &SelectionSet,
        key: &RecordKey,
        variables: &Variables,
    ) -> CacheResult<DataObject> {
        Ok(execute(self.ctx, selection_set, key, variables, self.schema)?.0)
    }

    /// Raw records for `keys` (missing keys are omitted)
    pub fn load_records(&self, keys: &[RecordKey]) -> CacheResult<Vec<Record>> {
        Ok(self.ctx.load_records(keys)?)
    }
}

// ============================================================================
// Read-Write Transaction
// ============================================================================

/// Read-write view: reads observe this transaction's own writes
pub struct ReadWriteTransaction<'t, 'a> {
    ctx: &'t mut WriteContext<'a>,
    schema: &'t dyn SchemaConfiguration,
}

impl<'t, 'a> ReadWriteTransaction<'t, 'a> {
    pub(crate) fn new(ctx: &'t mut WriteContext<'a>, schema: &'t dyn SchemaConfiguration) -> Self {
        ReadWriteTransaction { ctx, schema }
    }

    /// Read an operation's result, including writes made earlier in this
    /// transaction
    pub fn read(&self, operation: &Operation) -> CacheResult<DataObject> {
        Ok(self.read_with_dependencies(operation)?.0)
    }

    /// Read an operation's result together with the field keys it consulted
    pub fn read_with_dependencies(
        &self,
        operation: &Operation,
    ) -> CacheResult<(DataObject, DependentKeySet)> {
        Ok(execute(
            &*self.ctx,
            &operation.selection_set,
            &operation.root_key(),
            &operation.variables,
            self.schema,
        )?)
    }

    /// Read `selection_set` starting at an arbitrary record
    pub fn read_object(
        &self,
        selection_set: &SelectionSet,
        key: &RecordKey,
        variables: &Variables,
    ) -> CacheResult<DataObject> {
        Ok(execute(&*self.ctx, selection_set, key, variables, self.schema)?.0)
    }

    /// Raw records for `keys`, as this transaction sees them
    pub fn load_records(&self, keys: &[RecordKey]) -> CacheResult<Vec<Record>> {
        Ok(self.ctx.load_records(keys)?)
    }

    /// Normalize an operation result into the store
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Write` with the offending path if `data` does not
    /// conform to the operation's selection set. Nothing is buffered then.
    pub fn write(&mut self, data: &DataObject, operation: &Operation) -> CacheResult<()> {
        self.write_object(
            data,
            &operation.selection_set,
            &operation.root_key(),
            &operation.variables,
        )
    }

    /// Normalize `data` into the record at `key`
    pub fn write_object(
        &mut self,
        data: &DataObject,
        selection_set: &SelectionSet,
        key: &RecordKey,
        variables: &Variables,
    ) -> CacheResult<()> {
        let records = normalize(data, selection_set, key, variables, self.schema)?;
        self.ctx.merge(records);
        Ok(())
    }

    /// Read the object at `key`, let `mutator` edit it, and write back only
    /// the top-level fields it changed
    ///
    /// New entities may be introduced by the mutation (for example appended
    /// to a list field); they are normalized like any written object.
    /// Removing a key from the view does not delete the stored field.
    ///
    /// # Returns
    /// The object as mutated.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Read` with the first unresolvable required
    /// field if the object cannot be read, or `CacheError::Write` if the
    /// mutated value no longer conforms to `selection_set`.
    pub fn update_object<F>(
        &mut self,
        selection_set: &SelectionSet,
        key: &RecordKey,
        variables: &Variables,
        mutator: F,
    ) -> CacheResult<DataObject>
    where
        F: FnOnce(&mut DataObject),
    {
        let (original, _) = execute(&*self.ctx, selection_set, key, variables, self.schema)?;
        let mut view = original.clone();
        mutator(&mut view);

        let mut touched = DataObject::new();
        for (response_key, value) in view.iter() {
            if original.get(response_key) != Some(value) {
                touched.insert(response_key.clone(), value.clone());
            }
        }
        let deferred_changed = view.deferred().ne(original.deferred());
        if touched.is_empty() && !deferred_changed {
            debug!(target: "graphcache::store", key = %key, "Object update changed nothing");
            return Ok(view);
        }

        // Type conditions need the concrete type even when it is untouched
        if let Some(typename) = view.get(TYPENAME) {
            touched.insert(TYPENAME, typename.clone());
        }
        for (label, state) in view.deferred() {
            touched.set_deferred(label.clone(), *state);
        }

        let records = normalize_partial(&touched, selection_set, key, variables, self.schema)?;
        debug!(
            target: "graphcache::store",
            key = %key,
            fields = touched.len(),
            records = records.len(),
            "Object updated"
        );
        self.ctx.merge(records);
        Ok(view)
    }

    /// Remove one record
    ///
    /// # Returns
    /// The removed record, if it existed.
    pub fn remove_object(&mut self, key: &RecordKey) -> CacheResult<Option<Record>> {
        Ok(self.ctx.remove_record(key)?)
    }

    /// Remove every record whose key matches `pattern`
    ///
    /// See `RecordKey::matches_pattern` for the pattern syntax.
    pub fn remove_objects(&mut self, pattern: &str) -> CacheResult<Vec<Record>> {
        Ok(self.ctx.remove_records(pattern)?)
    }

    /// Remove every record
    pub fn clear_all(&mut self) {
        self.ctx.clear();
    }

    /// Buffered operations not yet committed
    pub fn pending_operations(&self) -> PendingOperations {
        self.ctx.pending_operations()
    }
}
