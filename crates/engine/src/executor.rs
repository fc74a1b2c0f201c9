//! Executor: the read path
//!
//! Walks a selection set starting at a root record, follows references
//! transitively and assembles a `DataObject`, while recording every
//! `record.field` it consulted into a `DependentKeySet`.
//!
//! ## Missing data
//!
//! | Stored state                    | Optional field | Non-null field        |
//! |---------------------------------|----------------|-----------------------|
//! | absent                          | `Null`         | `MissingValue(path)`  |
//! | `Null`                          | `Null`         | `NullValue(path)`     |
//! | reference to a missing record   | `MissingValue` | `MissingValue`        |
//!
//! ## Deferred fragments
//!
//! A fragment with a defer label is evaluated as an independent sub-read.
//! It is `Fulfilled` when its marker field is stored and the sub-read
//! succeeds; otherwise it is `Pending`, and any cache miss inside it is
//! absorbed instead of failing the enclosing read. Deferred fragments nested
//! inside a pending one are still evaluated on their own.

use crate::cache_key::{fulfilled_marker, EntityKeys, KeyResolver};
use graphcache_core::selection::conditions_met;
use graphcache_core::{
    CacheValue, DataObject, DataValue, DeferredState, DependentKeySet, Field,
    InclusionCondition, OutputType, ReadError, Record, RecordKey, RecordSource, ResponsePath,
    Scalar, SchemaConfiguration, Selection, SelectionSet, TypeCondition, Variables, TYPENAME,
};

/// Read `selection_set` starting at the record `root`
///
/// A missing root record reads as an empty record, so optional fields
/// resolve to `Null` on an empty cache.
///
/// # Returns
/// The assembled object and the exact set of field keys consulted.
///
/// # Errors
///
/// Returns `ReadError::MissingValue` / `ReadError::NullValue` with the
/// offending response path, `ReadError::InvalidVariable` for non-boolean
/// inclusion variables, or `ReadError::Store` if the backend fails.
pub fn execute<S: RecordSource + ?Sized>(
    source: &S,
    selection_set: &SelectionSet,
    root: &RecordKey,
    variables: &Variables,
    schema: &dyn SchemaConfiguration,
) -> Result<(DataObject, DependentKeySet), ReadError> {
    let mut executor = Executor::new(source, variables, schema);
    let record = source
        .load_record(root)?
        .unwrap_or_else(|| Record::new(root.clone()));
    let data = executor.read_object(&record, selection_set, &ResponsePath::root())?;
    Ok((data, executor.dependent_keys))
}

/// Stateful walker for one read
pub struct Executor<'a, S: RecordSource + ?Sized> {
    source: &'a S,
    keys: KeyResolver<'a>,
    variables: &'a Variables,
    dependent_keys: DependentKeySet,
}

impl<'a, S: RecordSource + ?Sized> Executor<'a, S> {
    /// Create an executor for one read
    pub fn new(source: &'a S, variables: &'a Variables, schema: &'a dyn SchemaConfiguration) -> Self {
        Executor {
            source,
            keys: KeyResolver::new(schema, variables),
            variables,
            dependent_keys: DependentKeySet::new(),
        }
    }

    /// Field keys consulted so far
    pub fn dependent_keys(&self) -> &DependentKeySet {
        &self.dependent_keys
    }

    /// Read `selection_set` against one record
    ///
    /// # Errors
    ///
    /// See [`execute`].
    pub fn read_object(
        &mut self,
        record: &Record,
        selection_set: &SelectionSet,
        path: &ResponsePath,
    ) -> Result<DataObject, ReadError> {
        let typename = match record.get(TYPENAME).and_then(CacheValue::as_scalar) {
            Some(Scalar::String(name)) => name.clone(),
            _ => selection_set.default_typename().to_string(),
        };
        let mut object = DataObject::new();
        self.collect(record, selection_set, &typename, &mut object, path)?;
        Ok(object)
    }

    fn collect(
        &mut self,
        record: &Record,
        selection_set: &SelectionSet,
        typename: &str,
        object: &mut DataObject,
        path: &ResponsePath,
    ) -> Result<(), ReadError> {
        for selection in &selection_set.selections {
            match selection {
                Selection::Field(field) => {
                    if self.included(&field.conditions)? {
                        let value = self.read_field(record, field, &selection_set.parent_type, path)?;
                        merge_field(object, field.response_key(), value);
                    }
                }
                Selection::InlineFragment(fragment) => self.collect_fragment(
                    record,
                    fragment.type_condition.as_ref(),
                    &fragment.selection_set,
                    &fragment.conditions,
                    fragment.defer_label.as_deref(),
                    typename,
                    object,
                    path,
                )?,
                Selection::FragmentSpread(spread) => self.collect_fragment(
                    record,
                    Some(&spread.fragment.type_condition),
                    &spread.fragment.selection_set,
                    &spread.conditions,
                    spread.defer_label.as_deref(),
                    typename,
                    object,
                    path,
                )?,
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_fragment(
        &mut self,
        record: &Record,
        type_condition: Option<&TypeCondition>,
        selection_set: &SelectionSet,
        conditions: &[InclusionCondition],
        defer_label: Option<&str>,
        typename: &str,
        object: &mut DataObject,
        path: &ResponsePath,
    ) -> Result<(), ReadError> {
        if !self.included(conditions)? {
            return Ok(());
        }
        if let Some(condition) = type_condition {
            if !condition.matches(typename) {
                return Ok(());
            }
        }
        let Some(label) = defer_label else {
            return self.collect(record, selection_set, typename, object, path);
        };

        let marker = fulfilled_marker(label);
        self.dependent_keys.insert(record.key(), &marker);

        // The fragment's fields are consulted even when unmarked so that
        // their arrival invalidates this read.
        let mut sub = DataObject::new();
        let outcome = match self.collect(record, selection_set, typename, &mut sub, path) {
            Ok(()) if !record.contains(&marker) => Err(ReadError::MissingValue { path: path.clone() }),
            other => other,
        };

        match outcome {
            Ok(()) => {
                merge_object(object, sub);
                object.set_deferred(label, DeferredState::Fulfilled);
                Ok(())
            }
            Err(e) if e.is_cache_miss() => {
                object.set_deferred(label, DeferredState::Pending);
                self.collect_nested_deferred(record, selection_set, typename, object, path)
            }
            Err(e) => Err(e),
        }
    }

    /// Evaluate the deferred fragments nested in a pending fragment
    fn collect_nested_deferred(
        &mut self,
        record: &Record,
        selection_set: &SelectionSet,
        typename: &str,
        object: &mut DataObject,
        path: &ResponsePath,
    ) -> Result<(), ReadError> {
        for selection in &selection_set.selections {
            let (type_condition, inner, conditions, label) = match selection {
                Selection::Field(_) => continue,
                Selection::InlineFragment(f) => (
                    f.type_condition.as_ref(),
                    &f.selection_set,
                    &f.conditions,
                    f.defer_label.as_deref(),
                ),
                Selection::FragmentSpread(s) => (
                    Some(&s.fragment.type_condition),
                    &s.fragment.selection_set,
                    &s.conditions,
                    s.defer_label.as_deref(),
                ),
            };
            match label {
                Some(_) => self.collect_fragment(
                    record,
                    type_condition,
                    inner,
                    conditions,
                    label,
                    typename,
                    object,
                    path,
                )?,
                None => {
                    if self.included(conditions)?
                        && type_condition.map_or(true, |c| c.matches(typename))
                    {
                        self.collect_nested_deferred(record, inner, typename, object, path)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn read_field(
        &mut self,
        record: &Record,
        field: &Field,
        parent_type: &str,
        path: &ResponsePath,
    ) -> Result<DataValue, ReadError> {
        let field_path = path.with_field(field.response_key());
        let storage_key = self.keys.storage_key(field);
        self.dependent_keys.insert(record.key(), &storage_key);

        let stored = match record.get(&storage_key) {
            Some(value) => value.clone(),
            None => match self.policy_value(field, parent_type) {
                Some(value) => value,
                None if field.output_type.is_nullable() => return Ok(DataValue::Null),
                None => return Err(ReadError::MissingValue { path: field_path }),
            },
        };
        self.read_value(&stored, &field.output_type, &field_path)
    }

    /// Stand-in value for an absent composite field whose entities are
    /// named by its arguments
    ///
    /// Only consulted when the parent record lacks the field. Writes store
    /// entities under their object identity (`Typename:id`) whenever the
    /// schema configuration yields one, so for identifiable types the policy
    /// keys (`field:v1+v2`) built here name records that were never written
    /// and the read misses.
    fn policy_value(&self, field: &Field, parent_type: &str) -> Option<CacheValue> {
        if !field.output_type.is_composite() {
            return None;
        }
        match (self.keys.policy_keys(field, parent_type)?, field.output_type.is_list()) {
            (EntityKeys::Single(key), false) => Some(CacheValue::Reference(key)),
            (EntityKeys::List(keys), true) => Some(CacheValue::List(
                keys.into_iter().map(CacheValue::Reference).collect(),
            )),
            _ => None,
        }
    }

    fn read_value(
        &mut self,
        stored: &CacheValue,
        output_type: &OutputType,
        path: &ResponsePath,
    ) -> Result<DataValue, ReadError> {
        match output_type {
            OutputType::NonNull(inner) => {
                if stored.is_null() {
                    return Err(ReadError::NullValue { path: path.clone() });
                }
                self.read_value(stored, inner, path)
            }
            _ if stored.is_null() => Ok(DataValue::Null),
            OutputType::Scalar(_) => leaf_json(stored)
                .map(DataValue::from)
                .ok_or_else(|| ReadError::MissingValue { path: path.clone() }),
            OutputType::List(inner) => match stored {
                CacheValue::List(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for (index, item) in items.iter().enumerate() {
                        values.push(self.read_value(item, inner, &path.with_index(index))?);
                    }
                    Ok(DataValue::List(values))
                }
                _ => Err(ReadError::MissingValue { path: path.clone() }),
            },
            OutputType::Object(selection_set) => match stored {
                CacheValue::Reference(key) => match self.source.load_record(key)? {
                    Some(record) => Ok(DataValue::Object(self.read_object(
                        &record,
                        selection_set,
                        path,
                    )?)),
                    None => Err(ReadError::MissingValue { path: path.clone() }),
                },
                _ => Err(ReadError::MissingValue { path: path.clone() }),
            },
        }
    }

    fn included(&self, conditions: &[InclusionCondition]) -> Result<bool, ReadError> {
        conditions_met(conditions, self.variables).map_err(|name| ReadError::InvalidVariable { name })
    }
}

/// JSON form of a stored leaf; references are not leaves
fn leaf_json(stored: &CacheValue) -> Option<Scalar> {
    match stored {
        CacheValue::Null => Some(Scalar::Null),
        CacheValue::Scalar(value) => Some(value.clone()),
        CacheValue::List(items) => items.iter().map(leaf_json).collect::<Option<Vec<_>>>().map(Scalar::Array),
        CacheValue::Reference(_) => None,
    }
}

/// Insert a field, merging with a value already selected under the same
/// response key (e.g. by a sibling fragment)
fn merge_field(object: &mut DataObject, response_key: &str, value: DataValue) {
    if let Some(existing) = object.get_mut(response_key) {
        merge_value(existing, value);
    } else {
        object.insert(response_key, value);
    }
}

fn merge_value(existing: &mut DataValue, value: DataValue) {
    match (existing, value) {
        (DataValue::Object(current), DataValue::Object(incoming)) => merge_object(current, incoming),
        (DataValue::List(current), DataValue::List(incoming)) if current.len() == incoming.len() => {
            for (slot, item) in current.iter_mut().zip(incoming) {
                merge_value(slot, item);
            }
        }
        (slot, value) => *slot = value,
    }
}

fn merge_object(target: &mut DataObject, source: DataObject) {
    for (label, state) in source.deferred() {
        target.set_deferred(label.clone(), *state);
    }
    for (key, value) in source {
        merge_field(target, &key, value);
    }
}
