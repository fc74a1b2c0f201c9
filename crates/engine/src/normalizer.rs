//! Normalizer: the write path
//!
//! Walks a tree-shaped `DataObject` against a selection set and flattens it
//! into a `RecordSet`:
//!
//! - leaf fields become `CacheValue::Scalar` / `CacheValue::Null`
//! - composite fields become a separate record plus a `Reference` at the parent
//! - lists keep their order; null elements stay `Null` in place
//! - fields under unmet inclusion conditions, absent optional fields and
//!   deferred fragments without a fulfilled marker are not written at all
//!
//! The normalizer only builds records. Merging them into a store (and
//! computing what changed) is the transaction's job.

use crate::cache_key::{fulfilled_marker, EntityKeys, KeyResolver};
use graphcache_core::selection::conditions_met;
use graphcache_core::{
    CacheValue, DataObject, DataValue, Field, InclusionCondition, OutputType, Record, RecordKey,
    RecordSet, ResponsePath, SchemaConfiguration, Selection, SelectionSet, TypeCondition,
    Variables, WriteError, WriteErrorReason, TYPENAME,
};
use tracing::{debug, warn};

/// Normalize `data` into records rooted at `root`
///
/// # Arguments
/// * `data` - Tree-shaped value conforming to `selection_set`
/// * `selection_set` - What to write
/// * `root` - Record the top-level fields are written into
/// * `variables` - Bound operation variables
/// * `schema` - Identity hooks
///
/// # Errors
///
/// Returns `WriteError` with the offending response path when a required
/// field is absent or null, or a value's shape contradicts its declared type.
pub fn normalize(
    data: &DataObject,
    selection_set: &SelectionSet,
    root: &RecordKey,
    variables: &Variables,
    schema: &dyn SchemaConfiguration,
) -> Result<RecordSet, WriteError> {
    Normalizer::new(variables, schema).run(data, selection_set, root)
}

/// Normalize only the fields present in `data`, skipping absent required ones
///
/// Used by direct object mutation, which rewrites just the fields a mutator
/// touched.
pub fn normalize_partial(
    data: &DataObject,
    selection_set: &SelectionSet,
    root: &RecordKey,
    variables: &Variables,
    schema: &dyn SchemaConfiguration,
) -> Result<RecordSet, WriteError> {
    let mut normalizer = Normalizer::new(variables, schema);
    normalizer.partial = true;
    normalizer.run(data, selection_set, root)
}

/// Stateful walker producing one `RecordSet`
pub struct Normalizer<'a> {
    keys: KeyResolver<'a>,
    variables: &'a Variables,
    records: RecordSet,
    partial: bool,
}

impl<'a> Normalizer<'a> {
    /// Create a normalizer for one write
    pub fn new(variables: &'a Variables, schema: &'a dyn SchemaConfiguration) -> Self {
        Normalizer {
            keys: KeyResolver::new(schema, variables),
            variables,
            records: RecordSet::new(),
            partial: false,
        }
    }

    /// Normalize `data` into records rooted at `root`, consuming the walker
    ///
    /// # Errors
    ///
    /// See [`normalize`].
    pub fn run(
        mut self,
        data: &DataObject,
        selection_set: &SelectionSet,
        root: &RecordKey,
    ) -> Result<RecordSet, WriteError> {
        self.write_object(data, selection_set, root, &ResponsePath::root())?;
        debug!(
            target: "graphcache::normalize",
            root = %root,
            records = self.records.len(),
            "Normalized result"
        );
        Ok(self.records)
    }

    fn write_object(
        &mut self,
        object: &DataObject,
        selection_set: &SelectionSet,
        key: &RecordKey,
        path: &ResponsePath,
    ) -> Result<(), WriteError> {
        // An object with no written fields still gets a record, so a
        // reference to it is never dangling.
        self.records.insert(Record::new(key.clone()));

        if let Some(value) = object.get(TYPENAME) {
            if let Some(typename) = value.as_scalar() {
                self.records
                    .insert_field(key, TYPENAME, CacheValue::Scalar(typename.clone()));
            }
        }

        let typename = object
            .typename()
            .unwrap_or_else(|| selection_set.default_typename())
            .to_string();
        self.write_selections(object, selection_set, &typename, key, path)
    }

    fn write_selections(
        &mut self,
        object: &DataObject,
        selection_set: &SelectionSet,
        typename: &str,
        key: &RecordKey,
        path: &ResponsePath,
    ) -> Result<(), WriteError> {
        for selection in &selection_set.selections {
            match selection {
                Selection::Field(field) => {
                    if self.included(&field.conditions, path)? {
                        self.write_field(object, field, &selection_set.parent_type, key, path)?;
                    }
                }
                Selection::InlineFragment(fragment) => self.write_fragment(
                    object,
                    fragment.type_condition.as_ref(),
                    &fragment.selection_set,
                    &fragment.conditions,
                    fragment.defer_label.as_deref(),
                    typename,
                    key,
                    path,
                )?,
                Selection::FragmentSpread(spread) => self.write_fragment(
                    object,
                    Some(&spread.fragment.type_condition),
                    &spread.fragment.selection_set,
                    &spread.conditions,
                    spread.defer_label.as_deref(),
                    typename,
                    key,
                    path,
                )?,
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_fragment(
        &mut self,
        object: &DataObject,
        type_condition: Option<&TypeCondition>,
        selection_set: &SelectionSet,
        conditions: &[InclusionCondition],
        defer_label: Option<&str>,
        typename: &str,
        key: &RecordKey,
        path: &ResponsePath,
    ) -> Result<(), WriteError> {
        if !self.included(conditions, path)? {
            return Ok(());
        }
        if let Some(condition) = type_condition {
            if !condition.matches(typename) {
                return Ok(());
            }
        }
        match defer_label {
            Some(label) if object.is_fulfilled(label) => {
                self.write_selections(object, selection_set, typename, key, path)?;
                self.records
                    .insert_field(key, fulfilled_marker(label), CacheValue::Scalar(true.into()));
                Ok(())
            }
            // Not arrived: write nothing of it, but a nested deferred
            // fragment may still have been delivered on its own.
            Some(_) => self.write_nested_deferred(object, selection_set, typename, key, path),
            None => self.write_selections(object, selection_set, typename, key, path),
        }
    }

    fn write_nested_deferred(
        &mut self,
        object: &DataObject,
        selection_set: &SelectionSet,
        typename: &str,
        key: &RecordKey,
        path: &ResponsePath,
    ) -> Result<(), WriteError> {
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
                Some(_) => self.write_fragment(
                    object,
                    type_condition,
                    inner,
                    conditions,
                    label,
                    typename,
                    key,
                    path,
                )?,
                None => {
                    if self.included(conditions, path)?
                        && type_condition.map_or(true, |c| c.matches(typename))
                    {
                        self.write_nested_deferred(object, inner, typename, key, path)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_field(
        &mut self,
        object: &DataObject,
        field: &Field,
        parent_type: &str,
        key: &RecordKey,
        path: &ResponsePath,
    ) -> Result<(), WriteError> {
        let response_key = field.response_key();
        let field_path = path.with_field(response_key);
        let value = match object.get(response_key) {
            Some(value) => value,
            None if field.output_type.is_nullable() || self.partial => return Ok(()),
            None => {
                return Err(WriteError::new(field_path, WriteErrorReason::MissingField));
            }
        };

        let storage_key = self.keys.storage_key(field);
        let policy = if field.output_type.is_composite() {
            self.keys.policy_keys(field, parent_type)
        } else {
            None
        };
        let slot = Slot {
            parent: key,
            storage_key: &storage_key,
            policy: policy.as_ref(),
        };
        let cache_value = self.write_value(value, &field.output_type, &slot, &[], &field_path)?;
        self.records.insert_field(key, storage_key.clone(), cache_value);
        Ok(())
    }

    fn write_value(
        &mut self,
        value: &DataValue,
        output_type: &OutputType,
        slot: &Slot<'_>,
        indices: &[usize],
        path: &ResponsePath,
    ) -> Result<CacheValue, WriteError> {
        match output_type {
            OutputType::NonNull(inner) => {
                if value.is_null() {
                    return Err(WriteError::new(path.clone(), WriteErrorReason::NullValue));
                }
                self.write_value(value, inner, slot, indices, path)
            }
            _ if value.is_null() => Ok(CacheValue::Null),
            OutputType::Scalar(_) => Ok(CacheValue::from(value.to_json())),
            OutputType::List(inner) => {
                let items = value.as_list().ok_or_else(|| mismatch(path, "list", value))?;
                let list_slot = slot.for_list(indices.is_empty(), items.len());
                let mut written = Vec::with_capacity(items.len());
                let mut element_indices = indices.to_vec();
                for (index, item) in items.iter().enumerate() {
                    element_indices.push(index);
                    written.push(self.write_value(
                        item,
                        inner,
                        &list_slot,
                        &element_indices,
                        &path.with_index(index),
                    )?);
                    element_indices.pop();
                }
                Ok(CacheValue::List(written))
            }
            OutputType::Object(selection_set) => {
                let object = value
                    .as_object()
                    .ok_or_else(|| mismatch(path, "object", value))?;
                let typename = object
                    .typename()
                    .unwrap_or_else(|| selection_set.default_typename());
                let key = match self.keys.object_key(typename, object) {
                    Some(key) => key,
                    None => slot.entity_key(indices),
                };
                self.write_object(object, selection_set, &key, path)?;
                Ok(CacheValue::Reference(key))
            }
        }
    }

    fn included(
        &self,
        conditions: &[InclusionCondition],
        path: &ResponsePath,
    ) -> Result<bool, WriteError> {
        conditions_met(conditions, self.variables).map_err(|name| {
            WriteError::new(path.clone(), WriteErrorReason::InvalidVariable(name))
        })
    }
}

/// Where a composite value is being written: its parent field and the
/// argument-derived keys that may name its entities
struct Slot<'s> {
    parent: &'s RecordKey,
    storage_key: &'s str,
    policy: Option<&'s EntityKeys>,
}

impl<'s> Slot<'s> {
    /// Slot for the elements of a list
    ///
    /// Argument-derived keys only apply to the outermost list and only when
    /// their count matches the list length.
    fn for_list(&self, outermost: bool, list_len: usize) -> Slot<'s> {
        let policy = match self.policy {
            Some(EntityKeys::List(keys)) if outermost && keys.len() != list_len => {
                warn!(
                    target: "graphcache::normalize",
                    field = self.storage_key,
                    keys = keys.len(),
                    elements = list_len,
                    "Key argument count does not match list length; using default keys"
                );
                None
            }
            Some(policy @ EntityKeys::List(_)) if outermost => Some(policy),
            _ => None,
        };
        Slot {
            parent: self.parent,
            storage_key: self.storage_key,
            policy,
        }
    }

    /// Entity key for the object at `indices` within this slot
    fn entity_key(&self, indices: &[usize]) -> RecordKey {
        match (self.policy, indices) {
            (Some(EntityKeys::Single(key)), []) => return key.clone(),
            (Some(EntityKeys::List(keys)), [index]) => {
                if let Some(key) = keys.get(*index) {
                    return key.clone();
                }
            }
            _ => {}
        }
        let mut key = self.parent.child(self.storage_key).as_str().to_string();
        for index in indices {
            key.push('.');
            key.push_str(&index.to_string());
        }
        RecordKey::new(key)
    }
}

fn mismatch(path: &ResponsePath, expected: &'static str, found: &DataValue) -> WriteError {
    let found = match found {
        DataValue::Null => "null",
        DataValue::Scalar(_) => "scalar",
        DataValue::List(_) => "list",
        DataValue::Object(_) => "object",
    };
    WriteError::new(
        path.clone(),
        WriteErrorReason::TypeMismatch { expected, found },
    )
}
