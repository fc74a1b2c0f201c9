//! Tree-shaped data values
//!
//! `DataValue` is the shape results take before normalization (the write
//! input) and after execution (the read output): scalars, ordered lists and
//! nested objects keyed by response key.
//!
//! ## Deferred fragments
//!
//! Every `DataObject` carries a map from defer label to `DeferredState`.
//! On write, `Fulfilled` is the explicit marker that a deferred fragment's
//! data has arrived; without it the fragment is not written at all. On read,
//! each deferred fragment that applies to the object is reported as
//! `Pending` or `Fulfilled`; fulfilled fragment fields are merged into the
//! object's own fields.

use crate::value::Scalar;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Response key of the typename meta field
pub const TYPENAME: &str = "__typename";

/// Tree-shaped value
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Explicit null
    Null,
    /// Leaf value
    Scalar(Scalar),
    /// Ordered list
    List(Vec<DataValue>),
    /// Nested object
    Object(DataObject),
}

impl DataValue {
    /// Check whether this value is an explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Borrow the object if this value is one
    pub fn as_object(&self) -> Option<&DataObject> {
        match self {
            DataValue::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Mutably borrow the object if this value is one
    pub fn as_object_mut(&mut self) -> Option<&mut DataObject> {
        match self {
            DataValue::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Borrow the list if this value is one
    pub fn as_list(&self) -> Option<&Vec<DataValue>> {
        match self {
            DataValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Mutably borrow the list if this value is one
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<DataValue>> {
        match self {
            DataValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the scalar payload if this value is one
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            DataValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the scalar as a string if it is one
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    /// Convert to plain JSON, dropping deferred-fragment states
    pub fn to_json(&self) -> Scalar {
        match self {
            DataValue::Null => Scalar::Null,
            DataValue::Scalar(value) => value.clone(),
            DataValue::List(items) => Scalar::Array(items.iter().map(DataValue::to_json).collect()),
            DataValue::Object(object) => object.to_json(),
        }
    }
}

impl From<Scalar> for DataValue {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Null => DataValue::Null,
            Scalar::Array(items) => DataValue::List(items.into_iter().map(DataValue::from).collect()),
            Scalar::Object(map) => DataValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, DataValue::from(v)))
                    .collect(),
            ),
            other => DataValue::Scalar(other),
        }
    }
}

impl From<DataObject> for DataValue {
    fn from(object: DataObject) -> Self {
        DataValue::Object(object)
    }
}

/// Availability of one deferred fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredState {
    /// The fragment's data has not (fully) arrived
    Pending,
    /// The fragment's data is complete
    Fulfilled,
}

/// Object keyed by response key
///
/// Field order is preserved but does not take part in equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataObject {
    fields: IndexMap<String, DataValue>,
    deferred: BTreeMap<String, DeferredState>,
}

impl DataObject {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field by response key
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.fields.get(key)
    }

    /// Mutably get a field by response key
    pub fn get_mut(&mut self, key: &str) -> Option<&mut DataValue> {
        self.fields.get_mut(key)
    }

    /// Check whether a field is present (explicit null counts as present)
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// True only when the field is present with an explicit null
    pub fn has_null_value(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(DataValue::Null))
    }

    /// Set a field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Option<DataValue> {
        self.fields.insert(key.into(), value.into())
    }

    /// Builder-style `insert`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Remove a field, keeping the order of the remaining ones
    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        self.fields.shift_remove(key)
    }

    /// Iterate over fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DataValue)> {
        self.fields.iter()
    }

    /// Response keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the object has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Value of `__typename`, if present and a string
    pub fn typename(&self) -> Option<&str> {
        self.get(TYPENAME).and_then(DataValue::as_str)
    }

    /// Borrow a nested object field
    pub fn object(&self, key: &str) -> Option<&DataObject> {
        self.get(key).and_then(DataValue::as_object)
    }

    /// Mutably borrow a nested object field
    pub fn object_mut(&mut self, key: &str) -> Option<&mut DataObject> {
        self.get_mut(key).and_then(DataValue::as_object_mut)
    }

    /// Borrow a nested list field
    pub fn list(&self, key: &str) -> Option<&Vec<DataValue>> {
        self.get(key).and_then(DataValue::as_list)
    }

    /// Mutably borrow a nested list field
    pub fn list_mut(&mut self, key: &str) -> Option<&mut Vec<DataValue>> {
        self.get_mut(key).and_then(DataValue::as_list_mut)
    }

    /// State of the deferred fragment with `label`, if it applies to this object
    pub fn deferred_state(&self, label: &str) -> Option<DeferredState> {
        self.deferred.get(label).copied()
    }

    /// Check whether the deferred fragment with `label` is fulfilled
    pub fn is_fulfilled(&self, label: &str) -> bool {
        self.deferred_state(label) == Some(DeferredState::Fulfilled)
    }

    /// Set the state of a deferred fragment
    pub fn set_deferred(&mut self, label: impl Into<String>, state: DeferredState) {
        self.deferred.insert(label.into(), state);
    }

    /// Builder-style marker that a deferred fragment's data is complete
    pub fn fulfilled(mut self, label: impl Into<String>) -> Self {
        self.set_deferred(label, DeferredState::Fulfilled);
        self
    }

    /// Builder-style marker that a deferred fragment's data has not arrived
    pub fn pending(mut self, label: impl Into<String>) -> Self {
        self.set_deferred(label, DeferredState::Pending);
        self
    }

    /// Iterate over deferred fragment states by label
    pub fn deferred(&self) -> impl Iterator<Item = (&String, &DeferredState)> {
        self.deferred.iter()
    }

    /// Convert to plain JSON, dropping deferred-fragment states
    pub fn to_json(&self) -> Scalar {
        Scalar::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl<K: Into<String>> FromIterator<(K, DataValue)> for DataObject {
    fn from_iter<I: IntoIterator<Item = (K, DataValue)>>(iter: I) -> Self {
        DataObject {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            deferred: BTreeMap::new(),
        }
    }
}

impl IntoIterator for DataObject {
    type Item = (String, DataValue);
    type IntoIter = indexmap::map::IntoIter<String, DataValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl From<Scalar> for DataObject {
    /// Build an object from a JSON object; any other JSON value yields an empty object
    fn from(value: Scalar) -> Self {
        match DataValue::from(value) {
            DataValue::Object(object) => object,
            _ => DataObject::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_builds_nested_shapes() {
        let value = DataValue::from(json!({
            "hero": {"__typename": "Droid", "friends": [{"name": "Luke"}, null]}
        }));
        let hero = value.as_object().and_then(|o| o.object("hero")).unwrap();
        assert_eq!(hero.typename(), Some("Droid"));
        let friends = hero.list("friends").unwrap();
        assert_eq!(friends.len(), 2);
        assert!(friends[1].is_null());
    }

    #[test]
    fn test_has_null_value_distinguishes_absent() {
        let object = DataObject::new().with("nickname", DataValue::Null);
        assert!(object.has_null_value("nickname"));
        assert!(!object.has_null_value("missing"));
        assert!(object.contains_key("nickname"));
    }

    #[test]
    fn test_equality_ignores_field_order() {
        let a = DataObject::new()
            .with("a", json!(1))
            .with("b", json!(2));
        let b = DataObject::new()
            .with("b", json!(2))
            .with("a", json!(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_deferred_states() {
        let object = DataObject::new().fulfilled("slow").pending("slower");
        assert!(object.is_fulfilled("slow"));
        assert_eq!(object.deferred_state("slower"), Some(DeferredState::Pending));
        assert_eq!(object.deferred_state("other"), None);
    }

    #[test]
    fn test_deferred_state_takes_part_in_equality() {
        let a = DataObject::new().with("a", json!(1));
        let b = a.clone().fulfilled("x");
        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut object = DataObject::new()
            .with("a", json!(1))
            .with("b", json!(2))
            .with("c", json!(3));
        object.remove("b");
        let keys: Vec<&String> = object.keys().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_to_json() {
        let object = DataObject::from(json!({"a": [1, null, {"b": "c"}]}));
        assert_eq!(object.to_json(), json!({"a": [1, null, {"b": "c"}]}));
    }
}
