//! Schema configuration hooks for cache identity
//!
//! The schema-configuration collaborator can tell the cache how to identify
//! entities:
//! - per type, from an object's field values (`cache_key_info`)
//! - per field, from the field's arguments (`field_cache_keys`), which lets a
//!   read resolve entities without the parent field ever having been written
//!
//! Both hooks take precedence over declared key-arg paths and the default
//! path-derived key.

use crate::data::DataObject;
use crate::value::Scalar;

/// Identity of one entity: rendered as `typename:id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKeyInfo {
    /// Type the identity is scoped to
    pub typename: String,
    /// Unique id within that type
    pub id: String,
}

impl CacheKeyInfo {
    /// Create an identity
    pub fn new(typename: impl Into<String>, id: impl Into<String>) -> Self {
        CacheKeyInfo {
            typename: typename.into(),
            id: id.into(),
        }
    }

    /// Render as a record key string
    pub fn key(&self) -> String {
        format!("{}:{}", self.typename, self.id)
    }
}

/// Identities a field-level resolver returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldCacheKeys {
    /// Single entity (object field)
    Single(CacheKeyInfo),
    /// One entity per list element (list field)
    List(Vec<CacheKeyInfo>),
}

/// What a field-level resolver is told about one field occurrence
#[derive(Debug, Clone, Copy)]
pub struct FieldKeyContext<'a> {
    /// Static type the field is selected on
    pub parent_type: &'a str,
    /// Schema field name
    pub field_name: &'a str,
    /// Resolved arguments as a JSON object
    pub arguments: &'a Scalar,
    /// Whether the field's type is a list
    pub returns_list: bool,
}

/// Type- and field-level identity resolution
pub trait SchemaConfiguration: Send + Sync {
    /// Identity of an object of concrete type `typename`, if it has one
    fn cache_key_info(&self, typename: &str, object: &DataObject) -> Option<CacheKeyInfo> {
        let _ = (typename, object);
        None
    }

    /// Identities of the entities a field occurrence resolves to, if known
    fn field_cache_keys(&self, field: &FieldKeyContext<'_>) -> Option<FieldCacheKeys> {
        let _ = field;
        None
    }
}

/// Configuration with no identity hooks: every key is path- or policy-derived
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSchemaConfiguration;

impl SchemaConfiguration for DefaultSchemaConfiguration {}

/// Identifies every object carrying a scalar `id` field as `Typename:id`
#[derive(Debug, Clone, Copy, Default)]
pub struct IdFieldConfiguration;

impl SchemaConfiguration for IdFieldConfiguration {
    fn cache_key_info(&self, typename: &str, object: &DataObject) -> Option<CacheKeyInfo> {
        let id = match object.get("id")?.as_scalar()? {
            Scalar::String(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(CacheKeyInfo::new(typename, id))
    }
}
