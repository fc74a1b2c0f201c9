//! Cache key resolution
//!
//! Computes, for one field occurrence:
//!
//! - the **field storage key**: the name a field's value is stored under in
//!   its parent record (`name`, or `name(arg:value,...)`)
//! - the **entity keys**: which record(s) a composite field's object(s) are
//!   normalized into
//!
//! ## Resolution order for entity keys
//!
//! ```text
//! 1. Type identity      object -> Typename:id        (SchemaConfiguration::cache_key_info)
//! 2. Field identity     arguments -> Typename:id     (SchemaConfiguration::field_cache_keys)
//! 3. Key arguments      arguments -> field:v1+v2     (Field::key_args)
//! 4. Default            parentKey.fieldStorageKey[.index]
//! ```
//!
//! Steps 2 and 3 depend only on the bound arguments, so the executor can use
//! them to find entities even when the parent field was never written.

use graphcache_core::{
    CacheKeyInfo, DataObject, Field, FieldCacheKeys, FieldKeyContext, RecordKey, Scalar,
    SchemaConfiguration, Variables,
};
use tracing::warn;

/// Prefix of the record field marking a deferred fragment as fulfilled
pub const FULFILLED_PREFIX: &str = "__fulfilled:";

/// Record field marking the deferred fragment `label` as fulfilled
pub fn fulfilled_marker(label: &str) -> String {
    format!("{FULFILLED_PREFIX}{label}")
}

/// Entity keys a field occurrence resolves to from its arguments alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKeys {
    /// One entity (object field)
    Single(RecordKey),
    /// One entity per list element, in list order
    List(Vec<RecordKey>),
}

impl EntityKeys {
    /// Number of keys
    pub fn len(&self) -> usize {
        match self {
            EntityKeys::Single(_) => 1,
            EntityKeys::List(keys) => keys.len(),
        }
    }

    /// Check if there are no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key for list element `index`, if this is a list of matching length
    pub fn at(&self, index: usize, list_len: usize) -> Option<&RecordKey> {
        match self {
            EntityKeys::List(keys) if keys.len() == list_len => keys.get(index),
            _ => None,
        }
    }
}

/// Resolves keys for field occurrences under one set of bound variables
pub struct KeyResolver<'a> {
    schema: &'a dyn SchemaConfiguration,
    variables: &'a Variables,
}

impl<'a> KeyResolver<'a> {
    /// Create a resolver
    pub fn new(schema: &'a dyn SchemaConfiguration, variables: &'a Variables) -> Self {
        KeyResolver { schema, variables }
    }

    /// Resolved arguments of `field` as a JSON object, in declaration order
    pub fn arguments(&self, field: &Field) -> Scalar {
        Scalar::Object(
            field
                .arguments
                .iter()
                .map(|arg| (arg.name.clone(), arg.value.resolve(self.variables)))
                .collect(),
        )
    }

    /// Field storage key of `field`
    pub fn storage_key(&self, field: &Field) -> String {
        if field.arguments.is_empty() {
            return field.name.clone();
        }
        default_storage_key(&field.name, &self.arguments(field))
    }

    /// Type-identity key of an object, if the schema configuration knows one
    pub fn object_key(&self, typename: &str, object: &DataObject) -> Option<RecordKey> {
        self.schema
            .cache_key_info(typename, object)
            .map(|info| RecordKey::new(info.key()))
    }

    /// Entity keys derivable from `field`'s arguments alone
    ///
    /// Field-level identity from the schema configuration wins over declared
    /// key arguments. Returns `None` when neither applies.
    pub fn policy_keys(&self, field: &Field, parent_type: &str) -> Option<EntityKeys> {
        let arguments = self.arguments(field);
        let context = FieldKeyContext {
            parent_type,
            field_name: &field.name,
            arguments: &arguments,
            returns_list: field.output_type.is_list(),
        };
        if let Some(keys) = self.schema.field_cache_keys(&context) {
            return Some(match keys {
                FieldCacheKeys::Single(info) => EntityKeys::Single(RecordKey::new(info.key())),
                FieldCacheKeys::List(infos) => {
                    EntityKeys::List(infos.iter().map(CacheKeyInfo::key).map(RecordKey::new).collect())
                }
            });
        }
        let paths = field.key_args.as_ref()?;
        key_args_keys(&field.name, paths, &arguments)
    }
}

/// Default field storage key: `name(a:v1,b:v2)` with arguments sorted by name
///
/// Arguments are ordered by name, not by the order the operation declares
/// them in, so the same arguments always yield the same key. Argument values
/// are rendered as canonical JSON (object keys sorted), so input-object field
/// order does not change the key either.
///
/// # Example
///
/// ```
/// use graphcache_engine::cache_key::default_storage_key;
/// use serde_json::json;
///
/// let key = default_storage_key("hero", &json!({"episode": "JEDI", "first": 2}));
/// assert_eq!(key, r#"hero(episode:"JEDI",first:2)"#);
/// assert_eq!(default_storage_key("hero", &json!({})), "hero");
/// ```
pub fn default_storage_key(name: &str, arguments: &Scalar) -> String {
    let mut pairs: Vec<(&String, &Scalar)> = match arguments {
        Scalar::Object(map) => map.iter().collect(),
        _ => Vec::new(),
    };
    if pairs.is_empty() {
        return name.to_string();
    }
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    let rendered: Vec<String> = pairs
        .into_iter()
        .map(|(k, v)| format!("{}:{}", k, canonical_json(v)))
        .collect();
    format!("{}({})", name, rendered.join(","))
}

/// Render JSON with object keys sorted, independent of map ordering
pub fn canonical_json(value: &Scalar) -> String {
    match value {
        Scalar::Object(map) => {
            let mut entries: Vec<(&String, &Scalar)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Scalar::String(k.clone()), canonical_json(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Scalar::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

/// One key-argument component after path extraction
enum KeyPart {
    Single(String),
    List(Vec<String>),
}

/// Entity keys from declared key-argument paths
///
/// Each dotted path is resolved against `arguments`; leaf values are joined
/// with `+` in declared order and prefixed with `field_name:`. A path whose
/// leaf is a list fans the occurrence out into one key per element. Several
/// list-valued paths are zipped positionally.
///
/// Returns `None` if a path does not resolve or list lengths disagree.
///
/// # Example
///
/// ```
/// use graphcache_engine::cache_key::{key_args_keys, EntityKeys};
/// use graphcache_core::RecordKey;
/// use serde_json::json;
///
/// let keys = key_args_keys(
///     "heroes",
///     &["names".to_string(), "isJedi".to_string()],
///     &json!({"names": ["Luke", "Obi-Wan"], "isJedi": true}),
/// );
/// assert_eq!(
///     keys,
///     Some(EntityKeys::List(vec![
///         RecordKey::new("heroes:Luke+true"),
///         RecordKey::new("heroes:Obi-Wan+true"),
///     ]))
/// );
/// ```
pub fn key_args_keys(field_name: &str, paths: &[String], arguments: &Scalar) -> Option<EntityKeys> {
    if paths.is_empty() {
        return None;
    }

    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        let leaf = path
            .split('.')
            .try_fold(arguments, |value, component| value.get(component))?;
        parts.push(match leaf {
            Scalar::Array(items) => KeyPart::List(items.iter().map(key_component).collect()),
            other => KeyPart::Single(key_component(other)),
        });
    }

    let mut list_len = None;
    for part in &parts {
        if let KeyPart::List(items) = part {
            match list_len {
                None => list_len = Some(items.len()),
                Some(len) if len != items.len() => {
                    warn!(
                        target: "graphcache::normalize",
                        field = field_name,
                        "List-valued key arguments differ in length; falling back to default key"
                    );
                    return None;
                }
                Some(_) => {}
            }
        }
    }

    let join_at = |index: Option<usize>| -> RecordKey {
        let components: Vec<&str> = parts
            .iter()
            .map(|part| match (part, index) {
                (KeyPart::Single(value), _) => value.as_str(),
                (KeyPart::List(items), Some(i)) => items[i].as_str(),
                (KeyPart::List(_), None) => "",
            })
            .collect();
        RecordKey::new(format!("{}:{}", field_name, components.join("+")))
    };

    Some(match list_len {
        None => EntityKeys::Single(join_at(None)),
        Some(len) => EntityKeys::List((0..len).map(|i| join_at(Some(i))).collect()),
    })
}

fn key_component(value: &Scalar) -> String {
    match value {
        Scalar::String(s) => s.clone(),
        other => canonical_json(other),
    }
}
