//! Records kept in both stores and JSON helpers shared by the backends.

use serde_json::{Map, Value};
use tandem_cache::CacheValue;

use crate::error::{StorageError, StorageResult};

/// A record type that lives in the primary store and is projected into the secondary.
///
/// Field names in the associated constants are the serialized (JSON) names.
pub trait Record: CacheValue + Clone + 'static {
    /// Kind label used in errors and logs (e.g. `user`).
    const KIND: &'static str;

    /// Serialized name of the id field.
    const ID_FIELD: &'static str = "id";

    /// Field holding the natural key, unique across the kind.
    const NATURAL_KEY_FIELD: &'static str;

    /// Fields whose values must be unique across the kind.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    /// Fields a projection must never drop once set (e.g. password hashes).
    const SENSITIVE_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);

    fn natural_key(&self) -> Option<&str>;

    fn to_json(&self) -> StorageResult<Value> {
        let value = serde_json::to_value(self)?;
        if !value.is_object() {
            return Err(StorageError::invalid_record(format!(
                "{} must serialize to an object",
                Self::KIND
            )));
        }
        Ok(value)
    }

    fn from_json(value: Value) -> StorageResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Applies a JSON merge patch: `null` removes a field, objects merge recursively,
/// anything else replaces.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(
                    target_map.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

/// Overlays `payload` on `existing`, keeping `sensitive` fields the payload lacks.
///
/// A field counts as lacking when it is absent or `null`. Other `null`
/// fields in the payload clear the existing value.
pub fn merge_preserving(existing: Value, payload: &Value, sensitive: &[&str]) -> Value {
    let mut merged = match existing {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Value::Object(fields) = payload {
        for (key, value) in fields {
            if value.is_null() && sensitive.contains(&key.as_str()) {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// Sensitive fields that are absent or `null` in `value`.
pub fn missing_sensitive<'a>(value: &Value, sensitive: &[&'a str]) -> Vec<&'a str> {
    sensitive
        .iter()
        .copied()
        .filter(|field| value.get(*field).is_none_or(Value::is_null))
        .collect()
}

/// String form of a field used for lookups and uniqueness checks.
pub fn field_text(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
