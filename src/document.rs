//! Helpers for schema-less resource documents.
//!
//! Resource documents are plain `serde_json` maps. Attribute names in SCIM
//! are case-insensitive, so every lookup goes through these helpers instead
//! of indexing the map directly.

use serde_json::{Map, Value};

/// The key under which `name` is stored, ignoring case.
pub(crate) fn find_key(map: &Map<String, Value>, name: &str) -> Option<String> {
    map.keys().find(|key| key.eq_ignore_ascii_case(name)).cloned()
}

pub(crate) fn get_ignore_case<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

pub(crate) fn get_ignore_case_mut<'a>(
    map: &'a mut Map<String, Value>,
    name: &str,
) -> Option<&'a mut Value> {
    let key = find_key(map, name)?;
    map.get_mut(&key)
}

/// Remove `name` ignoring case, keeping the order of the remaining keys.
pub(crate) fn remove_ignore_case(map: &mut Map<String, Value>, name: &str) -> Option<Value> {
    let key = find_key(map, name)?;
    map.shift_remove(&key)
}

/// Store `value` under `name`, replacing any key that differs only in case.
///
/// An existing entry keeps its position in the document.
pub(crate) fn insert_ignore_case(map: &mut Map<String, Value>, name: &str, value: Value) {
    match find_key(map, name) {
        Some(key) if key == name => {
            map.insert(key, value);
        }
        Some(key) => {
            if let Some(slot) = map.get_mut(&key) {
                *slot = value;
            }
        }
        None => {
            map.insert(name.to_string(), value);
        }
    }
}

/// Type name of a JSON value as used in validation messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "decimal",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Text of a value for messages: strings without quotes, everything else as JSON.
pub(crate) fn literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Whether a value counts as present: not null and not an empty string,
/// array or object.
pub(crate) fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => items.iter().any(is_present),
        Value::Object(map) => map.values().any(is_present),
        _ => true,
    }
}
