//! Helpers for editing `ext` blobs as open JSON objects.
//!
//! Objects use `serde_json::Map`, which keeps keys sorted, so re-serialized
//! extensions are deterministic.

use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

/// Remove `key` from `map` and return its object, or an empty object when
/// the key is missing or holds a non-object value. Callers insert the edited
/// object back under the same key.
pub fn take_object_or_empty(map: &mut JsonObject, key: &str) -> JsonObject {
    match map.remove(key) {
        Some(Value::Object(object)) => object,
        _ => Map::new(),
    }
}

/// Copy every key of `source` into `target`, overwriting existing keys.
pub fn merge_object(target: &mut JsonObject, source: JsonObject) {
    target.extend(source);
}

/// Remove `key` from `map` when it holds an object and return that object.
/// Non-object values are left in place.
pub fn take_object(map: &mut JsonObject, key: &str) -> Option<JsonObject> {
    if !map.get(key).is_some_and(Value::is_object) {
        return None;
    }
    match map.remove(key) {
        Some(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Clone `value` as an object, falling back to an empty object for `None`
/// and for any non-object JSON.
#[must_use]
pub fn object_or_empty(value: Option<&Value>) -> JsonObject {
    match value {
        Some(Value::Object(object)) => object.clone(),
        _ => Map::new(),
    }
}
