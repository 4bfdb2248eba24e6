//! Value Sanitizer
//!
//! Turns whatever a client library hands us (typed response structs, stream
//! events, raw JSON) into plain [`serde_json::Value`]s before any extraction
//! runs, and folds plain values into the integer-or-string shape metadata
//! maps accept. Nothing in here returns an error: values that cannot be
//! represented are logged at debug level and dropped.

use serde::Serialize;
use serde_json::Value;

use crate::types::{Metadata, MetadataValue};

/// Convert any serializable value into a plain JSON value.
///
/// Typed structs become objects keyed by their field names; sequences and
/// maps recurse. A value that fails to serialize becomes `Value::Null`.
pub fn to_plain<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("dropping unparseable value: {}", e);
            Value::Null
        }
    }
}

/// Fold a plain value into a metadata value.
///
/// Integers and strings pass through, booleans become 0/1, floats and
/// out-of-range integers are stringified, arrays and objects are
/// JSON-encoded. `null` yields `None`.
pub fn metadata_value(value: &Value) -> Option<MetadataValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(MetadataValue::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(MetadataValue::Integer(i)),
            None => Some(MetadataValue::Text(n.to_string())),
        },
        Value::String(s) => Some(MetadataValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => match serde_json::to_string(value) {
            Ok(s) => Some(MetadataValue::Text(s)),
            Err(e) => {
                tracing::debug!("dropping unparseable metadata value: {}", e);
                None
            }
        },
    }
}

/// Look up `key` on an object, treating `null` the same as absent.
pub fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| !v.is_null())
}

/// Look up a string field.
pub fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Copy `keys` from `source` into `metadata`, skipping absent and null fields.
pub fn copy_fields(metadata: &mut Metadata, source: &Value, keys: &[&str]) {
    for key in keys {
        if let Some(v) = field(source, key).and_then(metadata_value) {
            metadata.insert((*key).to_string(), v);
        }
    }
}

/// `false` for `null`, `false`, `0`, `""`, `[]` and `{}`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Recursively drop falsy entries (`null`, `false`, `0`, `""`, `[]`, `{}`).
///
/// Objects are pruned member by member and vanish when nothing is left;
/// non-empty arrays are kept as they are.
pub fn prune_falsy(value: Value) -> Option<Value> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Number(ref n) if n.as_f64() == Some(0.0) => None,
        Value::String(ref s) if s.is_empty() => None,
        Value::Array(ref a) if a.is_empty() => None,
        Value::Object(map) => {
            let pruned: serde_json::Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune_falsy(v).map(|v| (k, v)))
                .collect();
            if pruned.is_empty() {
                None
            } else {
                Some(Value::Object(pruned))
            }
        }
        other => Some(other),
    }
}

/// Drop falsy metadata values.
pub fn without_falsy(metadata: Metadata) -> Metadata {
    metadata.into_iter().filter(|(_, v)| !v.is_falsy()).collect()
}

/// Title-case a role: the first letter of every word is upper-cased, the
/// rest lower-cased. A "word" starts after any non-alphabetic character, so
/// `new role` becomes `New Role` and `test_role` becomes `Test_Role`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// First `max` characters of `s` (char-safe).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
