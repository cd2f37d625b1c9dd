//! Strips automation internals from captured events and derives dedup identities.

use serde_json::{Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Fields never copied out of a captured event
const DROPPED_FIELDS: &[&str] = &["error", "trace"];

/// Keys that identify a driver-side object reference rather than page data
const DRIVER_REFERENCE_KEYS: &[&str] = &[
    "element-6066-11e4-a52e-4f735466cecf",
    "shadow-6066-11e4-a52e-4f735466cecf",
    "ELEMENT",
    "__driver_ref__",
];

/// Marker the snapshot script uses for values that have no JSON form
pub const OPAQUE_KEY: &str = "__opaque__";

const MAX_DEPTH: usize = 64;

/// Copy `event` without internal fields. Never fails; problems become a placeholder string.
pub fn sanitize(event: &Value) -> Value {
    match sanitize_value(event, 0) {
        Ok(v) => v,
        Err(reason) => Value::String(format!("Error sanitizing data: {}", reason)),
    }
}

fn is_driver_reference(value: &Value) -> bool {
    match value {
        Value::Object(map) => DRIVER_REFERENCE_KEYS.iter().any(|k| map.contains_key(*k)),
        _ => false,
    }
}

fn sanitize_value(value: &Value, depth: usize) -> Result<Value, String> {
    if depth > MAX_DEPTH {
        return Err(format!("nesting deeper than {} levels", MAX_DEPTH));
    }
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(repr) = map.get(OPAQUE_KEY) {
                    return Ok(Value::String(match repr {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    }));
                }
            }
            let mut clean = Map::new();
            for (key, item) in map {
                if DROPPED_FIELDS.contains(&key.as_str()) || is_driver_reference(item) {
                    continue;
                }
                clean.insert(key.clone(), sanitize_value(item, depth + 1)?);
            }
            Ok(Value::Object(clean))
        }
        Value::Array(items) => items
            .iter()
            .filter(|item| !is_driver_reference(item))
            .map(|item| sanitize_value(item, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        scalar => Ok(scalar.clone()),
    }
}

/// Identity used to suppress re-reporting the same event: `<name>_<hash>`.
///
/// The hash covers the canonical JSON text (object keys sorted), so two
/// snapshots of the same event produce the same identity.
pub fn content_identity(event_name: &str, sanitized: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(sanitized, &mut canonical);
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    format!("{}_{:016x}", event_name, hasher.finish())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
