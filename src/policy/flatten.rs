//! Spec flattening and comparison helpers
//!
//! Admission objects arrive as arbitrary JSON. Immutable field rules are
//! expressed as dotted paths (`spec.plan`, `spec.storage.size`), so both the
//! incoming and the stored spec are flattened into a single-level map keyed
//! by lower-cased path before they are compared.
//!
//! Values are compared through [`canonical_string`] rather than `==`: the
//! API server may re-encode integers declared in a CRD schema as floating
//! point in the admission request, so a stored `3` and an incoming `3.0`
//! must compare as unchanged.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Lower-cased dotted path to the value found at that path.
pub type FlattenedSpec = BTreeMap<String, Value>;

/// Flatten a JSON object into a path -> value map.
///
/// For every key `k` of `node` the entry `lowercase(prefix + "." + k)` is
/// stored. Nested objects are stored as-is under their own path and their
/// children are flattened as well. Arrays are opaque leaf values.
///
/// Keys are visited in the object's key order and a nested object's children
/// are written after the object itself, so when two source keys collapse to
/// the same lower-cased path the one visited last wins.
///
/// A non-object `node` yields an empty map.
pub fn flatten(prefix: &str, node: &Value) -> FlattenedSpec {
    let mut flat = FlattenedSpec::new();
    if let Value::Object(map) = node {
        flatten_into(prefix, map, &mut flat);
    }
    flat
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, flat: &mut FlattenedSpec) {
    for (key, value) in map {
        // Recurse with the key as written; only stored keys are lower-cased.
        let path = format!("{}.{}", prefix, key);
        flat.insert(path.to_lowercase(), value.clone());
        if let Value::Object(child) = value {
            flatten_into(&path, child, flat);
        }
    }
}

/// Render a value in the textual form used for immutability comparisons.
///
/// - absent and `null` render identically
/// - integral floating point numbers within `i64` range render as integers
///   (`3.0` -> `3`)
/// - strings render JSON-quoted, so `"3"` and `3` stay distinct
/// - arrays and objects render recursively with the same number rule
pub fn canonical_string(value: Option<&Value>) -> String {
    let mut out = String::new();
    match value {
        Some(value) => write_canonical(value, &mut out),
        None => out.push_str("null"),
    }
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&canonical_number(n)),
        Value::String(s) => push_quoted(s, out),
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
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_quoted(key, out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

// i64::MIN and the exclusive upper bound 2^63 are both exact in f64
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn canonical_number(n: &serde_json::Number) -> String {
    if n.is_f64()
        && let Some(f) = n.as_f64()
        && f.is_finite()
        && (I64_LOWER..I64_UPPER).contains(&f)
        && (f as i64) as f64 == f
    {
        return (f as i64).to_string();
    }
    n.to_string()
}

fn push_quoted(s: &str, out: &mut String) {
    // Serializing a str cannot fail
    out.push_str(&serde_json::to_string(s).unwrap_or_default());
}

/// Render a value as plain text, the way a name is expected to appear in a
/// lookup: strings unquoted, everything else in canonical form.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => canonical_string(Some(other)),
    }
}

/// Walk `path` through nested objects. Returns `None` as soon as a segment
/// is missing or an intermediate value is not an object.
pub fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, segment| current.as_object()?.get(*segment))
}

/// String at `path`, or `None` if absent or not a string.
pub fn get_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    get_path(value, path)?.as_str()
}
