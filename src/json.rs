//! Boundary conversion between `serde_json::Value` and the core's own
//! `Value` (spec.md's explicit out-of-scope item "JSON parsing/
//! serialization at the boundary"), grounded on the teacher's
//! `simdjson/bridge.rs` — a dedicated module translating an external
//! representation into the crate's own value tree.
//!
//! `serde_json`'s `preserve_order` feature keeps object key order
//! intact on the way in, matching spec §3.1's ordered-object
//! requirement; on the way out, `Value::normalize` has already stripped
//! every `Undefined` and collapsed every `Sequence`; this module never
//! sees either variant.

use crate::error::{err, Result};
use crate::value::Value;

/// Parse a JSON source string directly into the core's `Value`. Used by
/// the CLI and by tests; the library's main entry point for host data
/// is `from_serde` (a host embedding `serde_json` already has a
/// `serde_json::Value` in hand and shouldn't round-trip through text).
pub fn from_json_str(src: &str) -> Result<Value> {
    let parsed: serde_json::Value =
        serde_json::from_str(src).map_err(|e| err::j0001(format!("invalid JSON input: {e}")))?;
    Ok(from_serde(&parsed))
}

/// Convert a `serde_json::Value` into the core's `Value`. Infallible:
/// every shape `serde_json` can produce (given `preserve_order`) maps
/// onto an existing `Value` variant.
pub fn from_serde(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::str(s.as_str()),
        serde_json::Value::Array(items) => {
            Value::array(items.iter().map(from_serde).collect())
        }
        serde_json::Value::Object(map) => Value::object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_serde(v)))
                .collect(),
        ),
    }
}

/// Convert a normalized `Value` back into `serde_json::Value`. Any
/// `Undefined`/`Sequence` still present (a caller that skipped
/// `Value::normalize`) is treated as `null`/a plain array respectively,
/// rather than panicking — the host boundary should never be the place
/// an internal invariant violation surfaces as a crash.
pub fn to_serde(v: &Value) -> serde_json::Value {
    match v {
        Value::Undefined | Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.to_string()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_serde).collect()),
        Value::Sequence(seq) => serde_json::Value::Array(seq.items.iter().map(to_serde).collect()),
        Value::Object(pairs) => {
            let mut map = serde_json::Map::with_capacity(pairs.len());
            for (k, v) in pairs.iter() {
                map.insert(k.clone(), to_serde(v));
            }
            serde_json::Value::Object(map)
        }
        Value::Function(_) => serde_json::Value::Null,
        Value::Regex(r) => serde_json::Value::String(format!("/{}/{}", r.pattern, r.flags)),
    }
}

/// Render a `Value` as a JSON string, pretty-printed unless `compact`.
/// The core's own `Value::to_compact_json` is used internally for `&`
/// concatenation; this entry point goes through `serde_json` so the CLI
/// gets its pretty-printer and key-order guarantees from one place.
pub fn to_json_string(v: &Value, compact: bool) -> Result<String> {
    let serde_v = to_serde(&v.normalize());
    let out = if compact {
        serde_json::to_string(&serde_v)
    } else {
        serde_json::to_string_pretty(&serde_v)
    };
    out.map_err(|e| err::j0001(format!("failed to render JSON output: {e}")))
}
