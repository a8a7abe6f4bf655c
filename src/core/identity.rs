//! Content-addressed identity and canonical hashing
//!
//! Every stable id in the project is derived from a SHA-256 over canonical
//! JSON bytes. Canonicalization rules:
//! - maps are serialized with sorted keys
//! - sequences preserve order
//! - floats are rounded to 12 decimal places before hashing
//! - bytes are compact UTF-8 JSON
//!
//! Project-content hashing uses the same rules but excludes `agent_history`,
//! `assistant_undo_stack`, and `assistant_redo_stack`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::core::error::Result;

/// Number of decimal places floats are rounded to before hashing.
const FLOAT_DECIMALS: i32 = 12;

/// Top-level keys excluded from the project content hash.
const HASH_EXCLUDED_KEYS: [&str; 3] = [
    "agent_history",
    "assistant_undo_stack",
    "assistant_redo_stack",
];

/// Round a float to 12 decimal places, normalizing negative zero.
fn round_float(x: f64) -> f64 {
    let scale = 10f64.powi(FLOAT_DECIMALS);
    let r = (x * scale).round() / scale;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Recursively normalize a JSON value for hashing.
///
/// serde_json's default object representation is ordered by key, so map
/// ordering is already canonical; this pass handles float rounding.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if n.is_f64() {
                    return serde_json::Number::from_f64(round_float(f))
                        .map(Value::Number)
                        .unwrap_or(Value::Null);
                }
            }
            value.clone()
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        _ => value.clone(),
    }
}

/// Serialize a value to canonical bytes (sorted keys, rounded floats, compact).
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(&canonicalize(value)).expect("canonical JSON serialization cannot fail")
}

/// SHA-256 hex digest of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// SHA-256 hex digest of a file's contents, streamed.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Hash a payload and return `"prefix:<hex12>"`.
pub fn stable_id(prefix: &str, payload: &Value) -> String {
    let digest = sha256_hex(&canonical_bytes(payload));
    format!("{}:{}", prefix, &digest[..12])
}

/// Derived id: `stable_id("<parent>:<kind>", {parent_id, kind, params})`.
pub fn derived_id(parent_id: &str, kind: &str, params: &Value) -> String {
    let payload = serde_json::json!({
        "parent_id": parent_id,
        "kind": kind,
        "params": params,
    });
    stable_id(&format!("{}:{}", parent_id, kind), &payload)
}

/// Canonical content hash of a project value, excluding audit and undo state.
pub fn content_hash_of(project_value: &Value) -> String {
    let mut trimmed = project_value.clone();
    if let Value::Object(ref mut map) = trimmed {
        for key in HASH_EXCLUDED_KEYS {
            map.remove(key);
        }
    }
    sha256_hex(&canonical_bytes(&trimmed))
}
