//! Canonical encoding and hashing of structured records.
//!
//! A record is a `serde_json::Value`. It is encoded as JSON text with object
//! keys sorted by code point, `", "` between items, `": "` between key and
//! value, and every string escaped down to printable ASCII (`\uXXXX`, UTF-16
//! surrogate pairs above U+FFFF). This is byte-for-byte what
//! `json.dumps(record, sort_keys=True)` emits, so identifiers can be
//! recomputed by any implementation that follows the same rule.
//!
//! Encoding never depends on how the value was built or on serde_json's map
//! ordering features; only on the values themselves.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::Hash;

/// Canonical byte encoding of `value`.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    write_value(&mut out, value);
    out
}

/// SHA-256 of `value`'s canonical encoding, as lowercase hex.
pub fn hash(value: &Value) -> Hash {
    digest_bytes(&encode(value))
}

pub fn digest_bytes(bytes: &[u8]) -> Hash {
    hex::encode(Sha256::digest(bytes))
}

/// Encodes a top-level object with the value of `key` left out.
///
/// For any value `v`, `prefix ++ encode(v) ++ suffix` is the encoding of the
/// same object with `key` set to `v`. Returns `None` if `value` is not an
/// object or has no `key`.
pub fn split_at_key(value: &Value, key: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let map = value.as_object()?;
    if !map.contains_key(key) {
        return None;
    }

    let mut prefix = vec![b'{'];
    let mut suffix = Vec::new();
    let mut past_key = false;
    for (i, (k, v)) in sorted_entries(map).into_iter().enumerate() {
        let out = if past_key { &mut suffix } else { &mut prefix };
        if i > 0 {
            out.extend_from_slice(b", ");
        }
        write_string(out, k);
        out.extend_from_slice(b": ");
        if k == key {
            past_key = true;
            continue;
        }
        write_value(out, v);
    }
    suffix.push(b'}');
    Some((prefix, suffix))
}

fn sorted_entries(map: &Map<String, Value>) -> Vec<(&str, &Value)> {
    let mut entries: Vec<(&str, &Value)> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
    // UTF-8 byte order is code point order.
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    entries
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.extend_from_slice(b", ");
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            out.push(b'{');
            for (i, (k, v)) in sorted_entries(map).into_iter().enumerate() {
                if i > 0 {
                    out.extend_from_slice(b", ");
                }
                write_string(out, k);
                out.extend_from_slice(b": ");
                write_value(out, v);
            }
            out.push(b'}');
        }
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\u{0c}' => out.extend_from_slice(b"\\f"),
            ' '..='~' => out.push(c as u8),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.extend_from_slice(format!("\\u{unit:04x}").as_bytes());
                }
            }
        }
    }
    out.push(b'"');
}
