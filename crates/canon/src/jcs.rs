//! JCS serialization per RFC 8785
//!
//! Object members sorted by UTF-16 code units, no insignificant whitespace,
//! shortest string escapes, literal booleans and null. The output must
//! round-trip: parsing the canonical bytes yields a semantically equal
//! value. Pure functions, no I/O.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use thiserror::Error;

/// Errors raised while canonicalizing
#[derive(Error, Debug)]
pub enum CanonError {
    #[error("value cannot be represented canonically: non-finite number")]
    NonFinite,

    #[error("canonical bytes are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Canonical JCS bytes.
///
/// The only way to obtain one is [`canonicalize`], or
/// [`CanonicalBytes::from_stored`] for bytes this engine previously
/// persisted. Digests accept `&CanonicalBytes`, never raw byte slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// The canonical UTF-8 bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The canonical text (JCS output is always valid UTF-8)
    pub fn as_str(&self) -> &str {
        // Construction only ever appends valid UTF-8.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rewrap canonical text read back from storage.
    ///
    /// The verifier re-parses and re-compares these bytes, so a corrupted
    /// column is detected rather than trusted.
    pub fn from_stored(text: String) -> Self {
        Self(text.into_bytes())
    }
}

/// Produce RFC 8785 canonical bytes for a JSON value.
pub fn canonicalize(value: &Value) -> Result<CanonicalBytes, CanonError> {
    let mut out = Vec::with_capacity(128);
    write_value(&mut out, value)?;
    Ok(CanonicalBytes(out))
}

/// Parse canonical bytes back into a value.
pub fn parse(bytes: &CanonicalBytes) -> Result<Value, CanonError> {
    Ok(serde_json::from_slice(bytes.as_bytes())?)
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<(), CanonError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => write_number(out, n)?,
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item)?;
            }
            out.push(b']');
        }
        Value::Object(map) => write_object(out, map)?,
    }
    Ok(())
}

fn write_object(out: &mut Vec<u8>, map: &Map<String, Value>) -> Result<(), CanonError> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by(|a, b| utf16_cmp(a, b));

    out.push(b'{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        write_string(out, key);
        out.push(b':');
        // Key came from the map, value lookup cannot fail.
        if let Some(v) = map.get(*key) {
            write_value(out, v)?;
        }
    }
    out.push(b'}');
    Ok(())
}

/// RFC 8785 §3.2.3: member names sort by their UTF-16 code units.
fn utf16_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

fn write_number(out: &mut Vec<u8>, n: &Number) -> Result<(), CanonError> {
    if let Some(i) = n.as_i64() {
        out.extend_from_slice(i.to_string().as_bytes());
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        out.extend_from_slice(u.to_string().as_bytes());
        return Ok(());
    }
    let f = n.as_f64().ok_or(CanonError::NonFinite)?;
    if !f.is_finite() {
        return Err(CanonError::NonFinite);
    }
    if f == 0.0 {
        // Covers -0.0: ToString(-0) is "0".
        out.push(b'0');
    } else if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        out.extend_from_slice((f as i64).to_string().as_bytes());
    } else {
        out.extend_from_slice(n.to_string().as_bytes());
    }
    Ok(())
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{0008}' => out.extend_from_slice(b"\\b"),
            '\u{0009}' => out.extend_from_slice(b"\\t"),
            '\u{000A}' => out.extend_from_slice(b"\\n"),
            '\u{000C}' => out.extend_from_slice(b"\\f"),
            '\u{000D}' => out.extend_from_slice(b"\\r"),
            c if (c as u32) < 0x20 => {
                let esc = format!("\\u{:04x}", c as u32);
                out.extend_from_slice(esc.as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}
