//! Deterministic JSON canonicalization.
//!
//! The canonical form is what gets signed and what a verifier rebuilds, so
//! two structurally equal values must always produce the same string:
//!
//! - `null` serializes as `null`
//! - arrays keep their order, elements canonicalized and joined with `,`
//! - object keys are sorted (UTF-16 code unit order, matching a browser's
//!   default `Array.prototype.sort`) and emitted as `"key":value`
//! - scalars use their standard JSON literal form; integral floats in the
//!   safe-integer range print without a fractional part
//!
//! Absent members are the Rust counterpart of `undefined`: wire types skip
//! `None` fields when serializing, so they never reach the canonical form.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::Result;

/// Largest integer a browser can represent exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Canonicalize a JSON value. Pure and total over acyclic values.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Serialize `value` with serde and canonicalize the result.
pub fn canonicalize_serializable<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(canonicalize(&value))
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| utf16_cmp(a, b));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

fn write_number(n: &Number, out: &mut String) {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
                // -0 prints as 0 in JSON.stringify
                out.push_str(&format!("{}", f as i64));
                return;
            }
        }
    }
    out.push_str(&n.to_string());
}

fn write_string(s: &str, out: &mut String) {
    // serde_json escaping matches JSON.stringify for well-formed strings
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
    }
}

fn utf16_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}
