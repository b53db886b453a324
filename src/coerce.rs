//! Explicit coercion into a declared [`ValueKind`].
//!
//! Flags and environment variables arrive as strings and go through
//! [`parse_str`]. Config file values are already typed and go through
//! [`convert`], which accepts the lossless conversions a hand-written config
//! file commonly needs (`port: "8080"`, `ratio: 1`).

use crate::types::{Value, ValueKind};

/// Parse a raw string into a value of `kind`.
pub fn parse_str(kind: ValueKind, raw: &str) -> Result<Value, String> {
    match kind {
        ValueKind::String => Ok(Value::String(raw.to_string())),
        ValueKind::Bool => parse_bool(raw).map(Value::Bool),
        ValueKind::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| format!("'{raw}' is not an integer ({e})")),
        ValueKind::Float => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("'{raw}' is not a float ({e})")),
        ValueKind::Map => Err(format!("'{raw}' cannot be read as a map")),
    }
}

/// Convert an already-typed value into `kind`.
pub fn convert(kind: ValueKind, value: &Value) -> Result<Value, String> {
    if value.kind() == kind {
        return Ok(value.clone());
    }
    match (kind, value) {
        (ValueKind::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
        (ValueKind::Int, Value::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
            // i64::MAX rounds up to 2^63 as f64, so the upper bound is exclusive.
            if *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                Ok(Value::Int(*f as i64))
            } else {
                Err(format!("{f} is out of range for an integer"))
            }
        }
        (ValueKind::String, Value::Bool(_) | Value::Int(_) | Value::Float(_)) => {
            Ok(Value::String(value.to_string()))
        }
        (_, Value::String(s)) => parse_str(kind, s),
        (_, other) => Err(format!("expected {kind}, found {}", other.kind())),
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "on" => Ok(true),
        "false" | "f" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("'{raw}' is not a bool")),
    }
}
