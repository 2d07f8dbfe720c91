//! Total conversions from loosely typed feed values into column types.
//!
//! The feed mixes strings, numbers, booleans and nulls for the same field
//! depending on vehicle state. Every function here returns `None` instead of
//! failing: a value that cannot be read is stored as NULL.

use serde_json::Value;

/// Values the feed uses to mean "no reading".
fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == "null",
        _ => false,
    }
}

pub fn coerce_float(value: Option<&Value>) -> Option<f64> {
    let value = value.filter(|v| !is_absent(v))?;
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub fn coerce_int(value: Option<&Value>) -> Option<i64> {
    let value = value.filter(|v| !is_absent(v))?;
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            // Whole-number truncation, as the feed sometimes sends counters as floats
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn coerce_bool(value: Option<&Value>) -> Option<bool> {
    let value = value.filter(|v| !is_absent(v))?;
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(matches!(
            s.to_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        )),
        Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::Array(a) => Some(!a.is_empty()),
        Value::Object(o) => Some(!o.is_empty()),
        Value::Null => None,
    }
}

/// Text columns: strings pass through, scalars are stringified.
pub fn coerce_text(value: Option<&Value>) -> Option<String> {
    let value = value.filter(|v| !is_absent(v))?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
