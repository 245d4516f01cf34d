//! Canonical signatures of report requests.
//!
//! A signature looks like `balance_sheet?"as_of"="2024-01-01"&"currency"="USD"`:
//! the report type, then every parameter sorted by key. Keys and values are
//! rendered as canonical JSON (nested objects sorted by key), so the quotes
//! make `=` and `&` unambiguous delimiters.

use serde_json::Value;

use super::types::{ReportParams, ReportType};

/// Computes the canonical signature of a report request.
///
/// Two parameter maps with equal keys and values produce the same signature
/// regardless of insertion order.
#[must_use]
pub fn signature_of(report_type: ReportType, parameters: &ReportParams) -> String {
    let mut pairs: Vec<(&String, &Value)> = parameters.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let mut signature = String::from(report_type.as_str());
    signature.push('?');
    for (i, (key, value)) in pairs.into_iter().enumerate() {
        if i > 0 {
            signature.push('&');
        }
        write_string(&mut signature, key);
        signature.push('=');
        write_canonical(&mut signature, value);
    }
    signature
}

/// Deep, order-independent equality of two parameter maps.
#[must_use]
pub fn params_equal(left: &ReportParams, right: &ReportParams) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .all(|(key, value)| right.get(key).is_some_and(|other| values_equal(value, other)))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Object(a), Value::Object(b)) => params_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => left == right,
    }
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<(&String, &Value)> = map.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, nested)) in pairs.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_canonical(out, nested);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::String(s) => write_string(out, s),
        // Null, Bool and Number have a single JSON rendering
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push_str(&Value::String(s.to_owned()).to_string());
}
