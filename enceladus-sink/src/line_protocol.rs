//! InfluxDB line protocol encoding

use crate::point::{FieldValue, MetricPoint};
use std::fmt::Write;
use std::time::UNIX_EPOCH;

fn escape_into(out: &mut String, value: &str, special: &[char]) {
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

fn escape_measurement(out: &mut String, value: &str) {
    escape_into(out, value, &[',', ' ']);
}

fn escape_key(out: &mut String, value: &str) {
    escape_into(out, value, &[',', '=', ' ']);
}

fn write_field_value(out: &mut String, value: &FieldValue) {
    match value {
        FieldValue::Float(v) => {
            let _ = write!(out, "{}", v);
        }
        FieldValue::Integer(v) => {
            let _ = write!(out, "{}i", v);
        }
        FieldValue::UInteger(v) => {
            let _ = write!(out, "{}u", v);
        }
        FieldValue::Boolean(v) => {
            let _ = write!(out, "{}", v);
        }
        FieldValue::String(v) => {
            out.push('"');
            escape_into(out, v, &['"', '\\']);
            out.push('"');
        }
    }
}

/// Append one line for `point` to `out`.
///
/// Returns `false`, leaving `out` untouched, when the point has no
/// encodable field. Tags with empty values and non-finite floats are left
/// out since the store rejects them.
pub fn encode_point(point: &MetricPoint, out: &mut String) -> bool {
    let fields: Vec<_> = point
        .fields
        .iter()
        .filter(|(_, v)| !matches!(v, FieldValue::Float(f) if !f.is_finite()))
        .collect();
    if fields.is_empty() {
        return false;
    }

    escape_measurement(out, &point.measurement);
    for (key, value) in point.tags.iter().filter(|(_, v)| !v.is_empty()) {
        out.push(',');
        escape_key(out, key);
        out.push('=');
        escape_key(out, value);
    }

    for (i, (key, value)) in fields.into_iter().enumerate() {
        out.push(if i == 0 { ' ' } else { ',' });
        escape_key(out, key);
        out.push('=');
        write_field_value(out, value);
    }

    if let Ok(since_epoch) = point.timestamp.duration_since(UNIX_EPOCH) {
        let _ = write!(out, " {}", since_epoch.as_nanos());
    }
    out.push('\n');
    true
}

/// Encode a batch; returns the body and the number of points skipped
pub fn encode_batch(points: &[MetricPoint]) -> (String, usize) {
    let mut body = String::with_capacity(points.len() * 160);
    let skipped = points
        .iter()
        .filter(|point| !encode_point(point, &mut body))
        .count();
    (body, skipped)
}
