//! Field-by-field comparison of two summaries.

use std::collections::BTreeSet;

use serde_json::Value;
use vault_protocol::{DiffEntry, Severity, Summary};

/// Top-level summary fields whose drift changes the decision itself.
pub const CRITICAL_FIELDS: &[&str] = &["outcome", "confidence", "kind"];

/// Severity of a mismatch at `path`, decided by its top-level field.
pub fn severity_for(path: &str) -> Severity {
    let head = path.split(['.', '[']).next().unwrap_or(path);
    if CRITICAL_FIELDS.contains(&head) {
        Severity::Critical
    } else {
        Severity::Warn
    }
}

/// Diff `actual` against `expected`.
///
/// Entries come out in sorted path order (object keys are compared sorted,
/// array elements by index), so identical inputs always give identical output.
/// A value present on only one side is compared against `null`.
pub fn diff_summaries(expected: &Summary, actual: &Summary) -> Vec<DiffEntry> {
    let expected = serde_json::to_value(expected).unwrap_or(Value::Null);
    let actual = serde_json::to_value(actual).unwrap_or(Value::Null);
    let mut entries = Vec::new();
    walk("", &expected, &actual, &mut entries);
    entries
}

fn walk(path: &str, expected: &Value, actual: &Value, out: &mut Vec<DiffEntry>) {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => {
            let keys: BTreeSet<&String> = e.keys().chain(a.keys()).collect();
            for key in keys {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                walk(
                    &child,
                    e.get(key).unwrap_or(&Value::Null),
                    a.get(key).unwrap_or(&Value::Null),
                    out,
                );
            }
        }
        (Value::Array(e), Value::Array(a)) => {
            for i in 0..e.len().max(a.len()) {
                walk(
                    &format!("{}[{}]", path, i),
                    e.get(i).unwrap_or(&Value::Null),
                    a.get(i).unwrap_or(&Value::Null),
                    out,
                );
            }
        }
        (e, a) if e != a => {
            let path = if path.is_empty() { "summary" } else { path };
            out.push(DiffEntry::new(path, e.clone(), a.clone(), severity_for(path)));
        }
        _ => {}
    }
}
