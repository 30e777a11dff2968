//! Merge-patch and structural comparison for details documents.

use serde_json::{Map, Number, Value};

use super::domain::DetailsMap;

/// Overlay `patch` onto `base`. Objects merge key-wise at every depth with the patch winning;
/// arrays and scalars in the patch replace the stored value wholesale. Keys only present in
/// `base` are preserved.
pub fn merge_details(base: &DetailsMap, patch: DetailsMap) -> DetailsMap {
    let mut merged = base.clone();
    for (key, incoming) in patch {
        let value = match merged.remove(&key) {
            Some(existing) => merge_value(existing, incoming),
            None => incoming,
        };
        merged.insert(key, value);
    }
    merged
}

fn merge_value(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            Value::Object(merge_details(&existing, incoming))
        }
        (_, incoming) => incoming,
    }
}

/// Canonical form used for equality: object keys sorted at every level and integral floats
/// collapsed to integers, so `{"a":1,"b":2.0}` and `{"b":2,"a":1}` compare equal.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonicalize(value)))
                    .collect::<Map<_, _>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Number(number) => Value::Number(canonical_number(number)),
        other => other.clone(),
    }
}

fn canonical_number(number: &Number) -> Number {
    if number.is_f64() {
        if let Some(float) = number.as_f64() {
            if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
                return Number::from(float as i64);
            }
        }
    }
    number.clone()
}

/// Structural equality of two details documents after canonicalization.
pub fn same_details(left: &DetailsMap, right: &DetailsMap) -> bool {
    canonicalize(&Value::Object(left.clone())) == canonicalize(&Value::Object(right.clone()))
}
