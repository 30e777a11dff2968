use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Constraint attached to a single details field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationRule {
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Boolean,
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    OneOf {
        values: Vec<String>,
    },
}

impl ValidationRule {
    /// Whether `value` satisfies the rule. Values are inspected, never rewritten.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ValidationRule::Integer { min, max } => integer_value(value).is_some_and(|number| {
                min.map_or(true, |min| number >= min) && max.map_or(true, |max| number <= max)
            }),
            ValidationRule::Number { min, max } => numeric_value(value).is_some_and(|number| {
                min.map_or(true, |min| number >= min) && max.map_or(true, |max| number <= max)
            }),
            ValidationRule::Boolean => boolean_value(value).is_some(),
            ValidationRule::String { max_length } => match value {
                Value::String(text) => max_length.map_or(true, |max| text.chars().count() <= max),
                _ => false,
            },
            ValidationRule::OneOf { values } => match value {
                Value::String(text) => values.iter().any(|allowed| allowed == text),
                _ => false,
            },
        }
    }
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Integer { min, max } => {
                f.write_str("integer")?;
                write_bounds(f, min.map(|v| v.to_string()), max.map(|v| v.to_string()))
            }
            ValidationRule::Number { min, max } => {
                f.write_str("number")?;
                write_bounds(f, min.map(|v| v.to_string()), max.map(|v| v.to_string()))
            }
            ValidationRule::Boolean => f.write_str("boolean"),
            ValidationRule::String { max_length: None } => f.write_str("string"),
            ValidationRule::String {
                max_length: Some(max),
            } => write!(f, "string, at most {max} characters"),
            ValidationRule::OneOf { values } => write!(f, "one of [{}]", values.join(", ")),
        }
    }
}

fn write_bounds(
    f: &mut fmt::Formatter<'_>,
    min: Option<String>,
    max: Option<String>,
) -> fmt::Result {
    if let Some(min) = min {
        write!(f, ", minimum {min}")?;
    }
    if let Some(max) = max {
        write!(f, ", maximum {max}")?;
    }
    Ok(())
}

/// Integer reading of a JSON value; integral floats and integer strings qualify.
pub(crate) fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
                .map(|float| float as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Numeric reading of a JSON value; numeric strings qualify.
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Accepted boolean spellings: `true`/`false`, `0`/`1`, and their string forms.
pub(crate) fn boolean_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
