use serde_yaml::{Mapping, Value};

use crate::error::{ValidationError, ValidationErrors};

/// Parses a `key.path=value` override.
pub fn parse_override(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((path, value)) if !path.trim().is_empty() => {
            Ok((path.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid override `{text}`, expected key.path=value")),
    }
}

/// Applies dotted-path overrides to a raw document before it is deserialized.
///
/// Missing intermediate mappings are created. Numeric segments index into
/// sequences. Values are parsed as YAML scalars, so `--set limits.max_total_runs=4`
/// sets a number.
pub fn apply_overrides(
    document: &mut Value,
    overrides: &[(String, String)],
) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    for (path, raw) in overrides {
        if let Err(message) = apply_one(document, path, parse_scalar(raw)) {
            errors.push(ValidationError::new(path.as_str(), message));
        }
    }
    ValidationErrors::from(errors).into_result()
}

fn parse_scalar(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

fn apply_one(document: &mut Value, path: &str, value: Value) -> Result<(), String> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = document;

    for (depth, segment) in segments.iter().enumerate() {
        let last = depth + 1 == segments.len();
        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        current = match current {
            Value::Mapping(mapping) => {
                let key = Value::String(segment.to_string());
                if last {
                    mapping.insert(key, value);
                    return Ok(());
                }
                mapping.entry(key).or_insert(Value::Null)
            }
            Value::Sequence(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| format!("`{segment}` is not an index into a list"))?;
                let slot = items
                    .get_mut(index)
                    .ok_or_else(|| format!("index {index} is out of range"))?;
                if last {
                    *slot = value;
                    return Ok(());
                }
                slot
            }
            _ => {
                return Err(format!(
                    "cannot set `{segment}` on a scalar value at `{}`",
                    segments[..depth].join(".")
                ));
            }
        };
    }
    Ok(())
}
