//! Dotted-path access to environment fields for `config get/set`.
//!
//! Paths follow the on-disk layout (`chain-id`, `registry.ocr.delta-progress`,
//! `participants.0.image`). Segments match case-insensitively and ignore
//! `-`/`_`, so `link-token.address` finds `[LinkToken] address`.

use toml::Value;

use crate::error::{StateError, StateResult};
use crate::types::Environment;

fn normalize(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Table(table) => {
            let wanted = normalize(segment);
            table
                .iter()
                .find(|(k, _)| normalize(k) == wanted)
                .map(|(_, v)| v)
        }
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    // Arrays of tables (`participants.0`) are addressed by index.
    match value {
        Value::Table(table) => {
            let wanted = normalize(segment);
            table
                .iter_mut()
                .find(|(k, _)| normalize(k) == wanted)
                .map(|(_, v)| v)
        }
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

fn to_value(env: &Environment) -> StateResult<Value> {
    Value::try_from(env).map_err(|e| StateError::Invariant(e.to_string()))
}

/// Render the field at `key`. Strings are returned without quotes.
pub fn get_field(env: &Environment, key: &str) -> StateResult<String> {
    let root = to_value(env)?;
    let mut current = &root;
    for segment in key.split('.') {
        current = child(current, segment).ok_or_else(|| StateError::UnknownKey(key.to_string()))?;
    }
    Ok(match current {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Parse `raw` as a TOML literal, falling back to a plain string.
fn parse_literal(raw: &str) -> Value {
    toml::from_str::<toml::Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn coerce(key: &str, existing: Option<&Value>, raw: &str) -> StateResult<Value> {
    let invalid = |reason: String| StateError::InvalidValue {
        key: key.to_string(),
        reason,
    };
    match existing {
        Some(Value::String(_)) => Ok(Value::String(raw.to_string())),
        Some(Value::Integer(_)) => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| invalid(e.to_string())),
        Some(Value::Float(_)) => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| invalid(e.to_string())),
        Some(Value::Boolean(_)) => raw
            .parse::<bool>()
            .map(Value::Boolean)
            .map_err(|e| invalid(e.to_string())),
        Some(Value::Array(_)) => match parse_literal(raw) {
            array @ Value::Array(_) => Ok(array),
            _ => Err(invalid(format!("expected an array, got {raw}"))),
        },
        Some(Value::Table(_)) => Err(invalid("cannot replace a whole table".to_string())),
        Some(Value::Datetime(_)) | None => Ok(parse_literal(raw)),
    }
}

/// Return a copy of `env` with the field at `key` set to `raw`.
///
/// The new value is parsed with the type of the existing one. A missing
/// leaf inside an existing table is added; the result must still
/// deserialize as an [`Environment`].
pub fn set_field(env: &Environment, key: &str, raw: &str) -> StateResult<Environment> {
    let mut root = to_value(env)?;
    let segments: Vec<&str> = key.split('.').collect();
    let (leaf, parents) = segments
        .split_last()
        .ok_or_else(|| StateError::UnknownKey(key.to_string()))?;

    let mut current = &mut root;
    for segment in parents {
        current =
            child_mut(current, segment).ok_or_else(|| StateError::UnknownKey(key.to_string()))?;
    }

    let new_value = coerce(key, child(current, leaf), raw)?;
    match current {
        Value::Table(table) => {
            let wanted = normalize(leaf);
            let existing_key = table.keys().find(|k| normalize(k) == wanted).cloned();
            table.insert(existing_key.unwrap_or_else(|| leaf.to_string()), new_value);
        }
        Value::Array(items) => match leaf.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => *slot = new_value,
            None => return Err(StateError::UnknownKey(key.to_string())),
        },
        _ => return Err(StateError::UnknownKey(key.to_string())),
    }

    root.try_into::<Environment>().map_err(|e| StateError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
