//! JSON merge strategies used by the object store

use crate::error::{Result, RudderError};
use serde_json::Value;

/// Merge `src` onto `dst`, letting every non-empty source value win.
///
/// Objects merge key by key, recursively. Any other non-empty value
/// (including arrays) replaces the destination outright. Empty source values
/// (`null`, `false`, `0`, `""`, `[]`, `{}`) leave the destination untouched,
/// so a partial object only has to carry the fields it changes.
pub fn merge_override(dst: &mut Value, src: Value) {
    if is_empty(&src) {
        return;
    }

    match (dst, src) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                if is_empty(&value) {
                    continue;
                }
                match dst.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_override(existing, value);
                    }
                    _ => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (dst, src) => *dst = src,
    }
}

/// Overlay the keys present in `src` onto `dst`.
///
/// Present keys overwrite, including an explicit `null`; nested objects are
/// overlaid recursively; absent keys are left alone. `src` must be an object.
pub fn overlay(dst: &mut Value, src: Value) -> Result<()> {
    let Value::Object(src) = src else {
        return Err(RudderError::Decode(format!(
            "status patch must be a JSON object, got {}",
            type_name(&src)
        )));
    };

    if !dst.is_object() {
        *dst = Value::Object(Default::default());
    }
    let Some(dst) = dst.as_object_mut() else {
        return Ok(());
    };

    for (key, value) in src {
        match dst.get_mut(&key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                overlay(existing, value)?;
            }
            _ => {
                dst.insert(key, value);
            }
        }
    }

    Ok(())
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
