//! Schema-guided coercion of stringly-typed values.

use serde_json::{Number, Value};

/// Coerces string scalars to the type the schema declares for them.
///
/// Models regularly answer `"is_valid": "true"` or `"confidence": "0.9"`.
/// Only properties whose schema `type` is `boolean`, `number` or `integer`
/// are touched; strings declared as strings stay strings.
pub fn normalize_against_schema(value: &mut Value, schema: &Value) {
    match value {
        Value::Object(map) => {
            let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
                return;
            };
            for (key, child) in map.iter_mut() {
                if let Some(child_schema) = properties.get(key) {
                    normalize_against_schema(child, child_schema);
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for item in items {
                    normalize_against_schema(item, item_schema);
                }
            }
        }
        Value::String(text) => {
            if let Some(coerced) = coerce_scalar(text, schema) {
                *value = coerced;
            }
        }
        _ => {}
    }
}

fn coerce_scalar(text: &str, schema: &Value) -> Option<Value> {
    let trimmed = text.trim();

    if declares_type(schema, "string") {
        return None;
    }

    if declares_type(schema, "boolean") {
        if trimmed.eq_ignore_ascii_case("true") {
            return Some(Value::Bool(true));
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Some(Value::Bool(false));
        }
    }

    if declares_type(schema, "integer") {
        if let Ok(int) = trimmed.parse::<i64>() {
            return Some(Value::Number(int.into()));
        }
    }

    if declares_type(schema, "number") {
        if let Ok(int) = trimmed.parse::<i64>() {
            return Some(Value::Number(int.into()));
        }
        if let Some(float) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
            return Some(Value::Number(float));
        }
    }

    None
}

/// `type` may be a single name or a list of names.
fn declares_type(schema: &Value, name: &str) -> bool {
    match schema.get("type") {
        Some(Value::String(ty)) => ty == name,
        Some(Value::Array(types)) => types.iter().any(|ty| ty.as_str() == Some(name)),
        _ => false,
    }
}
