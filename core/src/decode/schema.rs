//! Response schemas and validation against them.

use schemars::JsonSchema;
use serde_json::Value;

/// JSON schema for `T`, as sent to the completion backend.
#[must_use]
pub fn response_schema<T: JsonSchema>() -> Value {
    schemars::schema_for!(T).to_value()
}

/// Collects every validation error of `instance` against `schema`.
///
/// Returns an empty vector when the instance is valid.
#[must_use]
pub fn schema_errors(schema: &Value, instance: &Value) -> Vec<String> {
    match jsonschema::Validator::new(schema) {
        Ok(validator) => validator
            .iter_errors(instance)
            .map(|error| format!("At path '{}': {}", error.instance_path, error))
            .collect(),
        Err(e) => vec![format!("Schema compilation error: {e}")],
    }
}
