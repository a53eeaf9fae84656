//! Lenient decoding of structured model output.
//!
//! Model output is decoded in a fixed order of steps, each of which can fail
//! with a [`DecodeError`]:
//!
//! 1. [`extract_json_value`] - locate the JSON object (fenced block, then
//!    balanced braces)
//! 2. [`normalize_against_schema`] - coerce `"true"`/`"0.9"` strings where the
//!    schema wants booleans or numbers
//! 3. [`schema_errors`] - validate against the response schema
//! 4. serde deserialization into the target record

pub mod error;
pub mod locate;
pub mod normalize;
pub mod schema;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

pub use error::DecodeError;
pub use locate::extract_json_value;
pub use normalize::normalize_against_schema;
pub use schema::{response_schema, schema_errors};

/// Decodes raw model output into `T`.
///
/// # Examples
///
/// ```
/// use gramtex_core::decode::decode;
/// use gramtex_core::types::QaVerdict;
///
/// let raw = r#"```json
/// {"is_valid": "true", "maintains_meaning": true, "technical_accuracy": true}
/// ```"#;
/// let verdict: QaVerdict = decode(raw).unwrap();
/// assert!(verdict.is_accepted());
/// assert!(verdict.concerns.is_empty());
/// ```
pub fn decode<T>(raw: &str) -> Result<T, DecodeError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = response_schema::<T>();
    let mut value = extract_json_value(raw)?;
    normalize_against_schema(&mut value, &schema);

    let errors = schema_errors(&schema, &value);
    if !errors.is_empty() {
        return Err(DecodeError::SchemaMismatch { errors });
    }

    Ok(serde_json::from_value(value)?)
}
