//! Errors raised while decoding structured model output.

use thiserror::Error;

/// Why a model response could not be turned into a typed record.
///
/// Every variant is a content-quality problem: the caller treats it as a
/// spent attempt and asks again.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Neither a fenced block nor a balanced `{ ... }` object was present.
    #[error("No valid JSON object found in the response")]
    NoJsonObject,

    /// A fenced code block was present but did not contain valid JSON.
    #[error("Found JSON code block but failed to parse it: {source}")]
    FencedBlock {
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// Balanced `{ ... }` regions were present but none parsed as JSON.
    /// Carries the error from the first one.
    #[error("Found a balanced JSON object but failed to parse it: {source}")]
    BalancedObject {
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The embedded JSON is valid but is not an object.
    #[error("Embedded JSON is not an object")]
    NotAnObject,

    /// The object does not match the response schema.
    #[error("Response does not match schema: {}", errors.join("; "))]
    SchemaMismatch {
        /// One message per violation, with the instance path.
        errors: Vec<String>,
    },

    /// Schema-valid JSON that still failed to deserialize.
    #[error("Deserialization to target type failed: {0}")]
    Shape(#[from] serde_json::Error),
}
