use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("Invalid Ollama host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Ollama returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Ollama reported an error: {0}")]
    Api(String),

    #[error("Ollama response has no {field}")]
    MissingContent { field: &'static str },

    #[error("Response body is not JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Unparseable Ollama version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },
}
