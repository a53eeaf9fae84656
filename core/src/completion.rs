//! The text-completion contract every model backend implements.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Which pipeline stage a completion request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Pull the first sentence off the front of a chunk.
    ExtractSentence,
    /// Judge whether an extracted candidate is a complete sentence.
    VerifyBoundary,
    /// Propose a grammar correction for one sentence.
    ProposeCorrection,
    /// Check that a proposed correction keeps meaning and notation.
    ValidateCorrection,
}

impl RequestKind {
    /// Short stable name used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExtractSentence => "extract",
            Self::VerifyBoundary => "verify",
            Self::ProposeCorrection => "propose",
            Self::ValidateCorrection => "validate",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single prompt sent to the completion backend.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The stage issuing the request.
    pub kind: RequestKind,
    /// Full prompt text.
    pub prompt: String,
    /// JSON schema the response should match, if structured output is wanted.
    pub schema: Option<Value>,
}

impl CompletionRequest {
    /// Creates a free-text request.
    #[must_use]
    pub const fn text(kind: RequestKind, prompt: String) -> Self {
        Self {
            kind,
            prompt,
            schema: None,
        }
    }

    /// Creates a request whose response should be JSON matching `schema`.
    #[must_use]
    pub const fn structured(kind: RequestKind, prompt: String, schema: Value) -> Self {
        Self {
            kind,
            prompt,
            schema: Some(schema),
        }
    }
}

/// Failures of the completion backend itself.
///
/// These are collaborator faults, not content-quality problems, so the
/// pipeline never retries them.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The backend answered but the response carried no usable content field.
    #[error("{backend} response has no content: {detail}")]
    MissingContent {
        /// Backend name.
        backend: String,
        /// What was missing or malformed.
        detail: String,
    },

    /// The request never reached the backend or the connection broke.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The backend did not answer in time.
    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    /// The backend reported an error of its own.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A black-box text-completion service.
///
/// When `request.schema` is set the returned string is expected to be a JSON
/// document matching it, but callers must not rely on that.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Sends one prompt and returns the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[async_trait]
impl<S: CompletionService + ?Sized> CompletionService for Arc<S> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        (**self).complete(request).await
    }
}
