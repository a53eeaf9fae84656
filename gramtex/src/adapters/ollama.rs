use async_trait::async_trait;
use gramtex_core::completion::{CompletionError, CompletionRequest, CompletionService};
use gramtex_ollama::{OllamaClient, OllamaError};

const BACKEND: &str = "ollama";

/// [`CompletionService`] backed by the Ollama chat API.
#[derive(Debug, Clone)]
pub struct OllamaService {
    /// The underlying HTTP client.
    pub client: OllamaClient,
}

impl OllamaService {
    /// Wraps a client.
    #[must_use]
    pub const fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionService for OllamaService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        tracing::trace!(kind = %request.kind, "ollama request");
        self.client
            .chat(&request.prompt, request.schema.as_ref())
            .await
            .map_err(into_completion_error)
    }
}

/// Maps adapter failures onto the pipeline's collaborator-error taxonomy.
pub(crate) fn into_completion_error(error: OllamaError) -> CompletionError {
    match error {
        OllamaError::MissingContent { field } => CompletionError::MissingContent {
            backend: BACKEND.to_string(),
            detail: field.to_string(),
        },
        OllamaError::InvalidBody(e) => CompletionError::MissingContent {
            backend: BACKEND.to_string(),
            detail: format!("response body is not JSON: {e}"),
        },
        OllamaError::Timeout(after) => CompletionError::Timeout(after),
        OllamaError::Http(e) => CompletionError::Transport(e.to_string()),
        other @ (OllamaError::InvalidHost { .. }
        | OllamaError::Status { .. }
        | OllamaError::Api(_)
        | OllamaError::InvalidVersion { .. }) => CompletionError::Backend(other.to_string()),
    }
}
