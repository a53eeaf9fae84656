use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the `gramtex` command line.
#[derive(Debug, Error)]
pub enum AppError {
    /// Error from the Ollama HTTP adapter.
    #[error("Ollama adapter error: {0}")]
    Ollama(#[from] gramtex_ollama::OllamaError),

    /// Error from the command adapter.
    #[error("Command adapter error: {0}")]
    Command(#[from] gramtex_command::CommandError),

    /// The pipeline aborted.
    #[error("{0}")]
    Pipeline(#[from] gramtex_core::error::PipelineError),

    /// The input document could not be read.
    #[error("Cannot read {path}: {source}")]
    Read {
        /// Input path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid combination of command-line options.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Logging could not be initialized.
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anyhow error.
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}
