//! Hard failures that abort a document run.

use thiserror::Error;

use crate::completion::{CompletionError, RequestKind};

/// Errors that stop the pipeline.
///
/// Content-quality problems (bad JSON, low confidence, rejected corrections)
/// never show up here; they are absorbed by the retry budgets.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A model call failed at the collaborator level.
    #[error("Sentence {sentence} failed at stage '{stage}': {source}")]
    Stage {
        /// 1-based sentence number.
        sentence: usize,
        /// Stage whose call failed.
        stage: RequestKind,
        /// Backend error.
        #[source]
        source: CompletionError,
    },

    /// The audit sink could not be written.
    #[error("Audit sink failed: {0}")]
    Audit(#[from] std::io::Error),
}

/// A completion failure not yet tied to a sentence number.
///
/// The loops raise this; the driver attaches the sentence number.
#[derive(Debug, Error)]
#[error("stage '{stage}': {source}")]
pub struct StageError {
    /// Stage whose call failed.
    pub stage: RequestKind,
    /// Backend error.
    #[source]
    pub source: CompletionError,
}

impl StageError {
    /// Wraps a completion error raised at `stage`.
    #[must_use]
    pub const fn new(stage: RequestKind, source: CompletionError) -> Self {
        Self { stage, source }
    }

    /// Attaches the sentence number.
    #[must_use]
    pub fn at_sentence(self, sentence: usize) -> PipelineError {
        PipelineError::Stage {
            sentence,
            stage: self.stage,
            source: self.source,
        }
    }
}
