//! Incremental grammar correction for LaTeX documents.
//!
//! The pipeline pulls one sentence at a time off the front of a document,
//! verifies the sentence boundary, asks a model to propose a correction and
//! asks it again to validate that correction. Every retry loop is bounded and
//! falls back to the original text when its budget is spent, so the output
//! always covers the whole input.
//!
//! Model backends plug in through [`completion::CompletionService`].

pub mod audit;
pub mod completion;
pub mod config;
pub mod correct;
pub mod decode;
pub mod driver;
pub mod error;
pub mod prompts;
pub mod segment;
pub mod types;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
pub(crate) mod testing;

/// Common traits and types for ergonomic usage of the pipeline.
pub mod prelude {
    pub use crate::audit::{AuditSink, ChangeLog, JsonLinesSink, MultiSink, NullSink, Progress};
    pub use crate::completion::{
        CompletionError, CompletionRequest, CompletionService, RequestKind,
    };
    pub use crate::config::{CorrectionConfig, PipelineConfig, SegmentationConfig};
    pub use crate::correct::Corrector;
    pub use crate::driver::{assemble, DocumentDriver, DocumentReport, SegmentReport};
    pub use crate::error::PipelineError;
    pub use crate::segment::Segmenter;
    pub use crate::types::{QaVerdict, ResultEntry};
}
