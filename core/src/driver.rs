//! Document driver: segment, correct, append, advance.

use std::ops::Range;
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::audit::{AuditSink, NullSink, Progress, RunStart, RunSummary};
use crate::completion::CompletionService;
use crate::config::PipelineConfig;
use crate::correct::Corrector;
use crate::error::{PipelineError, StageError};
use crate::segment::{Segment, Segmenter};
use crate::types::ResultEntry;

/// One processed sentence and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceReport {
    /// 1-based position in the document.
    pub index: usize,
    /// Byte range of the source consumed for this sentence, whitespace included.
    pub span: Range<usize>,
    /// Whitespace in the span before the sentence.
    pub leading_whitespace: String,
    /// Whitespace in the span after the sentence.
    pub trailing_whitespace: String,
    /// Whether the boundary verifier accepted the sentence.
    pub boundary_verified: bool,
    /// The correction result.
    pub entry: ResultEntry,
}

/// Result of a full document run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    /// Identifier of the run.
    pub run_id: Uuid,
    /// Characters in the input document.
    pub total_chars: usize,
    /// Characters covered by sentence spans.
    pub consumed_chars: usize,
    /// Whitespace left after the last sentence.
    pub trailing_whitespace: String,
    /// Sentences in document order.
    pub sentences: Vec<SentenceReport>,
}

impl DocumentReport {
    /// Result entries in document order.
    pub fn entries(&self) -> impl Iterator<Item = &ResultEntry> {
        self.sentences.iter().map(|s| &s.entry)
    }

    /// Number of sentences whose output differs from the source.
    #[must_use]
    pub fn changed_count(&self) -> usize {
        self.entries().filter(|e| e.has_changes).count()
    }

    /// The corrected document: final sentences joined by single spaces.
    #[must_use]
    pub fn assemble(&self) -> String {
        join_finals(self.entries())
    }

    /// The corrected document with the source's whitespace layout.
    ///
    /// Each sentence keeps the whitespace that surrounded it, so paragraph
    /// breaks survive. An all-unchanged run reproduces the input exactly.
    #[must_use]
    pub fn assemble_preserving_layout(&self) -> String {
        let mut out = String::new();
        for sentence in &self.sentences {
            out.push_str(&sentence.leading_whitespace);
            out.push_str(&sentence.entry.final_text);
            out.push_str(&sentence.trailing_whitespace);
        }
        out.push_str(&self.trailing_whitespace);
        out
    }
}

/// Joins the `final` fields of `entries` with single spaces.
///
/// # Examples
///
/// ```
/// use gramtex_core::driver::assemble;
/// use gramtex_core::types::ResultEntry;
///
/// let entries = [
///     ResultEntry::unchanged("Sentence one.", vec![]),
///     ResultEntry::unchanged("Sentence two.", vec![]),
/// ];
/// assert_eq!(assemble(&entries), "Sentence one. Sentence two.");
/// ```
#[must_use]
pub fn assemble(entries: &[ResultEntry]) -> String {
    join_finals(entries.iter())
}

fn join_finals<'a>(entries: impl Iterator<Item = &'a ResultEntry>) -> String {
    entries
        .map(|e| e.final_text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Segmentation result of the segmentation-only mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentReport {
    /// 1-based position in the document.
    pub index: usize,
    /// Byte range of the source consumed.
    pub span: Range<usize>,
    /// The sentence text.
    pub sentence: String,
    /// Character count of `sentence`.
    pub length: usize,
    /// Whether the boundary verifier accepted the sentence.
    pub verified: bool,
    /// Extraction attempts spent.
    pub attempts: usize,
    /// Whether extraction drifted and consumed the whole window.
    pub drifted: bool,
}

/// Read position over the source document.
///
/// Only moves forward.
struct DocumentCursor<'a> {
    document: &'a str,
    position: usize,
}

impl<'a> DocumentCursor<'a> {
    const fn new(document: &'a str) -> Self {
        Self {
            document,
            position: 0,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.document[self.position..]
    }

    fn is_exhausted(&self) -> bool {
        self.remaining().trim().is_empty()
    }

    /// Splits the remaining text into leading whitespace and content.
    fn next_content(&self) -> (&'a str, &'a str) {
        let rest = self.remaining();
        let content = rest.trim_start();
        (&rest[..rest.len() - content.len()], content)
    }

    /// Consumes `bytes` bytes and returns the consumed range.
    fn advance(&mut self, bytes: usize) -> Range<usize> {
        let end = (self.position + bytes).min(self.document.len());
        let span = self.position..end;
        self.position = end;
        span
    }
}

/// Runs the full pipeline over one document, sentence by sentence.
pub struct DocumentDriver {
    segmenter: Segmenter,
    corrector: Corrector,
    sink: Box<dyn AuditSink + Send + Sync>,
}

impl DocumentDriver {
    /// Creates a driver with no audit sink.
    #[must_use]
    pub fn new(service: Arc<dyn CompletionService>, config: PipelineConfig) -> Self {
        Self {
            segmenter: Segmenter::new(Arc::clone(&service), config.segmentation),
            corrector: Corrector::new(service, config.correction),
            sink: Box::new(NullSink),
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn AuditSink + Send + Sync>) -> Self {
        self.sink = sink;
        self
    }

    /// Corrects `document`.
    ///
    /// Leading whitespace is skipped before each segmentation call, so every
    /// step consumes at least one non-whitespace character and the loop
    /// terminates. Spans cover the document contiguously from byte 0; the
    /// report's `trailing_whitespace` covers the rest.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Stage`] naming the sentence and stage when a
    /// model call fails, or [`PipelineError::Audit`] when the sink fails.
    pub async fn run(&mut self, document: &str) -> Result<DocumentReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let total_chars = document.chars().count();
        tracing::info!(%run_id, total_chars, "Starting grammar correction");

        self.sink.begin(&RunStart {
            run_id,
            started_at: Local::now(),
            total_chars,
        })?;

        let mut cursor = DocumentCursor::new(document);
        let mut sentences = Vec::new();
        let mut consumed_chars = 0;

        while !cursor.is_exhausted() {
            let index = sentences.len() + 1;
            let (leading, content) = cursor.next_content();

            let (segment, entry) = process(&self.segmenter, &self.corrector, content)
                .instrument(tracing::info_span!("sentence", index))
                .await
                .map_err(|e| e.at_sentence(index))?;

            let span = cursor.advance(leading.len() + segment.end_index);
            consumed_chars += document[span.clone()].chars().count();

            log_entry(&entry);

            let report = SentenceReport {
                index,
                span,
                leading_whitespace: leading.to_string(),
                trailing_whitespace: segment.trailing_whitespace,
                boundary_verified: segment.verified,
                entry,
            };
            let progress = Progress {
                sentence: index,
                consumed_chars,
                total_chars,
            };
            tracing::info!(
                "Progress: {:.2}% ({}/{} characters)",
                progress.percent(),
                consumed_chars,
                total_chars
            );

            self.sink.record(&report, &progress)?;
            sentences.push(report);
        }

        let report = DocumentReport {
            run_id,
            total_chars,
            consumed_chars,
            trailing_whitespace: cursor.remaining().to_string(),
            sentences,
        };

        self.sink.finish(&RunSummary {
            run_id,
            sentences: report.sentences.len(),
            changed: report.changed_count(),
            consumed_chars,
            completed_at: Local::now(),
        })?;

        tracing::info!(
            %run_id,
            sentences = report.sentences.len(),
            changed = report.changed_count(),
            "Grammar correction complete"
        );
        Ok(report)
    }

    /// Runs only the segmentation loop over `document`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Stage`] when a model call fails.
    pub async fn segment_document(
        &self,
        document: &str,
    ) -> Result<Vec<SegmentReport>, PipelineError> {
        let mut cursor = DocumentCursor::new(document);
        let mut segments = Vec::new();

        while !cursor.is_exhausted() {
            let index = segments.len() + 1;
            let (leading, content) = cursor.next_content();

            let segment = self
                .segmenter
                .segment(content)
                .instrument(tracing::info_span!("sentence", index))
                .await
                .map_err(|e| e.at_sentence(index))?;

            let span = cursor.advance(leading.len() + segment.end_index);
            tracing::info!(
                verified = segment.verified,
                length = segment.sentence.chars().count(),
                "Processed sentence {index}"
            );
            segments.push(SegmentReport {
                index,
                span,
                length: segment.sentence.chars().count(),
                sentence: segment.sentence,
                verified: segment.verified,
                attempts: segment.attempts,
                drifted: segment.drifted,
            });
        }

        Ok(segments)
    }
}

async fn process(
    segmenter: &Segmenter,
    corrector: &Corrector,
    content: &str,
) -> Result<(Segment, ResultEntry), StageError> {
    let segment = segmenter.segment(content).await?;
    tracing::debug!(
        verified = segment.verified,
        attempts = segment.attempts,
        "Segmented sentence: {}",
        segment.sentence
    );
    let entry = corrector.correct(&segment.sentence).await?;
    Ok((segment, entry))
}

fn log_entry(entry: &ResultEntry) {
    if entry.has_changes {
        tracing::info!("Original: {}", entry.original);
        tracing::info!("Corrected: {}", entry.final_text);
        if !entry.explanation.is_empty() {
            tracing::info!("Explanation: {}", entry.explanation);
        }
    } else {
        tracing::info!("No changes needed for: {}", entry.original);
    }
}
