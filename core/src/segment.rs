//! Sentence segmentation with an escalating extraction window.
//!
//! The [`Segmenter`] asks the [`Extractor`] for the first sentence of a
//! window over the document, then asks the [`BoundaryVerifier`] whether the
//! candidate is a complete sentence. A rejected candidate is retried with a
//! larger window; once the budget is spent the last candidate is returned
//! unverified rather than blocking.

use std::sync::Arc;

use crate::completion::{CompletionError, CompletionRequest, CompletionService, RequestKind};
use crate::config::SegmentationConfig;
use crate::decode::{decode, response_schema};
use crate::error::StageError;
use crate::prompts;
use crate::types::BoundaryVerdict;

/// Candidate first sentence of a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceCandidate {
    /// The consumed text with surrounding whitespace trimmed.
    pub sentence: String,
    /// Byte offset in the searched text where consumption stops.
    pub end_index: usize,
    /// Whitespace between the sentence and `end_index`.
    pub trailing_whitespace: String,
    /// The extractor's answer was not found verbatim in the window.
    pub drifted: bool,
}

/// Result of the segmentation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The sentence to correct.
    pub sentence: String,
    /// Byte offset in the segmented text where the next sentence starts.
    pub end_index: usize,
    /// Whitespace between the sentence and `end_index`.
    pub trailing_whitespace: String,
    /// Whether the boundary verifier accepted the sentence.
    pub verified: bool,
    /// Extraction attempts spent.
    pub attempts: usize,
    /// Whether the returned candidate came from a drifted extraction.
    pub drifted: bool,
}

/// Returns the first `max_chars` characters of `text`.
///
/// Never splits a code point.
#[must_use]
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}

/// Pulls the first sentence off the front of a document.
#[derive(Clone)]
pub struct Extractor {
    service: Arc<dyn CompletionService>,
}

impl Extractor {
    /// Creates an extractor backed by `service`.
    #[must_use]
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Extracts the first sentence of the first `max_chunk` characters of `text`.
    ///
    /// If the model's answer is not found verbatim in the window, the whole
    /// window is consumed and becomes the candidate. Text the model skipped
    /// in front of its answer is kept in the candidate, so every consumed
    /// character ends up in some sentence.
    pub async fn extract(
        &self,
        text: &str,
        max_chunk: usize,
    ) -> Result<SentenceCandidate, CompletionError> {
        let chunk = char_prefix(text, max_chunk.max(1));
        tracing::debug!(chars = max_chunk, "Extracting sentence from chunk:\n{chunk}");

        let request =
            CompletionRequest::text(RequestKind::ExtractSentence, prompts::extract_sentence(chunk));
        let raw = self.service.complete(&request).await?;
        tracing::debug!("LLM extracted sentence:\n{raw}");

        let answer = raw.trim();
        let found = if answer.is_empty() {
            None
        } else {
            chunk.find(answer)
        };

        let (end_index, drifted) = match found {
            Some(idx) => {
                if !chunk[..idx].trim().is_empty() {
                    tracing::warn!(
                        event = "boundary_prefix_folded",
                        skipped = idx,
                        "boundary_prefix_folded: extractor skipped text before its sentence"
                    );
                }
                (idx + answer.len(), false)
            }
            None => {
                tracing::warn!(
                    event = "boundary_drift",
                    chunk_bytes = chunk.len(),
                    "Could not find exact sentence match in chunk: Response was:\n{raw}"
                );
                (chunk.len(), true)
            }
        };

        let consumed = &chunk[..end_index];
        let sentence = consumed.trim();
        let trailing = &consumed[consumed.trim_end().len()..];

        Ok(SentenceCandidate {
            sentence: sentence.to_string(),
            end_index,
            trailing_whitespace: trailing.to_string(),
            drifted,
        })
    }
}

/// Judges whether a candidate is one complete sentence.
#[derive(Clone)]
pub struct BoundaryVerifier {
    service: Arc<dyn CompletionService>,
}

impl BoundaryVerifier {
    /// Creates a verifier backed by `service`.
    #[must_use]
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Returns the verifier's judgment. Undecodable answers count as invalid.
    pub async fn verify(&self, sentence: &str) -> Result<bool, CompletionError> {
        tracing::debug!("Double checking preprocessing for sentence: {sentence}");

        let request = CompletionRequest::structured(
            RequestKind::VerifyBoundary,
            prompts::verify_boundary(sentence),
            response_schema::<BoundaryVerdict>(),
        );
        let raw = self.service.complete(&request).await?;

        match decode::<BoundaryVerdict>(&raw) {
            Ok(verdict) => {
                tracing::debug!(is_valid = verdict.is_valid, "Verification result: {raw}");
                Ok(verdict.is_valid)
            }
            Err(e) => {
                tracing::warn!(
                    event = "boundary_verdict_malformed",
                    error = %e,
                    "boundary_verdict_malformed"
                );
                Ok(false)
            }
        }
    }
}

/// The segmentation loop.
#[derive(Clone)]
pub struct Segmenter {
    extractor: Extractor,
    verifier: BoundaryVerifier,
    config: SegmentationConfig,
}

impl Segmenter {
    /// Creates a segmenter whose extractor and verifier share `service`.
    #[must_use]
    pub fn new(service: Arc<dyn CompletionService>, config: SegmentationConfig) -> Self {
        Self {
            extractor: Extractor::new(Arc::clone(&service)),
            verifier: BoundaryVerifier::new(service),
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Finds the first sentence of `document`.
    ///
    /// Returns after at most `max_attempts` extractions. When no candidate is
    /// verified, the last one is returned with `verified == false`.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] when a model call itself fails.
    pub async fn segment(&self, document: &str) -> Result<Segment, StageError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let bound = self.config.bound_for_attempt(attempt);
            tracing::debug!(attempt, max_attempts, bound, "Attempt {attempt}/{max_attempts} with length bound {bound}");

            let candidate = self
                .extractor
                .extract(document, bound)
                .await
                .map_err(|e| StageError::new(RequestKind::ExtractSentence, e))?;

            let verified = self
                .verifier
                .verify(&candidate.sentence)
                .await
                .map_err(|e| StageError::new(RequestKind::VerifyBoundary, e))?;

            if verified || attempt >= max_attempts {
                if !verified {
                    tracing::warn!(
                        event = "boundary_unverified",
                        attempts = attempt,
                        "All verification attempts failed: Using sentence as is"
                    );
                }
                return Ok(Segment {
                    sentence: candidate.sentence,
                    end_index: candidate.end_index,
                    trailing_whitespace: candidate.trailing_whitespace,
                    verified,
                    attempts: attempt,
                    drifted: candidate.drifted,
                });
            }

            tracing::warn!(attempt, bound, "Verification failed: Attempt {attempt}");
            attempt += 1;
        }
    }
}
