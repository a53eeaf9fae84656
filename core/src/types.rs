//! Structured model responses and per-sentence results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Concern recorded when no correction survived the retry budget.
pub const FAILED_CORRECTION_CONCERN: &str = "Failed to find valid correction";

/// Boundary verifier answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BoundaryVerdict {
    /// Whether the candidate is one complete sentence.
    pub is_valid: bool,
}

/// A proposed grammar correction for one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CorrectionProposal {
    /// The sentence with grammar corrected.
    pub corrected_sentence: String,
    /// Self-reported certainty in `[0, 1]`. Not range-checked.
    pub confidence: f64,
    /// What was changed and why.
    #[serde(default)]
    pub explanation: String,
}

/// Quality-assurance judgment of an original/corrected pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QaVerdict {
    /// The correction is a valid grammar improvement.
    pub is_valid: bool,
    /// The original meaning is preserved.
    pub maintains_meaning: bool,
    /// Notation, LaTeX commands and citations are intact.
    pub technical_accuracy: bool,
    /// Free-form reviewer concerns.
    #[serde(default)]
    pub concerns: Vec<String>,
}

impl QaVerdict {
    /// A verdict accepts a correction only when all three flags hold.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.is_valid && self.maintains_meaning && self.technical_accuracy
    }
}

/// What happened during one outer correction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The proposal could not be decoded.
    MalformedProposal {
        /// Decode error message.
        reason: String,
    },
    /// The proposer was not confident enough; QA was skipped.
    LowConfidence {
        /// Reported confidence.
        confidence: f64,
    },
    /// QA never produced a structurally complete verdict.
    QaUnavailable {
        /// QA calls spent on this proposal.
        qa_attempts: usize,
    },
    /// QA rejected the proposal.
    Rejected {
        /// Concerns listed by QA.
        concerns: Vec<String>,
    },
    /// QA accepted the proposal.
    Accepted,
}

/// Record of a single outer correction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt_number: usize,
    /// How the attempt ended.
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Final result for one processed sentence.
///
/// `final_text` is either a QA-accepted correction or the original sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Sentence as it appeared in the source.
    pub original: String,
    /// Sentence as it appears in the output.
    #[serde(rename = "final")]
    pub final_text: String,
    /// `true` only for an accepted correction that differs from the original.
    pub has_changes: bool,
    /// QA concerns, or the failure marker on fallback.
    pub qa_concerns: Vec<String>,
    /// Character count of `original`.
    pub length: usize,
    /// Proposer explanation for an accepted correction, empty otherwise.
    pub explanation: String,
    /// Every outer attempt spent on this sentence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,
}

impl ResultEntry {
    /// Builds the entry for an accepted correction.
    #[must_use]
    pub fn accepted(
        original: &str,
        proposal: CorrectionProposal,
        verdict: QaVerdict,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            original: original.to_string(),
            has_changes: proposal.corrected_sentence != original,
            final_text: proposal.corrected_sentence,
            qa_concerns: verdict.concerns,
            length: original.chars().count(),
            explanation: proposal.explanation,
            attempts,
        }
    }

    /// Builds the exhaustion fallback: the original text, unchanged.
    #[must_use]
    pub fn unchanged(original: &str, attempts: Vec<AttemptRecord>) -> Self {
        Self {
            original: original.to_string(),
            final_text: original.to_string(),
            has_changes: false,
            qa_concerns: vec![FAILED_CORRECTION_CONCERN.to_string()],
            length: original.chars().count(),
            explanation: String::new(),
            attempts,
        }
    }
}
