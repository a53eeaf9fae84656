//! Propose/validate correction loop with two independent retry budgets.
//!
//! One sentence moves through these states:
//!
//! ```text
//! START -> PROPOSING -> (malformed or low confidence: PROPOSING, bounded)
//!                    -> VALIDATING -> accepted: DONE-CHANGED
//!                                  -> rejected or QA unavailable: PROPOSING, bounded
//!       -> budget spent: DONE-UNCHANGED
//! ```
//!
//! The outer budget counts proposals. The inner budget counts QA calls for a
//! single proposal and only absorbs malformed QA output; a well-formed
//! rejection goes straight back to proposing.

use std::sync::Arc;

use crate::completion::{CompletionError, CompletionRequest, CompletionService, RequestKind};
use crate::config::CorrectionConfig;
use crate::decode::{decode, response_schema, DecodeError};
use crate::error::StageError;
use crate::prompts;
use crate::types::{AttemptOutcome, AttemptRecord, CorrectionProposal, QaVerdict, ResultEntry};

/// Asks the model for a grammar correction.
#[derive(Clone)]
pub struct Proposer {
    service: Arc<dyn CompletionService>,
}

impl Proposer {
    /// Creates a proposer backed by `service`.
    #[must_use]
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Requests one proposal.
    ///
    /// The outer `Result` is the backend call, the inner one the decode.
    pub async fn propose(
        &self,
        sentence: &str,
    ) -> Result<Result<CorrectionProposal, DecodeError>, CompletionError> {
        tracing::debug!("Proposing grammar corrections for sentence:\n{sentence}");

        let request = CompletionRequest::structured(
            RequestKind::ProposeCorrection,
            prompts::propose_correction(sentence),
            response_schema::<CorrectionProposal>(),
        );
        let raw = self.service.complete(&request).await?;
        tracing::debug!("Raw LLM response:\n{raw}");

        Ok(decode(&raw))
    }
}

/// Asks the model to judge a correction.
#[derive(Clone)]
pub struct QaValidator {
    service: Arc<dyn CompletionService>,
}

impl QaValidator {
    /// Creates a validator backed by `service`.
    #[must_use]
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Requests one verdict on `original` versus `corrected`.
    pub async fn validate(
        &self,
        original: &str,
        corrected: &str,
    ) -> Result<Result<QaVerdict, DecodeError>, CompletionError> {
        tracing::debug!("Performing QA check:\nOriginal: {original}\nCorrected: {corrected}");

        let request = CompletionRequest::structured(
            RequestKind::ValidateCorrection,
            prompts::validate_correction(original, corrected),
            response_schema::<QaVerdict>(),
        );
        let raw = self.service.complete(&request).await?;
        tracing::debug!("Raw LLM response:\n{raw}");

        Ok(decode(&raw))
    }
}

/// How the inner QA loop ended for one proposal.
enum Review {
    Verdict(QaVerdict),
    Unavailable { qa_attempts: usize },
}

/// The correction loop.
#[derive(Clone)]
pub struct Corrector {
    proposer: Proposer,
    validator: QaValidator,
    config: CorrectionConfig,
}

impl Corrector {
    /// Creates a corrector whose proposer and validator share `service`.
    #[must_use]
    pub fn new(service: Arc<dyn CompletionService>, config: CorrectionConfig) -> Self {
        Self {
            proposer: Proposer::new(Arc::clone(&service)),
            validator: QaValidator::new(service),
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Corrects one sentence.
    ///
    /// The returned entry carries either a QA-accepted correction or, once
    /// the proposal budget is spent, the original sentence with
    /// `has_changes == false`.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] when a model call itself fails.
    pub async fn correct(&self, sentence: &str) -> Result<ResultEntry, StageError> {
        let max_attempts = self.config.max_attempts;
        let mut history = Vec::with_capacity(max_attempts);

        for attempt in 1..=max_attempts {
            tracing::debug!("Attempt {attempt}/{max_attempts}");

            let proposal = match self
                .proposer
                .propose(sentence)
                .await
                .map_err(|e| StageError::new(RequestKind::ProposeCorrection, e))?
            {
                Ok(proposal) => proposal,
                Err(e) => {
                    tracing::warn!(
                        event = "proposal_malformed",
                        attempt,
                        error = %e,
                        "proposal_malformed"
                    );
                    history.push(AttemptRecord {
                        attempt_number: attempt,
                        outcome: AttemptOutcome::MalformedProposal {
                            reason: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            // NaN fails this comparison and is treated as low confidence.
            if proposal.confidence > self.config.confidence_threshold {
                match self.review(sentence, &proposal).await? {
                    Review::Verdict(verdict) if verdict.is_accepted() => {
                        tracing::info!(attempt, "QA check passed successfully");
                        history.push(AttemptRecord {
                            attempt_number: attempt,
                            outcome: AttemptOutcome::Accepted,
                        });
                        return Ok(ResultEntry::accepted(sentence, proposal, verdict, history));
                    }
                    Review::Verdict(verdict) => {
                        tracing::warn!(
                            event = "qa_rejected",
                            attempt,
                            is_valid = verdict.is_valid,
                            maintains_meaning = verdict.maintains_meaning,
                            technical_accuracy = verdict.technical_accuracy,
                            "QA check failed: Concerns were: {:?}",
                            verdict.concerns
                        );
                        history.push(AttemptRecord {
                            attempt_number: attempt,
                            outcome: AttemptOutcome::Rejected {
                                concerns: verdict.concerns,
                            },
                        });
                    }
                    Review::Unavailable { qa_attempts } => {
                        tracing::warn!(
                            event = "qa_unavailable",
                            attempt,
                            qa_attempts,
                            "qa_unavailable: no well-formed verdict for this proposal"
                        );
                        history.push(AttemptRecord {
                            attempt_number: attempt,
                            outcome: AttemptOutcome::QaUnavailable { qa_attempts },
                        });
                    }
                }
            } else {
                tracing::debug!(
                    attempt,
                    confidence = proposal.confidence,
                    "Low confidence in correction: {}",
                    proposal.confidence
                );
                history.push(AttemptRecord {
                    attempt_number: attempt,
                    outcome: AttemptOutcome::LowConfidence {
                        confidence: proposal.confidence,
                    },
                });
            }
        }

        tracing::warn!(
            event = "correction_exhausted",
            attempts = max_attempts,
            "correction_exhausted: keeping the original sentence"
        );
        Ok(ResultEntry::unchanged(sentence, history))
    }

    /// Inner QA loop: retries the same proposal while QA output is malformed.
    async fn review(
        &self,
        original: &str,
        proposal: &CorrectionProposal,
    ) -> Result<Review, StageError> {
        let max_qa_attempts = self.config.max_qa_attempts;

        for qa_attempt in 1..=max_qa_attempts {
            let decoded = self
                .validator
                .validate(original, &proposal.corrected_sentence)
                .await
                .map_err(|e| StageError::new(RequestKind::ValidateCorrection, e))?;

            match decoded {
                Ok(verdict) => return Ok(Review::Verdict(verdict)),
                Err(e) => {
                    tracing::warn!(
                        event = "qa_malformed",
                        qa_attempt,
                        max_qa_attempts,
                        error = %e,
                        "QA check failed: Missing required keys in QA result"
                    );
                }
            }
        }

        Ok(Review::Unavailable {
            qa_attempts: max_qa_attempts,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::ScriptedService;
    use crate::types::FAILED_CORRECTION_CONCERN;

    const ACCEPT: &str = r#"{"is_valid": true, "maintains_meaning": true, "technical_accuracy": true, "concerns": []}"#;

    fn corrector(service: &Arc<ScriptedService>) -> Corrector {
        Corrector::new(service.clone(), CorrectionConfig::default())
    }

    fn proposal(sentence: &str, confidence: f64) -> String {
        serde_json::json!({
            "corrected_sentence": sentence,
            "confidence": confidence,
            "explanation": "subject-verb agreement"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_accepted_correction() {
        let service = Arc::new(ScriptedService::new());
        service.push(RequestKind::ProposeCorrection, proposal("The cat sits on the mat.", 0.9));
        service.push(RequestKind::ValidateCorrection, ACCEPT);

        let entry = corrector(&service).correct("The cat sit on mat.").await.unwrap();

        assert_eq!(entry.final_text, "The cat sits on the mat.");
        assert!(entry.has_changes);
        assert!(entry.qa_concerns.is_empty());
        assert_eq!(entry.explanation, "subject-verb agreement");
        assert_eq!(entry.attempts.len(), 1);
        assert_eq!(entry.attempts[0].outcome, AttemptOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_low_confidence_never_reaches_validator() {
        let sentence = r"$H = \sum_i \sigma_i$ define the Hamiltonian.";
        let service = Arc::new(ScriptedService::new());
        service.repeat(
            RequestKind::ProposeCorrection,
            proposal(r"$H = \sum_i \sigma_i$ defines the Hamiltonian.", 0.3),
        );

        let entry = corrector(&service).correct(sentence).await.unwrap();

        assert_eq!(entry.final_text, sentence);
        assert!(!entry.has_changes);
        assert_eq!(entry.qa_concerns, vec![FAILED_CORRECTION_CONCERN.to_string()]);
        assert_eq!(service.calls(RequestKind::ProposeCorrection), 5);
        assert_eq!(service.calls(RequestKind::ValidateCorrection), 0);
        assert!(entry
            .attempts
            .iter()
            .all(|a| matches!(a.outcome, AttemptOutcome::LowConfidence { .. })));
    }

    #[tokio::test]
    async fn test_confidence_exactly_at_threshold_is_gated() {
        let service = Arc::new(ScriptedService::new());
        service.repeat(RequestKind::ProposeCorrection, proposal("B.", 0.5));

        let entry = corrector(&service).correct("A.").await.unwrap();

        assert!(!entry.has_changes);
        assert_eq!(service.calls(RequestKind::ValidateCorrection), 0);
    }

    #[tokio::test]
    async fn test_missing_confidence_spends_an_attempt() {
        let service = Arc::new(ScriptedService::new());
        service.push(
            RequestKind::ProposeCorrection,
            r#"{"corrected_sentence": "He goes.", "explanation": "tense"}"#,
        );
        service.push(RequestKind::ProposeCorrection, proposal("He goes.", 0.8));
        service.push(RequestKind::ValidateCorrection, ACCEPT);

        let entry = corrector(&service).correct("He go.").await.unwrap();

        assert!(entry.has_changes);
        assert_eq!(entry.attempts.len(), 2);
        assert!(matches!(
            entry.attempts[0].outcome,
            AttemptOutcome::MalformedProposal { .. }
        ));
    }

    #[tokio::test]
    async fn test_any_false_flag_rejects() {
        for flags in [(false, true, true), (true, false, true), (true, true, false)] {
            let service = Arc::new(ScriptedService::new());
            service.repeat(RequestKind::ProposeCorrection, proposal("He goes.", 0.9));
            service.repeat(
                RequestKind::ValidateCorrection,
                serde_json::json!({
                    "is_valid": flags.0,
                    "maintains_meaning": flags.1,
                    "technical_accuracy": flags.2,
                    "concerns": ["changed meaning"]
                })
                .to_string(),
            );

            let entry = corrector(&service).correct("He go.").await.unwrap();

            assert_eq!(entry.final_text, "He go.");
            assert!(!entry.has_changes);
            assert_eq!(entry.qa_concerns, vec![FAILED_CORRECTION_CONCERN.to_string()]);
            // Each rejection fetches a fresh proposal: one QA call per proposal.
            assert_eq!(service.calls(RequestKind::ProposeCorrection), 5);
            assert_eq!(service.calls(RequestKind::ValidateCorrection), 5);
        }
    }

    #[tokio::test]
    async fn test_rejection_then_acceptance_uses_new_proposal() {
        let service = Arc::new(ScriptedService::new());
        service.push(RequestKind::ProposeCorrection, proposal("He went.", 0.9));
        service.push(RequestKind::ProposeCorrection, proposal("He goes.", 0.9));
        service.push(
            RequestKind::ValidateCorrection,
            r#"{"is_valid": true, "maintains_meaning": false, "technical_accuracy": true, "concerns": ["tense changed"]}"#,
        );
        service.push(RequestKind::ValidateCorrection, ACCEPT);

        let entry = corrector(&service).correct("He go.").await.unwrap();

        assert_eq!(entry.final_text, "He goes.");
        assert_eq!(
            entry.attempts[0].outcome,
            AttemptOutcome::Rejected {
                concerns: vec!["tense changed".to_string()]
            }
        );
        let validated: Vec<String> = service
            .requests(RequestKind::ValidateCorrection)
            .iter()
            .map(|r| r.prompt.clone())
            .collect();
        assert!(validated[0].contains("Corrected: He went."));
        assert!(validated[1].contains("Corrected: He goes."));
    }

    #[tokio::test]
    async fn test_malformed_qa_is_retried_with_same_proposal() {
        let service = Arc::new(ScriptedService::new());
        service.push(RequestKind::ProposeCorrection, proposal("He goes.", 0.9));
        service.push(RequestKind::ValidateCorrection, "Looks good to me!");
        service.push(RequestKind::ValidateCorrection, r#"{"is_valid": true}"#);
        service.push(RequestKind::ValidateCorrection, format!("```json\n{ACCEPT}\n```"));

        let entry = corrector(&service).correct("He go.").await.unwrap();

        assert!(entry.has_changes);
        assert_eq!(service.calls(RequestKind::ProposeCorrection), 1);
        assert_eq!(service.calls(RequestKind::ValidateCorrection), 3);
    }

    #[tokio::test]
    async fn test_exhausted_qa_spends_one_outer_attempt() {
        let service = Arc::new(ScriptedService::new());
        service.push(RequestKind::ProposeCorrection, proposal("He goes.", 0.9));
        service.push(RequestKind::ProposeCorrection, proposal("He goes.", 0.9));
        for _ in 0..5 {
            service.push(RequestKind::ValidateCorrection, "no verdict");
        }
        service.push(RequestKind::ValidateCorrection, ACCEPT);

        let entry = corrector(&service).correct("He go.").await.unwrap();

        assert!(entry.has_changes);
        assert_eq!(
            entry.attempts[0].outcome,
            AttemptOutcome::QaUnavailable { qa_attempts: 5 }
        );
        assert_eq!(service.calls(RequestKind::ValidateCorrection), 6);
    }

    #[tokio::test]
    async fn test_rerunning_on_accepted_output_is_stable() {
        let service = Arc::new(ScriptedService::new());
        service.repeat(
            RequestKind::ProposeCorrection,
            proposal("The cat sits on the mat.", 0.95),
        );
        service.repeat(RequestKind::ValidateCorrection, ACCEPT);

        let corrector = corrector(&service);
        let first = corrector.correct("The cat sit on mat.").await.unwrap();
        let second = corrector.correct(&first.final_text).await.unwrap();

        assert!(first.has_changes);
        assert!(!second.has_changes);
        assert_eq!(second.final_text, first.final_text);
    }

    #[tokio::test]
    async fn test_missing_content_aborts_at_propose_stage() {
        let service = Arc::new(ScriptedService::new());
        service.push_err(
            RequestKind::ProposeCorrection,
            CompletionError::MissingContent {
                backend: "test".to_string(),
                detail: "message.content".to_string(),
            },
        );

        let err = corrector(&service).correct("He go.").await.unwrap_err();
        assert_eq!(err.stage, RequestKind::ProposeCorrection);
    }
}
