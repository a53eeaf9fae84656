//! Retry budgets and thresholds for the pipeline.

/// Segmentation loop budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationConfig {
    /// Window size, in characters, for the first extraction attempt (default: 500).
    pub initial_bound: usize,
    /// Window growth after each rejected attempt (default: 200).
    pub bound_step: usize,
    /// Extraction attempts before settling for an unverified sentence (default: 5).
    pub max_attempts: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            initial_bound: 500,
            bound_step: 200,
            max_attempts: 5,
        }
    }
}

impl SegmentationConfig {
    /// Set the first window size.
    #[must_use]
    pub const fn with_initial_bound(mut self, bound: usize) -> Self {
        self.initial_bound = bound;
        self
    }

    /// Set the window growth per attempt.
    #[must_use]
    pub const fn with_bound_step(mut self, step: usize) -> Self {
        self.bound_step = step;
        self
    }

    /// Set the maximum number of extraction attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max;
        self
    }

    /// Window size for the given 1-indexed attempt.
    #[must_use]
    pub const fn bound_for_attempt(&self, attempt: usize) -> usize {
        self.initial_bound
            .saturating_add(self.bound_step.saturating_mul(attempt.saturating_sub(1)))
    }
}

/// Correction loop budgets.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionConfig {
    /// Proposals to try before falling back to the original (default: 5).
    pub max_attempts: usize,
    /// QA calls per proposal while QA output is malformed (default: 5).
    pub max_qa_attempts: usize,
    /// Proposals at or below this confidence skip QA (default: 0.5).
    pub confidence_threshold: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_qa_attempts: 5,
            confidence_threshold: 0.5,
        }
    }
}

impl CorrectionConfig {
    /// Set the maximum number of proposals.
    #[must_use]
    pub const fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max;
        self
    }

    /// Set the maximum number of QA calls per proposal.
    #[must_use]
    pub const fn with_max_qa_attempts(mut self, max: usize) -> Self {
        self.max_qa_attempts = max;
        self
    }

    /// Set the confidence gate.
    #[must_use]
    pub const fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }
}

/// Configuration for a whole document run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    /// Segmentation loop settings.
    pub segmentation: SegmentationConfig,
    /// Correction loop settings.
    pub correction: CorrectionConfig,
}

impl PipelineConfig {
    /// Replace the segmentation settings.
    #[must_use]
    pub const fn with_segmentation(mut self, segmentation: SegmentationConfig) -> Self {
        self.segmentation = segmentation;
        self
    }

    /// Replace the correction settings.
    #[must_use]
    pub const fn with_correction(mut self, correction: CorrectionConfig) -> Self {
        self.correction = correction;
        self
    }
}
