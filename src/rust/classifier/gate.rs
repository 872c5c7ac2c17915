use super::error::ClassifierError;
use super::result::{ClassificationOutcome, RankedResult};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// True when `probability` falls below `threshold`.
pub fn is_low_confidence(probability: f32, threshold: f32) -> bool {
    probability < threshold
}

/// Decides whether a classification is confident enough to be answered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    threshold: f32,
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self { threshold: DEFAULT_CONFIDENCE_THRESHOLD }
    }
}

impl ConfidenceGate {
    /// # Errors
    /// - `ConfigError` if `threshold` is not a number in `[0, 1]`
    pub fn new(threshold: f32) -> Result<Self, ClassifierError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ClassifierError::ConfigError(format!(
                "Confidence threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_low_confidence(&self, probability: f32) -> bool {
        is_low_confidence(probability, self.threshold)
    }

    /// Reduces a ranking to the outcome persisted with the issue.
    pub fn evaluate(&self, ranked: &RankedResult) -> ClassificationOutcome {
        let best = ranked.best();
        ClassificationOutcome {
            best_label: best.label.clone(),
            confidence: best.probability,
            is_low_confidence: self.is_low_confidence(best.probability),
        }
    }
}
