use ort::Error as OrtError;
use std::time::Duration;

/// Represents the different types of errors that can occur while routing an issue.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The vocabulary source was missing, empty or unusable
    #[error("Vocabulary load error: {0}")]
    VocabularyLoadError(String),
    /// The model artifact or its label snapshot could not be loaded, or the
    /// classifier is not ready to serve requests
    #[error("Model load error: {0}")]
    ModelLoadError(String),
    /// The input produced no tokens
    #[error("Input produced no tokens")]
    EmptyInputError,
    /// Scoring failed or timed out
    #[error("Model inference error: {0}")]
    ModelInferenceError(InferenceFailure),
    /// The live product catalog no longer matches the label snapshot
    #[error("Label set drift: model was prepared with {expected} labels, catalog has {actual}")]
    LabelSetDriftError { expected: usize, actual: usize },
    /// A configuration value is out of range or unreadable
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Why a single inference call failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Engine(String),
    #[error("model produced {actual} scores, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("model produced non-finite scores")]
    NonFinite,
}

impl ClassifierError {
    pub(crate) fn engine(msg: impl Into<String>) -> Self {
        Self::ModelInferenceError(InferenceFailure::Engine(msg.into()))
    }

    /// True for failures that reject a single request and leave the shared
    /// classifier usable.
    pub fn is_request_level(&self) -> bool {
        matches!(
            self,
            Self::EmptyInputError | Self::ModelInferenceError(_) | Self::LabelSetDriftError { .. }
        )
    }
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::ModelLoadError(err.to_string())
    }
}
