mod error;
mod vocabulary;
mod tokenizer;
mod encoder;
mod labels;
mod model;
mod result;
mod gate;
#[allow(clippy::module_inception)]
mod classifier;
pub mod builder;
mod utils;

pub use error::{ClassifierError, InferenceFailure};
pub use vocabulary::{Vocabulary, DEFAULT_UNKNOWN_TOKEN};
pub use tokenizer::{WordPieceTokenizer, CONTINUING_SUBWORD_PREFIX, DEFAULT_MAX_INPUT_CHARS_PER_WORD};
pub use encoder::{EncodedInput, TensorEncoder, CLS_TOKEN, SEP_TOKEN};
pub use labels::LabelSet;
pub use model::{ClassificationModel, OnnxModel};
pub use result::{ClassificationOutcome, RankedResult, ScoredLabel};
pub use gate::{is_low_confidence, ConfidenceGate, DEFAULT_CONFIDENCE_THRESHOLD};
pub use classifier::Classifier;
pub use builder::ClassifierBuilder;

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Path to the ONNX model file, when the model was loaded from disk
    pub model_path: Option<String>,
    /// Number of tokens in the vocabulary
    pub vocabulary_size: usize,
    /// Number of labels the model scores
    pub num_labels: usize,
    /// Labels in model output order
    pub labels: Vec<String>,
    /// Version of the label snapshot, if recorded
    pub label_set_version: Option<String>,
    /// Whether sequences are framed with `[CLS]`/`[SEP]`
    pub adds_special_tokens: bool,
}
