//! Routes free-text support issues to product categories.
//!
//! Text is split by a WordPiece tokenizer over a preloaded vocabulary, encoded
//! as token ids plus an attention mask, scored by an ONNX sequence
//! classification model, and normalized with softmax into a ranked list of
//! labels. A confidence gate then decides whether the top label is good enough
//! to answer automatically.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use issue_router::{Classifier, ConfidenceGate};
//!
//! let classifier = Classifier::builder()
//!     .with_vocabulary_file("artifacts/vocab.txt")?
//!     .with_label_file("artifacts/labels.json")?
//!     .with_onnx_model("artifacts/model.onnx")?
//!     .build()?;
//!
//! let ranked = classifier.classify("my printer is jammed")?;
//! let outcome = ConfidenceGate::default().evaluate(&ranked);
//! println!("{} ({:.2}), unanswered: {}", outcome.best_label, outcome.confidence, outcome.is_low_confidence);
//! # Ok(())
//! # }
//! ```
//!
//! # Serving
//!
//! [`IssueRouter`] wraps a classifier for request handlers: it rejects
//! requests until loading finishes, bounds concurrent inferences and applies a
//! per-call timeout.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use issue_router::{IssueRouter, RouterConfig, UserId};
//!
//! let config = RouterConfig::from_file("router.json")?.with_env_overrides()?;
//! let router = IssueRouter::new(&config)?;
//! router.load(&config).await?;
//!
//! let outcome = router.classify("the scanner shows a blank page", &UserId::new("42")).await?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
mod runtime;
pub mod artifact_store;
pub mod config;
pub mod service;

pub use classifier::{
    is_low_confidence, ClassificationModel, ClassificationOutcome, Classifier, ClassifierBuilder, ClassifierError,
    ClassifierInfo, ConfidenceGate, EncodedInput, InferenceFailure, LabelSet, OnnxModel, RankedResult, ScoredLabel,
    TensorEncoder, Vocabulary, WordPieceTokenizer,
};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};
pub use artifact_store::{ArtifactError, ArtifactManifest, ArtifactStore};
pub use config::RouterConfig;
pub use service::{load_classifier, IssueRouter, ProductCatalog, UserId};

pub fn init_logger() {
    env_logger::init();
}
