use std::sync::Arc;
use log::debug;
use ndarray::Array1;

use super::encoder::{EncodedInput, TensorEncoder};
use super::error::{ClassifierError, InferenceFailure};
use super::labels::LabelSet;
use super::model::ClassificationModel;
use super::result::{RankedResult, ScoredLabel};
use super::tokenizer::WordPieceTokenizer;
use super::utils::{rank_indices, softmax};
use super::vocabulary::Vocabulary;

/// Routes issue text to a ranked list of product labels.
///
/// # Thread Safety
///
/// This type is `Send + Sync`: the vocabulary, label set and model are shared
/// behind `Arc` and only read after construction. Every `classify` call builds
/// its own token sequence and result, so concurrent calls never observe each
/// other's state.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use issue_router::Classifier;
///
/// let classifier = Classifier::builder()
///     .with_vocabulary_file("artifacts/vocab.txt")?
///     .with_label_file("artifacts/labels.json")?
///     .with_onnx_model("artifacts/model.onnx")?
///     .build()?;
///
/// let ranked = classifier.classify("my printer is jammed")?;
/// println!("{} ({:.2})", ranked.best().label, ranked.best().probability);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Classifier {
    vocabulary: Arc<Vocabulary>,
    tokenizer: WordPieceTokenizer,
    encoder: TensorEncoder,
    model: Arc<dyn ClassificationModel>,
    labels: Arc<LabelSet>,
    model_path: Option<String>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl Classifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Assembles a classifier from already loaded parts with default
    /// tokenizer and encoder settings.
    ///
    /// # Errors
    /// - `VocabularyLoadError` if the tokenizer cannot be built from the vocabulary
    /// - `ModelLoadError` if the model's output width differs from the label count
    pub fn new(
        vocabulary: Arc<Vocabulary>,
        model: Arc<dyn ClassificationModel>,
        labels: LabelSet,
    ) -> Result<Self, ClassifierError> {
        let tokenizer = WordPieceTokenizer::new(Arc::clone(&vocabulary))?;
        Self::from_parts(vocabulary, tokenizer, TensorEncoder::new(), model, labels, None)
    }

    pub(crate) fn from_parts(
        vocabulary: Arc<Vocabulary>,
        tokenizer: WordPieceTokenizer,
        encoder: TensorEncoder,
        model: Arc<dyn ClassificationModel>,
        labels: LabelSet,
        model_path: Option<String>,
    ) -> Result<Self, ClassifierError> {
        if model.output_dim() != labels.len() {
            return Err(ClassifierError::ModelLoadError(format!(
                "Model produces {} scores but the label set has {} labels",
                model.output_dim(),
                labels.len()
            )));
        }
        Ok(Self {
            vocabulary,
            tokenizer,
            encoder,
            model,
            labels: Arc::new(labels),
            model_path,
        })
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> super::ClassifierInfo {
        super::ClassifierInfo {
            model_path: self.model_path.clone(),
            vocabulary_size: self.vocabulary.size(),
            num_labels: self.labels.len(),
            labels: self.labels.labels().to_vec(),
            label_set_version: self.labels.version().map(str::to_string),
            adds_special_tokens: self.encoder.adds_special_tokens(),
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenizer.tokenize(text)
    }

    pub fn encode(&self, text: &str) -> Result<EncodedInput, ClassifierError> {
        let tokens = self.tokenizer.tokenize(text);
        if tokens.is_empty() {
            return Err(ClassifierError::EmptyInputError);
        }
        Ok(self.encoder.encode(&tokens, &self.vocabulary))
    }

    /// Ranks every label for `text`, most probable first.
    ///
    /// # Errors
    /// - `EmptyInputError` if the text produces no tokens
    /// - `ModelInferenceError` if scoring fails, returns the wrong number of
    ///   scores, or returns non-finite scores
    pub fn classify(&self, text: &str) -> Result<RankedResult, ClassifierError> {
        let encoded = self.encode(text)?;
        debug!("Encoded input into {} ids", encoded.len());

        let raw = self
            .model
            .score(&encoded.input_ids, &encoded.attention_mask)
            .map_err(|e| match e {
                ClassifierError::ModelInferenceError(_) => e,
                other => ClassifierError::engine(other.to_string()),
            })?;

        if raw.len() != self.labels.len() {
            return Err(ClassifierError::ModelInferenceError(InferenceFailure::ShapeMismatch {
                expected: self.labels.len(),
                actual: raw.len(),
            }));
        }
        if raw.iter().any(|score| !score.is_finite()) {
            return Err(ClassifierError::ModelInferenceError(InferenceFailure::NonFinite));
        }

        let probabilities = softmax(&Array1::from(raw));
        let entries = rank_indices(&probabilities)
            .into_iter()
            .map(|index| ScoredLabel {
                label: self.labels.labels()[index].clone(),
                probability: probabilities[index],
                index,
            })
            .collect();
        let ranked = RankedResult::new(entries);
        debug!("Best label '{}' ({:.4})", ranked.best().label, ranked.best().probability);
        Ok(ranked)
    }
}
