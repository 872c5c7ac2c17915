use std::path::Path;
use std::sync::Arc;
use log::info;

use super::classifier::Classifier;
use super::encoder::{TensorEncoder, CLS_TOKEN, SEP_TOKEN};
use super::error::ClassifierError;
use super::labels::LabelSet;
use super::model::{ClassificationModel, OnnxModel};
use super::tokenizer::{WordPieceTokenizer, DEFAULT_MAX_INPUT_CHARS_PER_WORD};
use super::vocabulary::{Vocabulary, DEFAULT_UNKNOWN_TOKEN};
use crate::runtime::RuntimeConfig;

/// A builder for constructing a Classifier with a fluent interface.
///
/// The label set must be supplied before an ONNX model is loaded, because
/// loading checks the model's output width against it.
#[derive(Debug)]
pub struct ClassifierBuilder {
    vocabulary: Option<Arc<Vocabulary>>,
    labels: Option<LabelSet>,
    model: Option<Arc<dyn ClassificationModel>>,
    model_path: Option<String>,
    runtime_config: RuntimeConfig,
    add_special_tokens: bool,
    max_input_chars_per_word: usize,
}

impl Default for ClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBuilder {
    pub fn new() -> Self {
        Self {
            vocabulary: None,
            labels: None,
            model: None,
            model_path: None,
            runtime_config: RuntimeConfig::default(),
            add_special_tokens: false,
            max_input_chars_per_word: DEFAULT_MAX_INPUT_CHARS_PER_WORD,
        }
    }

    /// Sets the runtime configuration used when an ONNX model is loaded
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Frames every sequence as `[CLS] ... [SEP]`, for models exported with
    /// special tokens.
    pub fn with_special_tokens(mut self, enabled: bool) -> Self {
        self.add_special_tokens = enabled;
        self
    }

    pub fn with_max_input_chars_per_word(mut self, max_chars: usize) -> Self {
        self.max_input_chars_per_word = max_chars;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(Arc::new(vocabulary));
        self
    }

    /// Loads a newline-delimited vocabulary using `[UNK]` as the unknown token
    pub fn with_vocabulary_file(self, path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        self.with_vocabulary_file_and_unknown(path, DEFAULT_UNKNOWN_TOKEN)
    }

    pub fn with_vocabulary_file_and_unknown(
        self,
        path: impl AsRef<Path>,
        unknown_token: &str,
    ) -> Result<Self, ClassifierError> {
        let vocabulary = Vocabulary::load_file(path, unknown_token)?;
        Ok(self.with_vocabulary(vocabulary))
    }

    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_label_file(self, path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let labels = LabelSet::load_file(path)?;
        Ok(self.with_labels(labels))
    }

    /// Loads an ONNX model and validates it against the configured label set.
    ///
    /// # Errors
    /// - `ModelLoadError` if a model is already set
    /// - `ModelLoadError` if no label set has been supplied yet
    /// - `ModelLoadError` if the file is missing, corrupt, or its output width
    ///   differs from the label count
    pub fn with_onnx_model(mut self, model_path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        if self.model.is_some() {
            return Err(ClassifierError::ModelLoadError("Model already set".into()));
        }
        let labels = self.labels.as_ref().ok_or_else(|| {
            ClassifierError::ModelLoadError("Label set must be provided before loading the model".into())
        })?;

        let model_path = model_path.as_ref();
        let model = OnnxModel::load(model_path, labels, &self.runtime_config)?;
        self.model_path = Some(model_path.to_string_lossy().to_string());
        self.model = Some(Arc::new(model));
        Ok(self)
    }

    /// Uses an already loaded model. Its output width is checked in `build`.
    pub fn with_model(mut self, model: Arc<dyn ClassificationModel>) -> Result<Self, ClassifierError> {
        if self.model.is_some() {
            return Err(ClassifierError::ModelLoadError("Model already set".into()));
        }
        self.model = Some(model);
        Ok(self)
    }

    /// Builds and returns the final Classifier instance
    ///
    /// # Errors
    /// - `VocabularyLoadError` if no vocabulary was supplied, or special tokens
    ///   are enabled but missing from it
    /// - `ModelLoadError` if no label set or model was supplied, or their sizes disagree
    pub fn build(self) -> Result<Classifier, ClassifierError> {
        let vocabulary = self
            .vocabulary
            .ok_or_else(|| ClassifierError::VocabularyLoadError("No vocabulary loaded".into()))?;
        let labels = self
            .labels
            .ok_or_else(|| ClassifierError::ModelLoadError("No label set loaded".into()))?;
        let model = self
            .model
            .ok_or_else(|| ClassifierError::ModelLoadError("No model loaded".into()))?;

        if self.add_special_tokens {
            for marker in [CLS_TOKEN, SEP_TOKEN] {
                if !vocabulary.contains(marker) {
                    return Err(ClassifierError::VocabularyLoadError(format!(
                        "Special tokens enabled but '{}' is not in the vocabulary",
                        marker
                    )));
                }
            }
        }

        let tokenizer =
            WordPieceTokenizer::with_max_input_chars_per_word(Arc::clone(&vocabulary), self.max_input_chars_per_word)?;
        let encoder = TensorEncoder::new().with_special_tokens(self.add_special_tokens);

        let classifier = Classifier::from_parts(vocabulary, tokenizer, encoder, model, labels, self.model_path)?;
        let info = classifier.info();
        info!(
            "Classifier ready: {} labels (version: {}), vocabulary of {} tokens",
            info.num_labels,
            info.label_set_version.as_deref().unwrap_or("unversioned"),
            info.vocabulary_size
        );
        Ok(classifier)
    }
}
