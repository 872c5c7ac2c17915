use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use log::{debug, error, info};
use ndarray::Array2;
use ort::session::Session;
use ort::value::{Tensor, ValueType};

use super::encoder::EncodedInput;
use super::error::{ClassifierError, InferenceFailure};
use super::labels::LabelSet;
use crate::runtime::{create_session_builder, RuntimeConfig};

const INPUT_IDS: &str = "input_ids";
const ATTENTION_MASK: &str = "attention_mask";
const TOKEN_TYPE_IDS: &str = "token_type_ids";

/// A loaded sequence-classification model.
///
/// Implementations are loaded once and then shared read-only across requests,
/// so `score` must be callable concurrently from several threads.
pub trait ClassificationModel: Send + Sync + fmt::Debug {
    /// Number of scores `score` returns; one per label.
    fn output_dim(&self) -> usize;

    /// Produces unnormalized scores for one encoded sequence.
    ///
    /// # Errors
    /// - `ModelInferenceError` if the engine fails or returns the wrong number of scores
    fn score(&self, input_ids: &[i64], attention_mask: &[i64]) -> Result<Vec<f32>, ClassifierError>;
}

/// ONNX Runtime backed classification model.
///
/// The graph is expected to:
/// - accept `input_ids` and `attention_mask` (int64, shape `[1, sequence_length]`),
///   and optionally `token_type_ids`, which is fed zeros
/// - output logits of shape `[1, num_labels]` as its first output
#[derive(Debug)]
pub struct OnnxModel {
    model_path: PathBuf,
    session: Session,
    input_names: Vec<String>,
    output_dim: usize,
}

impl OnnxModel {
    /// Loads the model and checks its output width against the label snapshot.
    ///
    /// # Errors
    /// - `ModelLoadError` if the file is missing or cannot be parsed as an ONNX graph
    /// - `ModelLoadError` if the graph lacks the expected inputs or a tensor output
    /// - `ModelLoadError` if the output width differs from `labels.len()`
    pub fn load(
        model_path: impl AsRef<Path>,
        labels: &LabelSet,
        config: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(ClassifierError::ModelLoadError(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        info!("Loading model from {}", model_path.display());
        let session = create_session_builder(config)?
            .commit_from_file(model_path)
            .map_err(|e| {
                error!("Failed to load model: {}", e);
                ClassifierError::ModelLoadError(format!("Failed to load model {}: {}", model_path.display(), e))
            })?;

        let input_names = Self::validate_model(&session)?;
        let declared = Self::declared_output_width(&session);

        let mut model = Self {
            model_path: model_path.to_path_buf(),
            session,
            input_names,
            output_dim: declared.unwrap_or(0),
        };

        if declared.is_none() {
            // Dynamic output shape: score a single token to learn the width.
            let trial = model.run(&[0], &[1]).map_err(|e| {
                ClassifierError::ModelLoadError(format!("Failed to measure model output width: {}", e))
            })?;
            model.output_dim = trial.len();
            info!("Inferred output width from model: {}", model.output_dim);
        }

        if model.output_dim != labels.len() {
            return Err(ClassifierError::ModelLoadError(format!(
                "Model produces {} scores but the label set has {} labels",
                model.output_dim,
                labels.len()
            )));
        }

        info!("Model structure validated successfully ({} labels)", model.output_dim);
        Ok(model)
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Checks the graph inputs and outputs, returning the input names in
    /// graph order.
    fn validate_model(session: &Session) -> Result<Vec<String>, ClassifierError> {
        let input_names: Vec<String> = session.inputs.iter().map(|input| input.name.clone()).collect();
        for required in [INPUT_IDS, ATTENTION_MASK] {
            if !input_names.iter().any(|name| name == required) {
                return Err(ClassifierError::ModelLoadError(format!(
                    "Model is missing required input '{}' (found {:?})",
                    required, input_names
                )));
            }
        }
        if let Some(unexpected) = input_names
            .iter()
            .find(|name| ![INPUT_IDS, ATTENTION_MASK, TOKEN_TYPE_IDS].contains(&name.as_str()))
        {
            return Err(ClassifierError::ModelLoadError(format!("Model has unsupported input '{}'", unexpected)));
        }

        match session.outputs.first() {
            Some(output) if matches!(output.output_type, ValueType::Tensor { .. }) => Ok(input_names),
            Some(output) => Err(ClassifierError::ModelLoadError(format!(
                "Model output '{}' is not a tensor",
                output.name
            ))),
            None => Err(ClassifierError::ModelLoadError("Model must have at least 1 output for logits".into())),
        }
    }

    /// Width of the last output axis when the graph declares it statically.
    fn declared_output_width(session: &Session) -> Option<usize> {
        match &session.outputs.first()?.output_type {
            ValueType::Tensor { dimensions, .. } => dimensions
                .last()
                .and_then(|&dim| usize::try_from(dim).ok())
                .filter(|&dim| dim > 0),
            _ => None,
        }
    }

    fn run(&self, input_ids: &[i64], attention_mask: &[i64]) -> Result<Vec<f32>, ClassifierError> {
        if input_ids.is_empty() || input_ids.len() != attention_mask.len() {
            return Err(ClassifierError::engine(format!(
                "Invalid input lengths: {} ids, {} mask entries",
                input_ids.len(),
                attention_mask.len()
            )));
        }
        let len = input_ids.len();
        let encoded = EncodedInput {
            input_ids: input_ids.to_vec(),
            attention_mask: attention_mask.to_vec(),
        };
        let (ids, mask) = encoded.to_arrays()?;

        let mut input_tensors = HashMap::new();
        for name in &self.input_names {
            let array = match name.as_str() {
                INPUT_IDS => ids.clone(),
                ATTENTION_MASK => mask.clone(),
                _ => Array2::<i64>::zeros((1, len)),
            };
            let tensor = Tensor::from_array(array)
                .map_err(|e| ClassifierError::engine(format!("Failed to create {} tensor: {}", name, e)))?;
            input_tensors.insert(name.clone(), tensor);
        }

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ClassifierError::engine(format!("Failed to run model: {}", e)))?;
        let logits = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::engine(format!("Failed to extract output tensor: {}", e)))?;
        debug!("Model output shape: {:?}", logits.shape());

        Ok(logits.iter().copied().collect())
    }
}

impl ClassificationModel for OnnxModel {
    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn score(&self, input_ids: &[i64], attention_mask: &[i64]) -> Result<Vec<f32>, ClassifierError> {
        let scores = self.run(input_ids, attention_mask)?;
        if scores.len() != self.output_dim {
            return Err(ClassifierError::ModelInferenceError(InferenceFailure::ShapeMismatch {
                expected: self.output_dim,
                actual: scores.len(),
            }));
        }
        Ok(scores)
    }
}
