use ndarray::Array2;

use super::error::ClassifierError;
use super::vocabulary::Vocabulary;

pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";

/// Model-ready input for one request: token ids and a same-length attention mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInput {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
}

impl EncodedInput {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Shapes both sequences as `[1, len]` arrays, the single-row batch layout
    /// the inference engine consumes.
    pub fn to_arrays(&self) -> Result<(Array2<i64>, Array2<i64>), ClassifierError> {
        let ids = Array2::from_shape_vec((1, self.len()), self.input_ids.clone())
            .map_err(|e| ClassifierError::engine(format!("Failed to create input array: {}", e)))?;
        let mask = Array2::from_shape_vec((1, self.len()), self.attention_mask.clone())
            .map_err(|e| ClassifierError::engine(format!("Failed to create mask array: {}", e)))?;
        Ok((ids, mask))
    }
}

/// Converts token sequences into the id/mask layout the model expects.
///
/// Every request is encoded on its own, so there is no padding: every mask
/// entry is 1. With special tokens enabled the sequence is framed as
/// `[CLS] tokens... [SEP]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TensorEncoder {
    add_special_tokens: bool,
}

impl TensorEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_special_tokens(mut self, enabled: bool) -> Self {
        self.add_special_tokens = enabled;
        self
    }

    pub fn adds_special_tokens(&self) -> bool {
        self.add_special_tokens
    }

    /// Maps each token through the vocabulary, preserving order.
    pub fn encode(&self, tokens: &[String], vocabulary: &Vocabulary) -> EncodedInput {
        let mut input_ids = Vec::with_capacity(tokens.len() + 2);
        if self.add_special_tokens {
            input_ids.push(i64::from(vocabulary.index_of(CLS_TOKEN)));
        }
        input_ids.extend(tokens.iter().map(|t| i64::from(vocabulary.index_of(t))));
        if self.add_special_tokens {
            input_ids.push(i64::from(vocabulary.index_of(SEP_TOKEN)));
        }
        let attention_mask = vec![1i64; input_ids.len()];
        EncodedInput { input_ids, attention_mask }
    }
}
