use std::sync::Arc;
use log::warn;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::{Model, NormalizedString, Normalizer, OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer};

use super::error::ClassifierError;
use super::vocabulary::Vocabulary;

/// Prefix marking a piece that continues the previous one inside a word.
pub const CONTINUING_SUBWORD_PREFIX: &str = "##";

/// Words longer than this many characters map straight to the unknown token.
pub const DEFAULT_MAX_INPUT_CHARS_PER_WORD: usize = 100;

/// Greedy longest-match-first WordPiece tokenizer over a preloaded vocabulary.
///
/// Text goes through BERT basic tokenization first (cleanup, lowercasing,
/// accent stripping, whitespace and punctuation splits). Each resulting word is
/// then segmented into the longest vocabulary pieces available from left to
/// right. A word that cannot be covered completely becomes the unknown token.
#[derive(Debug, Clone)]
pub struct WordPieceTokenizer {
    vocabulary: Arc<Vocabulary>,
    normalizer: BertNormalizer,
    model: WordPiece,
    max_input_chars_per_word: usize,
}

impl WordPieceTokenizer {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Result<Self, ClassifierError> {
        Self::with_max_input_chars_per_word(vocabulary, DEFAULT_MAX_INPUT_CHARS_PER_WORD)
    }

    /// Builds a tokenizer whose words above `max_chars` characters become the
    /// unknown token.
    ///
    /// # Errors
    /// - `VocabularyLoadError` if the WordPiece model cannot be built from the vocabulary
    pub fn with_max_input_chars_per_word(
        vocabulary: Arc<Vocabulary>,
        max_chars: usize,
    ) -> Result<Self, ClassifierError> {
        // The vocabulary's own map keeps first-occurrence ids for duplicates.
        let model = WordPiece::builder()
            .vocab(vocabulary.token_ids().clone())
            .unk_token(vocabulary.unknown_token().to_string())
            .continuing_subword_prefix(CONTINUING_SUBWORD_PREFIX.to_string())
            .max_input_chars_per_word(max_chars)
            .build()
            .map_err(|e| ClassifierError::VocabularyLoadError(format!("Failed to build WordPiece model: {}", e)))?;

        Ok(Self {
            vocabulary,
            normalizer: BertNormalizer::new(true, true, None, true),
            model,
            max_input_chars_per_word: max_chars,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn max_input_chars_per_word(&self) -> usize {
        self.max_input_chars_per_word
    }

    /// Splits `text` into subword tokens. Empty and whitespace-only input
    /// yields an empty sequence.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let words = self.basic_tokenize(text).unwrap_or_else(|e| {
            warn!("Basic tokenization failed ({}), falling back to whitespace split", e);
            text.to_lowercase().split_whitespace().map(str::to_string).collect()
        });

        let mut pieces = Vec::with_capacity(words.len());
        for word in &words {
            match self.model.tokenize(word) {
                Ok(tokens) => pieces.extend(tokens.into_iter().map(|token| token.value)),
                Err(e) => {
                    warn!("WordPiece failed on '{}' ({}), using unknown token", word, e);
                    pieces.push(self.vocabulary.unknown_token().to_string());
                }
            }
        }
        pieces
    }

    fn basic_tokenize(&self, text: &str) -> tokenizers::Result<Vec<String>> {
        let mut normalized = NormalizedString::from(text);
        self.normalizer.normalize(&mut normalized)?;

        let mut pretokenized = PreTokenizedString::from(normalized);
        BertPreTokenizer.pre_tokenize(&mut pretokenized)?;

        Ok(pretokenized
            .get_splits(OffsetReferential::Normalized, OffsetType::Byte)
            .into_iter()
            .map(|(word, _, _)| word.to_string())
            .filter(|word| !word.is_empty())
            .collect())
    }
}
