use std::collections::HashMap;
use std::fs;
use std::path::Path;
use log::{info, warn};

use super::error::ClassifierError;

/// Default marker for tokens the vocabulary does not know.
pub const DEFAULT_UNKNOWN_TOKEN: &str = "[UNK]";

/// An immutable subword vocabulary.
///
/// Token ids are positions in the source list. When a token appears more than
/// once, lookups resolve to its first position; later positions stay valid ids
/// so the numbering matches the file the model was trained with.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, u32>,
    unknown_token: String,
    unknown_id: u32,
}

impl Vocabulary {
    /// Builds a vocabulary from an ordered token list.
    ///
    /// # Errors
    /// - `VocabularyLoadError` if the list is empty
    /// - `VocabularyLoadError` if the list has more entries than `u32` ids can address
    /// - `VocabularyLoadError` if `unknown_token` is not part of the list
    pub fn load<I, S>(tokens: I, unknown_token: &str) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty() {
            return Err(ClassifierError::VocabularyLoadError("Vocabulary source is empty".into()));
        }
        if u32::try_from(tokens.len()).is_err() {
            return Err(ClassifierError::VocabularyLoadError(format!(
                "Vocabulary has {} entries, more than token ids can address",
                tokens.len()
            )));
        }

        let mut index = HashMap::with_capacity(tokens.len());
        let mut duplicates = 0usize;
        for (id, token) in tokens.iter().enumerate() {
            if index.contains_key(token) {
                duplicates += 1;
                continue;
            }
            index.insert(token.clone(), id as u32);
        }
        if duplicates > 0 {
            warn!("Vocabulary contains {} duplicate tokens; keeping first occurrences", duplicates);
        }

        let unknown_id = *index.get(unknown_token).ok_or_else(|| {
            ClassifierError::VocabularyLoadError(format!(
                "Unknown token '{}' is not present in the vocabulary",
                unknown_token
            ))
        })?;

        Ok(Self {
            tokens,
            index,
            unknown_token: unknown_token.to_string(),
            unknown_id,
        })
    }

    /// Reads a newline-delimited vocabulary file; line order defines ids.
    pub fn load_file(path: impl AsRef<Path>, unknown_token: &str) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ClassifierError::VocabularyLoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let vocabulary = Self::load(content.lines().map(|line| line.trim_end_matches('\r')), unknown_token)?;
        info!("Loaded vocabulary of {} tokens from {}", vocabulary.size(), path.display());
        Ok(vocabulary)
    }

    /// Returns the id of `token`, or the unknown-token id when absent.
    pub fn index_of(&self, token: &str) -> u32 {
        self.index.get(token).copied().unwrap_or(self.unknown_id)
    }

    /// Token to id map, first occurrence winning for duplicates.
    pub(crate) fn token_ids(&self) -> &HashMap<String, u32> {
        &self.index
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn size(&self) -> usize {
        self.tokens.len()
    }

    pub fn unknown_id(&self) -> u32 {
        self.unknown_id
    }

    pub fn unknown_token(&self) -> &str {
        &self.unknown_token
    }
}
