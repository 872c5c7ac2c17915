#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use issue_router::{ClassificationModel, Classifier, ClassifierError, LabelSet, Vocabulary};
use tempfile::NamedTempFile;

pub const VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "my", "printer", "is", "jam", "##med", "the", "scanner", "laptop",
    "monitor", "keyboard", "mouse", "screen", "paper", "keys", "battery", "won", "'", "t", "charge", "broken",
    "##s", "flicker", "##ing", "click", "not", "working", "blank", "page", "shows", "a", "sticky",
];

pub const LABELS: &[&str] = &["Printer", "Scanner", "Laptop", "Monitor", "Keyboard", "Mouse"];

pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).try_init();
}

pub fn vocab_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create vocab file");
    for token in VOCAB {
        writeln!(file, "{}", token).expect("write vocab file");
    }
    file
}

pub fn vocabulary() -> Vocabulary {
    Vocabulary::load(VOCAB.iter().copied(), "[UNK]").expect("fixture vocabulary")
}

pub fn labels() -> LabelSet {
    LabelSet::new(LABELS.to_vec()).expect("fixture labels").with_version("catalog-test")
}

/// Scores each label by twice the number of its keyword tokens found in the input.
#[derive(Debug)]
pub struct KeywordModel {
    keywords: Vec<Vec<i64>>,
}

impl KeywordModel {
    pub fn new(vocabulary: &Vocabulary) -> Self {
        let per_label: &[&[&str]] = &[
            &["printer", "jam", "##med", "paper"],
            &["scanner", "blank", "page"],
            &["laptop", "battery", "charge"],
            &["monitor", "screen", "flicker", "##ing"],
            &["keyboard", "keys", "sticky"],
            &["mouse", "click"],
        ];
        let keywords = per_label
            .iter()
            .map(|words| words.iter().map(|w| i64::from(vocabulary.index_of(w))).collect())
            .collect();
        Self { keywords }
    }
}

impl ClassificationModel for KeywordModel {
    fn output_dim(&self) -> usize {
        self.keywords.len()
    }

    fn score(&self, input_ids: &[i64], attention_mask: &[i64]) -> Result<Vec<f32>, ClassifierError> {
        assert_eq!(input_ids.len(), attention_mask.len());
        Ok(self
            .keywords
            .iter()
            .map(|ids| input_ids.iter().filter(|id| ids.contains(id)).count() as f32 * 2.0)
            .collect())
    }
}

/// Sleeps before returning uniform scores.
#[derive(Debug)]
pub struct SlowModel {
    pub dim: usize,
    pub delay: Duration,
}

impl ClassificationModel for SlowModel {
    fn output_dim(&self) -> usize {
        self.dim
    }

    fn score(&self, _input_ids: &[i64], _attention_mask: &[i64]) -> Result<Vec<f32>, ClassifierError> {
        std::thread::sleep(self.delay);
        Ok(vec![0.0; self.dim])
    }
}

pub fn keyword_classifier() -> Classifier {
    let vocabulary = vocabulary();
    let model = KeywordModel::new(&vocabulary);
    Classifier::builder()
        .with_vocabulary(vocabulary)
        .with_labels(labels())
        .with_model(Arc::new(model))
        .expect("set model")
        .build()
        .expect("build classifier")
}
