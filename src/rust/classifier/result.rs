use serde::Serialize;

/// One label with its probability and its position in the label set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredLabel {
    pub label: String,
    pub probability: f32,
    pub index: usize,
}

/// Labels ranked by descending probability. Probabilities sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    entries: Vec<ScoredLabel>,
}

impl RankedResult {
    pub(crate) fn new(entries: Vec<ScoredLabel>) -> Self {
        Self { entries }
    }

    /// The top-ranked label. Every result holds at least one entry.
    pub fn best(&self) -> &ScoredLabel {
        &self.entries[0]
    }

    /// The first `k` entries, or all of them when fewer exist.
    pub fn top(&self, k: usize) -> &[ScoredLabel] {
        &self.entries[..k.min(self.entries.len())]
    }

    pub fn entries(&self) -> &[ScoredLabel] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredLabel> {
        self.entries.iter()
    }

    pub fn probability_of(&self, label: &str) -> Option<f32> {
        self.entries.iter().find(|e| e.label == label).map(|e| e.probability)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<ScoredLabel> {
        self.entries
    }
}

/// What the caller attaches to the issue record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationOutcome {
    pub best_label: String,
    pub confidence: f32,
    pub is_low_confidence: bool,
}
