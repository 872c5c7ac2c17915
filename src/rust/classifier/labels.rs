use std::collections::HashSet;
use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use log::info;

use super::error::ClassifierError;

/// Ordered category names snapshotted with the model artifact.
///
/// Position `i` names column `i` of the model output. The optional version
/// ties the snapshot to the model export it was taken for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    #[serde(default)]
    version: Option<String>,
    labels: Vec<String>,
}

impl LabelSet {
    /// Creates a label set, rejecting empty, blank or duplicate labels.
    pub fn new(labels: Vec<impl Into<String>>) -> Result<Self, ClassifierError> {
        Self::validated(None, labels.into_iter().map(Into::into).collect())
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    fn validated(version: Option<String>, labels: Vec<String>) -> Result<Self, ClassifierError> {
        if labels.is_empty() {
            return Err(ClassifierError::ModelLoadError("Label set cannot be empty".into()));
        }
        let mut seen = HashSet::with_capacity(labels.len());
        for (pos, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(ClassifierError::ModelLoadError(format!("Label {} is blank", pos + 1)));
            }
            if !seen.insert(label.as_str()) {
                return Err(ClassifierError::ModelLoadError(format!("Duplicate label '{}'", label)));
            }
        }
        Ok(Self { version, labels })
    }

    /// Reads a label snapshot. `.json` files hold `{"version": .., "labels": [..]}`;
    /// anything else is read as one label per non-empty line.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ClassifierError::ModelLoadError(format!("Failed to read label set {}: {}", path.display(), e))
        })?;

        let is_json = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let set = if is_json {
            let raw: LabelSet = serde_json::from_str(&content).map_err(|e| {
                ClassifierError::ModelLoadError(format!("Invalid label set {}: {}", path.display(), e))
            })?;
            Self::validated(raw.version, raw.labels)?
        } else {
            let labels = content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            Self::validated(None, labels)?
        };

        info!(
            "Loaded label set of {} labels (version: {}) from {}",
            set.len(),
            set.version().unwrap_or("unversioned"),
            path.display()
        );
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Rejects inference when the live catalog no longer has as many entries
    /// as the snapshot the model was prepared with.
    pub fn check_catalog_size(&self, catalog_size: usize) -> Result<(), ClassifierError> {
        if catalog_size != self.labels.len() {
            return Err(ClassifierError::LabelSetDriftError {
                expected: self.labels.len(),
                actual: catalog_size,
            });
        }
        Ok(())
    }
}
