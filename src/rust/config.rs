use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifierError, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_INPUT_CHARS_PER_WORD, DEFAULT_UNKNOWN_TOKEN};
use crate::runtime::RuntimeConfig;

/// Process configuration for the issue router.
///
/// Values come from an optional JSON file, then `ISSUE_ROUTER_*` environment
/// variables, then command-line flags. Artifact file names are resolved
/// against `artifacts_dir` unless they are absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub artifacts_dir: Option<PathBuf>,
    pub vocab_file: PathBuf,
    pub model_file: PathBuf,
    pub labels_file: PathBuf,
    pub unknown_token: String,
    pub add_special_tokens: bool,
    pub max_input_chars_per_word: usize,
    pub confidence_threshold: f32,
    pub inference_timeout_ms: u64,
    pub max_concurrent_inferences: usize,
    pub verify_checksums: bool,
    pub runtime: RuntimeConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: None,
            vocab_file: PathBuf::from("vocab.txt"),
            model_file: PathBuf::from("model.onnx"),
            labels_file: PathBuf::from("labels.json"),
            unknown_token: DEFAULT_UNKNOWN_TOKEN.to_string(),
            add_special_tokens: false,
            max_input_chars_per_word: DEFAULT_MAX_INPUT_CHARS_PER_WORD,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            inference_timeout_ms: 5_000,
            max_concurrent_inferences: 4,
            verify_checksums: true,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl RouterConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ClassifierError::ConfigError(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| ClassifierError::ConfigError(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Applies `ISSUE_ROUTER_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ClassifierError> {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClassifierError> {
        if let Some(dir) = lookup("ISSUE_ROUTER_ARTIFACTS_DIR") {
            self.artifacts_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup("ISSUE_ROUTER_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = parse_env("ISSUE_ROUTER_CONFIDENCE_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("ISSUE_ROUTER_INFERENCE_TIMEOUT_MS") {
            self.inference_timeout_ms = parse_env("ISSUE_ROUTER_INFERENCE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("ISSUE_ROUTER_MAX_CONCURRENT_INFERENCES") {
            self.max_concurrent_inferences = parse_env("ISSUE_ROUTER_MAX_CONCURRENT_INFERENCES", &value)?;
        }
        if let Some(value) = lookup("ISSUE_ROUTER_VERIFY_CHECKSUMS") {
            self.verify_checksums = parse_env("ISSUE_ROUTER_VERIFY_CHECKSUMS", &value)?;
        }
        Ok(self)
    }

    /// # Errors
    /// - `ConfigError` for a threshold outside `[0, 1]`, a zero timeout, zero
    ///   concurrency, zero max word length or an empty unknown token
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ClassifierError::ConfigError(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.inference_timeout_ms == 0 {
            return Err(ClassifierError::ConfigError("inference_timeout_ms must be positive".into()));
        }
        if self.max_concurrent_inferences == 0 {
            return Err(ClassifierError::ConfigError("max_concurrent_inferences must be positive".into()));
        }
        if self.max_input_chars_per_word == 0 {
            return Err(ClassifierError::ConfigError("max_input_chars_per_word must be positive".into()));
        }
        if self.unknown_token.is_empty() {
            return Err(ClassifierError::ConfigError("unknown_token cannot be empty".into()));
        }
        Ok(())
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.resolve(&self.vocab_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.resolve(&self.model_file)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.resolve(&self.labels_file)
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        match &self.artifacts_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.to_path_buf(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ClassifierError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ClassifierError::ConfigError(format!("Invalid {} '{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = RouterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.confidence_threshold, 0.6);
        assert_eq!(config.inference_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_keeps_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{"artifacts_dir": "/srv/router", "confidence_threshold": 0.75, "runtime": {{"intra_threads": 2}}}}"#
        )?;
        let config = RouterConfig::from_file(file.path())?;
        assert_eq!(config.confidence_threshold, 0.75);
        assert_eq!(config.runtime.intra_threads, 2);
        assert_eq!(config.unknown_token, "[UNK]");
        assert_eq!(config.model_path(), PathBuf::from("/srv/router/model.onnx"));
        Ok(())
    }

    #[test]
    fn test_absolute_paths_ignore_artifacts_dir() {
        let config = RouterConfig {
            artifacts_dir: Some(PathBuf::from("/srv/router")),
            vocab_file: PathBuf::from("/opt/shared/vocab.txt"),
            ..RouterConfig::default()
        };
        assert_eq!(config.vocab_path(), PathBuf::from("/opt/shared/vocab.txt"));
        assert_eq!(config.labels_path(), PathBuf::from("/srv/router/labels.json"));
    }

    #[test]
    fn test_overrides() -> Result<(), ClassifierError> {
        let vars: HashMap<&str, &str> = [
            ("ISSUE_ROUTER_CONFIDENCE_THRESHOLD", "0.8"),
            ("ISSUE_ROUTER_INFERENCE_TIMEOUT_MS", "250"),
            ("ISSUE_ROUTER_VERIFY_CHECKSUMS", "false"),
        ]
        .into_iter()
        .collect();
        let config = RouterConfig::default().with_overrides(|key| vars.get(key).map(|v| v.to_string()))?;
        assert_eq!(config.confidence_threshold, 0.8);
        assert_eq!(config.inference_timeout_ms, 250);
        assert!(!config.verify_checksums);
        Ok(())
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let result = RouterConfig::default().with_overrides(|key| {
            (key == "ISSUE_ROUTER_INFERENCE_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ClassifierError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = RouterConfig { confidence_threshold: 1.2, ..RouterConfig::default() };
        assert!(config.validate().is_err());
        let config = RouterConfig { max_concurrent_inferences: 0, ..RouterConfig::default() };
        assert!(config.validate().is_err());
        let config = RouterConfig { inference_timeout_ms: 0, ..RouterConfig::default() };
        assert!(config.validate().is_err());
    }
}
