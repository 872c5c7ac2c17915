use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use log::{error, info, warn};
use tokio::sync::{RwLock, Semaphore};

use crate::artifact_store::{ArtifactError, ArtifactStore};
use crate::classifier::{
    ClassificationOutcome, Classifier, ClassifierBuilder, ClassifierError, ConfidenceGate, InferenceFailure,
    RankedResult,
};
use crate::config::RouterConfig;

/// The live product catalog, owned by the storage layer.
pub trait ProductCatalog: Send + Sync {
    fn product_count(&self) -> usize;
}

/// Opaque id of the authenticated user filing the issue. Only used for logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

enum RouterState {
    Loading,
    Ready(Arc<Classifier>),
    Failed(String),
}

/// Entry point used by the request layer.
///
/// Starts in a loading state that rejects every request. `load` (or
/// `install`) moves it to ready; a failed load leaves it failed, still
/// rejecting requests. Inference runs on the blocking pool, bounded by
/// `max_concurrent_inferences` and cut off after `inference_timeout_ms`.
pub struct IssueRouter {
    state: RwLock<RouterState>,
    gate: ConfidenceGate,
    timeout: Duration,
    permits: Arc<Semaphore>,
    catalog: Option<Arc<dyn ProductCatalog>>,
}

impl IssueRouter {
    pub fn new(config: &RouterConfig) -> Result<Self, ClassifierError> {
        config.validate()?;
        Ok(Self {
            state: RwLock::new(RouterState::Loading),
            gate: ConfidenceGate::new(config.confidence_threshold)?,
            timeout: config.inference_timeout(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_inferences)),
            catalog: None,
        })
    }

    /// Checks every request against the live catalog size.
    pub fn with_catalog(mut self, catalog: Arc<dyn ProductCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn gate(&self) -> ConfidenceGate {
        self.gate
    }

    pub async fn is_ready(&self) -> bool {
        matches!(*self.state.read().await, RouterState::Ready(_))
    }

    /// Marks the router ready with an already built classifier.
    ///
    /// # Errors
    /// - `ModelLoadError` if a classifier is already installed
    pub async fn install(&self, classifier: Classifier) -> Result<(), ClassifierError> {
        let mut state = self.state.write().await;
        if matches!(*state, RouterState::Ready(_)) {
            return Err(already_loaded());
        }
        *state = RouterState::Ready(Arc::new(classifier));
        info!("Issue router ready");
        Ok(())
    }

    /// Loads the artifact bundle named by `config` on the blocking pool.
    /// Allowed while loading or after a failed load, never once ready.
    ///
    /// # Errors
    /// - `ModelLoadError` if a classifier is already installed
    /// - any load error; the router then stays in the failed state
    pub async fn load(&self, config: &RouterConfig) -> Result<(), ClassifierError> {
        if self.is_ready().await {
            warn!("Ignoring load request: classifier already loaded");
            return Err(already_loaded());
        }

        let config = config.clone();
        let loaded = tokio::task::spawn_blocking(move || load_classifier(&config))
            .await
            .map_err(|e| ClassifierError::ModelLoadError(format!("Load task failed: {}", e)))
            .and_then(|result| result);

        match loaded {
            Ok(classifier) => self.install(classifier).await,
            Err(e) => {
                error!("Failed to load classifier: {}", e);
                let mut state = self.state.write().await;
                if !matches!(*state, RouterState::Ready(_)) {
                    *state = RouterState::Failed(e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn ready_classifier(&self) -> Result<Arc<Classifier>, ClassifierError> {
        match &*self.state.read().await {
            RouterState::Ready(classifier) => Ok(Arc::clone(classifier)),
            RouterState::Loading => Err(ClassifierError::ModelLoadError(
                "Classifier is still loading; request rejected".into(),
            )),
            RouterState::Failed(reason) => Err(ClassifierError::ModelLoadError(format!(
                "Classifier failed to load: {}",
                reason
            ))),
        }
    }

    /// Ranks every label for `text`.
    ///
    /// # Errors
    /// - `ModelLoadError` if the router is not ready
    /// - `LabelSetDriftError` if the catalog size differs from the label snapshot
    /// - `EmptyInputError` if the text produces no tokens
    /// - `ModelInferenceError` if scoring fails or exceeds the timeout
    pub async fn classify_ranked(&self, text: &str) -> Result<RankedResult, ClassifierError> {
        let classifier = self.ready_classifier().await?;
        if let Some(catalog) = &self.catalog {
            classifier.labels().check_catalog_size(catalog.product_count())?;
        }

        let timeout = self.timeout;
        let permits = Arc::clone(&self.permits);
        let text = text.to_string();
        let inference = async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Err(ClassifierError::engine("Inference pool closed")),
            };
            // The permit moves into the blocking task so it is only released
            // once inference finishes, even if the caller already timed out.
            let task = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                classifier.classify(&text)
            });
            match task.await {
                Ok(result) => result,
                Err(e) => Err(ClassifierError::engine(format!("Inference task failed: {}", e))),
            }
        };

        match tokio::time::timeout(timeout, inference).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Classification timed out after {:?}", timeout);
                Err(ClassifierError::ModelInferenceError(InferenceFailure::Timeout(timeout)))
            }
        }
    }

    /// Classifies an issue filed by `user` and applies the confidence gate.
    pub async fn classify(&self, text: &str, user: &UserId) -> Result<ClassificationOutcome, ClassifierError> {
        self.classify_detailed(text, user).await.map(|(outcome, _)| outcome)
    }

    /// Like `classify`, also returning the full ranking the outcome was taken from.
    pub async fn classify_detailed(
        &self,
        text: &str,
        user: &UserId,
    ) -> Result<(ClassificationOutcome, RankedResult), ClassifierError> {
        info!("Classifying issue for user {}", user);
        let ranked = self.classify_ranked(text).await.map_err(|e| {
            if e.is_request_level() {
                warn!("Classification rejected for user {}: {}", user, e);
            }
            e
        })?;
        let outcome = self.gate.evaluate(&ranked);
        if outcome.is_low_confidence {
            warn!(
                "Low confidence for user {}: '{}' at {:.3} (threshold {})",
                user,
                outcome.best_label,
                outcome.confidence,
                self.gate.threshold()
            );
        } else {
            info!("Classified as '{}' ({:.3})", outcome.best_label, outcome.confidence);
        }
        Ok((outcome, ranked))
    }
}

fn already_loaded() -> ClassifierError {
    ClassifierError::ModelLoadError("Classifier already loaded; reloading is not supported".into())
}

/// Builds a classifier from the artifact bundle described by `config`.
/// Blocking; verifies bundle checksums first when a manifest is present.
pub fn load_classifier(config: &RouterConfig) -> Result<Classifier, ClassifierError> {
    config.validate()?;

    if config.verify_checksums {
        if let Some(dir) = &config.artifacts_dir {
            let store = ArtifactStore::from_config(config).map_err(ArtifactError::from)?;
            if store.read_manifest()?.is_some() {
                store.verify_bundle()?;
            } else {
                warn!("No manifest in {:?}; skipping checksum verification", dir);
            }
        }
    }

    ClassifierBuilder::new()
        .with_runtime_config(config.runtime.clone())
        .with_special_tokens(config.add_special_tokens)
        .with_max_input_chars_per_word(config.max_input_chars_per_word)
        .with_vocabulary_file_and_unknown(config.vocab_path(), &config.unknown_token)?
        .with_label_file(config.labels_path())?
        .with_onnx_model(config.model_path())?
        .build()
}
