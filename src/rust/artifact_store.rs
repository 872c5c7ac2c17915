use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::classifier::ClassifierError;
use crate::config::RouterConfig;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact missing: {0}")]
    Missing(String),
    #[error("Manifest missing in {0}")]
    ManifestMissing(String),
    #[error("Invalid manifest: {0}")]
    InvalidManifest(#[from] serde_json::Error),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

impl From<ArtifactError> for ClassifierError {
    fn from(err: ArtifactError) -> Self {
        ClassifierError::ModelLoadError(err.to_string())
    }
}

/// SHA-256 digests of the bundle files, written next to them as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub model_sha256: String,
    pub vocab_sha256: String,
    pub labels_sha256: String,
    #[serde(default)]
    pub label_set_version: Option<String>,
}

/// Locates, verifies and fetches the model bundle: ONNX model, vocabulary
/// and label snapshot.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    artifacts_dir: PathBuf,
    model_file: PathBuf,
    vocab_file: PathBuf,
    labels_file: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ArtifactStore {
    /// Returns the default artifacts directory path
    pub fn default_artifacts_dir() -> PathBuf {
        Self::artifacts_dir_from(|key| env::var(key).ok())
    }

    fn artifacts_dir_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(path) = lookup("ISSUE_ROUTER_HOME") {
            return PathBuf::from(path).join("artifacts");
        }
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("issue-router").join("artifacts");
        }
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("issue-router").join("artifacts");
        }
        env::temp_dir().join("issue-router").join("artifacts")
    }

    pub fn new<P: AsRef<Path>>(artifacts_dir: P) -> io::Result<Self> {
        let defaults = RouterConfig::default();
        Self::with_files(artifacts_dir, defaults.model_file, defaults.vocab_file, defaults.labels_file)
    }

    /// Creates a store using the directory and file names from `config`.
    pub fn from_config(config: &RouterConfig) -> io::Result<Self> {
        let dir = config.artifacts_dir.clone().unwrap_or_else(Self::default_artifacts_dir);
        Self::with_files(
            dir,
            config.model_file.clone(),
            config.vocab_file.clone(),
            config.labels_file.clone(),
        )
    }

    fn with_files<P: AsRef<Path>>(
        artifacts_dir: P,
        model_file: PathBuf,
        vocab_file: PathBuf,
        labels_file: PathBuf,
    ) -> io::Result<Self> {
        let artifacts_dir = artifacts_dir.as_ref().to_path_buf();
        fs::create_dir_all(&artifacts_dir)?;
        Ok(Self {
            artifacts_dir,
            model_file,
            vocab_file,
            labels_file,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.artifacts_dir.join(&self.model_file)
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.artifacts_dir.join(&self.vocab_file)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.artifacts_dir.join(&self.labels_file)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.artifacts_dir.join(MANIFEST_FILE)
    }

    pub fn is_complete(&self) -> bool {
        let paths = [self.model_path(), self.vocab_path(), self.labels_path()];
        for path in &paths {
            log::debug!("  {:?} (exists: {})", path, path.exists());
        }
        paths.iter().all(|p| p.exists())
    }

    pub fn read_manifest(&self) -> Result<Option<ArtifactManifest>, ArtifactError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Writes a manifest describing the files currently in the store.
    pub fn write_manifest(&self, label_set_version: Option<String>) -> Result<ArtifactManifest, ArtifactError> {
        let manifest = ArtifactManifest {
            model_sha256: Self::hash_file(&self.model_path())?,
            vocab_sha256: Self::hash_file(&self.vocab_path())?,
            labels_sha256: Self::hash_file(&self.labels_path())?,
            label_set_version,
        };
        fs::write(self.manifest_path(), serde_json::to_string_pretty(&manifest)?)?;
        Ok(manifest)
    }

    fn hash_bytes(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    fn hash_file(path: &Path) -> Result<String, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::Missing(path.display().to_string()));
        }
        Ok(Self::hash_bytes(&fs::read(path)?))
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<(), ArtifactError> {
        log::info!("Verifying file: {:?}", path);
        let actual = Self::hash_file(path)?;
        if actual != expected_hash {
            log::error!("Hash mismatch for {:?}: expected {}, got {}", path, expected_hash, actual);
            return Err(ArtifactError::HashMismatch {
                file: path.display().to_string(),
                expected: expected_hash.to_string(),
                actual,
            });
        }
        Ok(())
    }

    /// Checks every bundle file against the manifest digests.
    ///
    /// # Errors
    /// - `ManifestMissing` if the store has no manifest
    /// - `Missing` if a bundle file is absent
    /// - `HashMismatch` if a file's digest differs from the manifest
    pub fn verify_bundle(&self) -> Result<ArtifactManifest, ArtifactError> {
        let manifest = self
            .read_manifest()?
            .ok_or_else(|| ArtifactError::ManifestMissing(self.artifacts_dir.display().to_string()))?;
        self.verify_file(&self.model_path(), &manifest.model_sha256)?;
        self.verify_file(&self.vocab_path(), &manifest.vocab_sha256)?;
        self.verify_file(&self.labels_path(), &manifest.labels_sha256)?;
        log::info!("Artifact bundle verified successfully");
        Ok(manifest)
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: &str,
    ) -> Result<(), ArtifactError> {
        log::info!("Downloading {} to {:?}", url, path);
        let response = reqwest::get(url).await?.error_for_status()?;
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        let hash = Self::hash_bytes(&bytes);
        if hash != expected_hash {
            log::error!("Hash mismatch for {}: expected {}, got {}", url, expected_hash, hash);
            return Err(ArtifactError::HashMismatch {
                file: url.to_string(),
                expected: expected_hash.to_string(),
                actual: hash,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;
        self.verify_file(path, expected_hash)
    }

    /// Fetches `manifest.json` and the bundle files from `base_url`,
    /// verifying each file against the fetched manifest. Files already
    /// present with the right digest are not downloaded again. The local
    /// manifest is only replaced once every file verifies.
    pub async fn fetch_bundle(&self, base_url: &str) -> Result<ArtifactManifest, ArtifactError> {
        let _lock = self.download_lock.lock().await;
        let base_url = base_url.trim_end_matches('/');

        let manifest_url = format!("{}/{}", base_url, MANIFEST_FILE);
        log::info!("Fetching manifest from {}", manifest_url);
        let manifest: ArtifactManifest = reqwest::get(&manifest_url).await?.error_for_status()?.json().await?;

        let files = [
            (self.model_file.clone(), self.model_path(), manifest.model_sha256.clone()),
            (self.vocab_file.clone(), self.vocab_path(), manifest.vocab_sha256.clone()),
            (self.labels_file.clone(), self.labels_path(), manifest.labels_sha256.clone()),
        ];
        for (name, path, hash) in &files {
            if path.exists() && self.verify_file(path, hash).is_ok() {
                log::info!("Existing {:?} verified, skipping download", path);
                continue;
            }
            let url = format!("{}/{}", base_url, name.to_string_lossy());
            if let Err(e) = self.download_and_verify_file(&url, path, hash).await {
                log::error!("Failed to fetch {}: {}", url, e);
                // Files verified earlier in this loop stay; only the failed one goes.
                if path.exists() {
                    if let Err(remove_err) = fs::remove_file(path) {
                        log::error!("Failed to remove {:?} after failed fetch: {}", path, remove_err);
                    }
                }
                return Err(e);
            }
        }

        fs::write(self.manifest_path(), serde_json::to_string_pretty(&manifest)?)?;
        log::info!("Artifact bundle ready in {:?}", self.artifacts_dir);
        Ok(manifest)
    }

    pub fn remove_bundle(&self) -> Result<(), ArtifactError> {
        for path in [self.model_path(), self.vocab_path(), self.labels_path(), self.manifest_path()] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
