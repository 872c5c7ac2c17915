mod common;

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use issue_router::{load_classifier, ArtifactError, ArtifactStore, ClassifierError, RouterConfig};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const MODEL_BYTES: &[u8] = b"fake model bytes";
const LABELS_JSON: &str = r#"{"version": "catalog-3", "labels": ["Printer", "Scanner"]}"#;

fn sha256(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Serves `routes` over HTTP on a local port, recording every requested path.
async fn serve(routes: HashMap<String, Vec<u8>>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let routes = Arc::new(routes);
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                while read < buf.len() {
                    let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").trim_start_matches('/').to_string();
                seen.lock().unwrap().push(path.clone());

                let (status, body) = match routes.get(&path) {
                    Some(body) => ("200 OK", body.clone()),
                    None => ("404 Not Found", Vec::new()),
                };
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), requests)
}

fn bundle_routes(labels_served: &str) -> HashMap<String, Vec<u8>> {
    let vocab = common::VOCAB.join("\n");
    let manifest = serde_json::json!({
        "model_sha256": sha256(MODEL_BYTES),
        "vocab_sha256": sha256(vocab.as_bytes()),
        "labels_sha256": sha256(LABELS_JSON.as_bytes()),
        "label_set_version": "catalog-3",
    });
    HashMap::from([
        ("manifest.json".to_string(), manifest.to_string().into_bytes()),
        ("model.onnx".to_string(), MODEL_BYTES.to_vec()),
        ("vocab.txt".to_string(), vocab.into_bytes()),
        ("labels.json".to_string(), labels_served.as_bytes().to_vec()),
    ])
}

fn write_bundle(store: &ArtifactStore) -> std::io::Result<()> {
    fs::write(store.model_path(), b"not really a model")?;
    fs::write(store.vocab_path(), common::VOCAB.join("\n"))?;
    fs::write(
        store.labels_path(),
        r#"{"version": "catalog-3", "labels": ["Printer", "Scanner", "Laptop", "Monitor", "Keyboard", "Mouse"]}"#,
    )
}

#[test]
fn test_manifest_round_trip_verifies() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    write_bundle(&store)?;
    assert!(store.is_complete());

    assert!(store.read_manifest()?.is_none());
    let written = store.write_manifest(Some("catalog-3".into()))?;
    assert_eq!(written.model_sha256.len(), 64);

    let verified = store.verify_bundle()?;
    assert_eq!(verified, written);
    assert_eq!(verified.label_set_version.as_deref(), Some("catalog-3"));
    Ok(())
}

#[test]
fn test_corrupted_file_fails_verification() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    write_bundle(&store)?;
    store.write_manifest(None)?;

    fs::write(store.vocab_path(), "corrupted data")?;
    match store.verify_bundle() {
        Err(ArtifactError::HashMismatch { file, .. }) => assert!(file.ends_with("vocab.txt")),
        other => panic!("expected hash mismatch, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_verify_without_manifest() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    write_bundle(&store)?;
    assert!(matches!(store.verify_bundle(), Err(ArtifactError::ManifestMissing(_))));
    Ok(())
}

#[test]
fn test_load_refuses_tampered_bundle() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = RouterConfig {
        artifacts_dir: Some(dir.path().to_path_buf()),
        ..RouterConfig::default()
    };
    let store = ArtifactStore::from_config(&config)?;
    write_bundle(&store)?;
    store.write_manifest(None)?;
    fs::write(store.labels_path(), r#"{"labels": ["Printer"]}"#)?;

    match load_classifier(&config) {
        Err(ClassifierError::ModelLoadError(msg)) => assert!(msg.contains("Hash mismatch")),
        other => panic!("expected ModelLoadError, got {:?}", other.map(|_| ())),
    }
    Ok(())
}

#[test]
fn test_remove_bundle() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    write_bundle(&store)?;
    store.write_manifest(None)?;

    store.remove_bundle()?;
    assert!(!store.is_complete());
    assert!(!store.manifest_path().exists());
    Ok(())
}

#[tokio::test]
async fn test_fetch_bundle_downloads_and_verifies() -> Result<(), Box<dyn std::error::Error>> {
    let (base_url, requests) = serve(bundle_routes(LABELS_JSON)).await;
    let dir = tempfile::tempdir()?;
    let store = ArtifactStore::new(dir.path())?;

    let manifest = store.fetch_bundle(&base_url).await?;
    assert_eq!(manifest.label_set_version.as_deref(), Some("catalog-3"));
    assert_eq!(store.verify_bundle()?, manifest);
    assert_eq!(fs::read(store.model_path())?, MODEL_BYTES);

    // A second fetch only needs the manifest.
    requests.lock().unwrap().clear();
    store.fetch_bundle(&base_url).await?;
    assert_eq!(*requests.lock().unwrap(), vec!["manifest.json".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_failed_fetch_keeps_verified_files() -> Result<(), Box<dyn std::error::Error>> {
    let (base_url, _) = serve(bundle_routes(r#"{"labels": ["Tampered"]}"#)).await;
    let dir = tempfile::tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    fs::write(store.vocab_path(), common::VOCAB.join("\n"))?;
    fs::write(store.labels_path(), "stale labels")?;

    match store.fetch_bundle(&base_url).await {
        Err(ArtifactError::HashMismatch { file, .. }) => assert!(file.ends_with("labels.json")),
        other => panic!("expected hash mismatch, got {:?}", other),
    }

    assert_eq!(fs::read_to_string(store.vocab_path())?, common::VOCAB.join("\n"));
    assert_eq!(fs::read(store.model_path())?, MODEL_BYTES);
    assert!(!store.labels_path().exists());
    assert!(!store.manifest_path().exists());
    Ok(())
}
