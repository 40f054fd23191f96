//! Model artifact resolution over an ordered list of fallback sources.

use std::fmt;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{RooftopModel, SegmentationError};

/// Log download progress roughly every this many bytes
const PROGRESS_INTERVAL_BYTES: u64 = 10 * 1024 * 1024;

/// One candidate location for the model artifact.
///
/// Sources have no identity beyond their position in the configured list;
/// resolution tries them first to last and stops at the first success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Remote(String),
}

impl ModelSource {
    /// Classify a configured source string: http(s) URLs are remote,
    /// everything else is a filesystem path.
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            Self::Remote(source.to_string())
        } else {
            Self::Local(PathBuf::from(source))
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Resolve a loaded model from the configured sources.
///
/// Runs once at startup; the returned handle is immutable and shared for
/// the process lifetime. Fails with `ModelUnavailable` when every source
/// fails; callers decide whether that is fatal.
pub async fn resolve_model(
    sources: &[ModelSource],
    cache_path: &Path,
    use_cuda: bool,
) -> Result<RooftopModel, SegmentationError> {
    resolve_with(sources, cache_path, |path| RooftopModel::load(path, use_cuda)).await
}

/// Source-iteration core, generic over the deserialization step so the
/// fallback behavior is testable without a real ONNX artifact.
async fn resolve_with<M>(
    sources: &[ModelSource],
    cache_path: &Path,
    loader: impl Fn(&Path) -> Result<M, SegmentationError>,
) -> Result<M, SegmentationError> {
    if sources.is_empty() {
        return Err(SegmentationError::ModelUnavailable(
            "no model sources configured".to_string(),
        ));
    }

    let client = Client::builder()
        .user_agent(concat!("rooftop-analyzer/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SegmentationError::DownloadFailed(e.to_string()))?;

    for (i, source) in sources.iter().enumerate() {
        info!(%source, attempt = i + 1, total = sources.len(), "Trying model source");

        let path = match source {
            ModelSource::Local(path) => {
                if !path.exists() {
                    warn!(path = %path.display(), "Local model file not found");
                    continue;
                }
                path.clone()
            }
            ModelSource::Remote(url) => {
                if cache_path.exists() {
                    debug!(cache = %cache_path.display(), "Model already cached");
                } else if let Err(e) = download_model(&client, url, cache_path).await {
                    warn!(%url, error = %e, "Model download failed");
                    continue;
                }
                cache_path.to_path_buf()
            }
        };

        match loader(&path) {
            Ok(model) => {
                info!(path = %path.display(), "Model loaded");
                return Ok(model);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load model file");
                // A cached artifact that fails to deserialize must not be
                // reused by a later resolution attempt.
                if matches!(source, ModelSource::Remote(_)) {
                    let _ = fs::remove_file(&path).await;
                }
            }
        }
    }

    Err(SegmentationError::ModelUnavailable(format!(
        "all {} model sources failed",
        sources.len()
    )))
}

/// Download the artifact to `dest`, streaming through a temp file so a
/// failed or interrupted transfer never leaves a file at the cache path.
async fn download_model(client: &Client, url: &str, dest: &Path) -> Result<(), SegmentationError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    info!(%url, dest = %dest.display(), "Downloading model file");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SegmentationError::DownloadFailed(format!("Request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(SegmentationError::DownloadFailed(format!(
            "HTTP {}: {url}",
            response.status()
        )));
    }

    let temp_path = dest.with_extension("tmp");
    let result = stream_to_file(response, &temp_path).await;

    match result {
        Ok((downloaded, hash)) => {
            fs::rename(&temp_path, dest).await?;
            info!(
                dest = %dest.display(),
                bytes = downloaded,
                sha256 = %hash,
                "Download complete"
            );
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            Err(e)
        }
    }
}

async fn stream_to_file(
    response: reqwest::Response,
    temp_path: &Path,
) -> Result<(u64, String), SegmentationError> {
    let total_size = response.content_length();
    let mut file = fs::File::create(temp_path).await?;

    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut last_reported: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| SegmentationError::DownloadFailed(format!("Download failed: {e}")))?;

        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if downloaded - last_reported >= PROGRESS_INTERVAL_BYTES {
            last_reported = downloaded;
            info!(
                downloaded_mb = downloaded / (1024 * 1024),
                total_mb = total_size.map(|t| t / (1024 * 1024)),
                "Download progress"
            );
        }
    }

    file.flush().await?;
    drop(file);

    Ok((downloaded, hex_encode(hasher.finalize())))
}

fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept_all(_: &Path) -> Result<(), SegmentationError> {
        Ok(())
    }

    fn reject_all(_: &Path) -> Result<(), SegmentationError> {
        Err(SegmentationError::Onnx("not a model".to_string()))
    }

    #[tokio::test]
    async fn test_local_source_wins_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.onnx");
        std::fs::write(&model_path, b"weights").unwrap();

        let sources = vec![
            ModelSource::Local(model_path.clone()),
            // Unresolvable by construction; must never be contacted.
            ModelSource::Remote("https://unreachable.invalid/model.onnx".to_string()),
        ];
        let cache = dir.path().join("cache").join("model.onnx");

        let loaded = resolve_with(&sources, &cache, |path| {
            assert_eq!(path, model_path.as_path());
            Ok(())
        })
        .await;

        assert!(loaded.is_ok());
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_a_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![
            ModelSource::Local(dir.path().join("missing.onnx")),
            ModelSource::Remote("https://unreachable.invalid/model.onnx".to_string()),
        ];
        let cache = dir.path().join("cache").join("model.onnx");

        let result = resolve_with(&sources, &cache, accept_all).await;

        assert!(matches!(
            result,
            Err(SegmentationError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_source_list_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("model.onnx");

        let result = resolve_with(&[], &cache, accept_all).await;

        assert!(matches!(
            result,
            Err(SegmentationError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![ModelSource::Remote(
            "https://unreachable.invalid/model.onnx".to_string(),
        )];
        let cache = dir.path().join("cache").join("model.onnx");

        let result = resolve_with(&sources, &cache, accept_all).await;

        assert!(result.is_err());
        assert!(!cache.exists());
        assert!(!cache.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_cached_artifact_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("model.onnx");
        std::fs::write(&cache, b"garbage").unwrap();

        let sources = vec![ModelSource::Remote(
            "https://unreachable.invalid/model.onnx".to_string(),
        )];

        let result = resolve_with(&sources, &cache, reject_all).await;

        assert!(result.is_err());
        assert!(!cache.exists(), "corrupt cache file must not survive");
    }

    #[tokio::test]
    async fn test_local_source_is_never_deleted_on_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.onnx");
        std::fs::write(&model_path, b"garbage").unwrap();

        let sources = vec![ModelSource::Local(model_path.clone())];
        let cache = dir.path().join("cache").join("model.onnx");

        let result = resolve_with(&sources, &cache, reject_all).await;

        assert!(result.is_err());
        assert!(model_path.exists());
    }

    #[test]
    fn test_source_parse() {
        assert!(matches!(
            ModelSource::parse("https://example.com/m.onnx"),
            ModelSource::Remote(_)
        ));
        assert!(matches!(
            ModelSource::parse("http://example.com/m.onnx"),
            ModelSource::Remote(_)
        ));
        assert!(matches!(
            ModelSource::parse("./rooftop_best_model.onnx"),
            ModelSource::Local(_)
        ));
    }
}
