//! Local durable storage for generated illustrations.
//!
//! Files are write-once: every download gets a fresh
//! `<timestamp>_<random>.<ext>` name and is created with `create_new`, so
//! concurrent runs never overwrite each other's assets.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::AssetStore;

/// Downloads remote images into a local directory
pub struct LocalAssetStore {
    dir: PathBuf,
    client: reqwest::Client,
}

impl LocalAssetStore {
    pub fn new(dir: impl Into<PathBuf>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            dir: dir.into(),
            client,
        })
    }

    async fn write_new(&self, bytes: &[u8], extension: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create asset directory: {}", self.dir.display()))?;

        let path = self.dir.join(unique_filename(extension));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to create asset file: {}", path.display()))?;

        file.write_all(bytes)
            .await
            .with_context(|| format!("Failed to write asset file: {}", path.display()))?;
        file.flush().await.context("Failed to flush asset file")?;

        Ok(path)
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn download(&self, url: &str) -> Result<Option<PathBuf>> {
        if url.trim().is_empty() {
            return Ok(None);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download asset: {}", url))?;

        if !response.status().is_success() {
            warn!(%url, status = %response.status(), "Asset download returned an error status");
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read asset body")?;
        if bytes.is_empty() {
            return Ok(None);
        }

        let path = self.write_new(&bytes, extension_for(url)).await?;
        debug!(path = %path.display(), size = bytes.len(), "Stored asset");
        Ok(Some(path))
    }
}

/// Collision-resistant asset filename
pub fn unique_filename(extension: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!(
        "{}_{:08x}.{}",
        Utc::now().format("%Y%m%d%H%M%S%3f"),
        suffix,
        extension
    )
}

/// Pick a file extension from the URL path, defaulting to png
fn extension_for(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "jpg"
    } else if path.ends_with(".webp") {
        "webp"
    } else {
        "png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unique_filenames_differ() {
        let a = unique_filename("png");
        let b = unique_filename("png");
        assert_ne!(a, b);
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn test_extension_detection() {
        assert_eq!(extension_for("https://cdn/a.JPG?sig=1"), "jpg");
        assert_eq!(extension_for("https://cdn/a.webp"), "webp");
        assert_eq!(extension_for("https://cdn/image"), "png");
    }

    #[tokio::test]
    async fn test_write_new_creates_distinct_files() {
        let temp = TempDir::new().unwrap();
        let store = LocalAssetStore::new(temp.path().join("images"), Duration::from_secs(5)).unwrap();

        let first = store.write_new(b"one", "png").await.unwrap();
        let second = store.write_new(b"two", "png").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_empty_url_is_not_downloaded() {
        let temp = TempDir::new().unwrap();
        let store = LocalAssetStore::new(temp.path(), Duration::from_secs(5)).unwrap();
        assert!(store.download("  ").await.unwrap().is_none());
    }
}
