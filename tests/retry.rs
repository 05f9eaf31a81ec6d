//! Retry and Batch Integration Tests
//!
//! Linear backoff, per-request isolation and bounded concurrency of the
//! image client.

mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use common::{image_client, RecordingSleeper, StalledImages, StubImages};
use quill::adapters::{AssetStore, ImageGenerator};
use quill::core::{BatchSettings, BatchUpdate, ImageClient};
use quill::domain::{ImageGenerationResult, ImageRequest, ImageSize};
use tokio::sync::mpsc;

#[tokio::test]
async fn test_two_failures_then_success() {
    let generator = StubImages::failing_on("书桌", 2);
    let sleeper = RecordingSleeper::new();
    let client = image_client(generator.clone(), sleeper.clone());

    let request = ImageRequest::new("清晨的居家书桌，高清画质").without_persist();
    let result = client.generate_with_retry(&request, 2).await;

    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(generator.calls(), 3);
    assert_eq!(
        sleeper.waits(),
        vec![Duration::from_millis(2000), Duration::from_millis(4000)]
    );
}

#[tokio::test]
async fn test_retries_exhausted_after_max_plus_one_attempts() {
    let generator = StubImages::broken_on("书桌");
    let sleeper = RecordingSleeper::new();
    let client = image_client(generator.clone(), sleeper.clone());

    let request = ImageRequest::new("清晨的居家书桌").without_persist();
    let result = client.generate_with_retry(&request, 2).await;

    assert!(!result.success);
    assert_eq!(generator.calls(), 3);
    assert_eq!(
        result.error.as_deref(),
        Some("image generation failed after 3 attempts: provider rejected request 3")
    );
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let sleeper = RecordingSleeper::new();
    let client = image_client(StubImages::broken_on("损坏"), sleeper);

    let requests: Vec<ImageRequest> = ["第一张", "第二张", "损坏的第三张", "第四张", "第五张"]
        .into_iter()
        .map(ImageRequest::new)
        .collect();

    let results = client.generate_batch(requests, None).await;

    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.placement_index, i);
        if i == 2 {
            assert!(result.is_placeholder);
            assert!(!result.success);
            assert_eq!(result.image_url, "/assets/placeholder-image.png");
        } else {
            assert!(result.success, "request {} should succeed", i);
        }
    }
}

#[tokio::test]
async fn test_empty_batch() {
    let client = image_client(StubImages::healthy(), RecordingSleeper::new());
    assert!(client.generate_batch(Vec::new(), None).await.is_empty());
}

/// Generator that records how many calls overlap
struct OverlapTracker {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl ImageGenerator for OverlapTracker {
    fn name(&self) -> &str {
        "overlap"
    }

    async fn generate(&self, prompt: &str, _size: ImageSize, _n: u32) -> Result<ImageGenerationResult> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(ImageGenerationResult::ok(format!("https://img.test/{}.png", prompt)))
    }
}

#[tokio::test]
async fn test_batch_respects_concurrency_and_cooldown() {
    let tracker = Arc::new(OverlapTracker {
        active: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let sleeper = RecordingSleeper::new();
    let client = ImageClient::new(tracker.clone())
        .with_sleeper(sleeper.clone())
        .with_batch(BatchSettings {
            concurrency: 2,
            ..Default::default()
        });

    let requests: Vec<ImageRequest> = (0..5).map(|i| ImageRequest::new(i.to_string())).collect();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let results = client.generate_batch(requests, Some(tx)).await;

    assert_eq!(results.len(), 5);
    assert!(tracker.peak.load(Ordering::SeqCst) <= 2);

    // Only slots with requests still queued behind them cool down
    let cooldowns = sleeper
        .waits()
        .into_iter()
        .filter(|d| *d == Duration::from_millis(500))
        .count();
    assert_eq!(cooldowns, 3);

    let mut started = Vec::new();
    let mut finished = Vec::new();
    while let Ok(update) = rx.try_recv() {
        match update {
            BatchUpdate::Started { index, .. } => started.push(index),
            BatchUpdate::Finished(result) => finished.push(result.placement_index),
        }
    }
    started.sort_unstable();
    finished.sort_unstable();
    assert_eq!(started, vec![0, 1, 2, 3, 4]);
    assert_eq!(finished, vec![0, 1, 2, 3, 4]);
}

/// Store whose first download yields nothing
struct FlakyStore {
    downloads: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

#[async_trait]
impl AssetStore for FlakyStore {
    async fn download(&self, url: &str) -> Result<Option<PathBuf>> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.downloads.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(None);
        }
        Ok(Some(PathBuf::from("/var/assets/stored.png")))
    }
}

#[tokio::test]
async fn test_empty_download_is_retried() {
    let store = Arc::new(FlakyStore {
        downloads: AtomicUsize::new(0),
        urls: Mutex::new(Vec::new()),
    });
    let sleeper = RecordingSleeper::new();
    let client = image_client(StubImages::healthy(), sleeper.clone()).with_store(store.clone());

    let result = client
        .generate_with_retry(&ImageRequest::new("书桌"), 2)
        .await;

    assert!(result.success);
    assert_eq!(result.local_path, Some(PathBuf::from("/var/assets/stored.png")));
    assert_eq!(store.urls.lock().unwrap().len(), 2);
    assert_eq!(sleeper.waits(), vec![Duration::from_millis(2000)]);
}

#[tokio::test]
async fn test_stalled_request_times_out_into_placeholder() {
    let generator = StalledImages::new();
    let sleeper = RecordingSleeper::new();
    let client = ImageClient::new(generator.clone())
        .with_sleeper(sleeper.clone())
        .with_batch(BatchSettings {
            request_timeout: Duration::from_millis(50),
            ..Default::default()
        });

    let direct = client.generate("书桌", ImageSize::default(), 1).await;
    assert!(!direct.success);
    assert_eq!(
        direct.error.as_deref(),
        Some("image generation timed out after 50ms")
    );

    let results = client
        .generate_batch(vec![ImageRequest::new("书桌").without_persist()], None)
        .await;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_placeholder);
    assert!(!results[0].success);
    assert_eq!(results[0].image_url, "/assets/placeholder-image.png");
    assert_eq!(
        results[0].error.as_deref(),
        Some("image generation failed after 3 attempts: image generation timed out after 50ms")
    );
    // One direct call plus three attempts in the batch
    assert_eq!(generator.calls(), 4);
    assert_eq!(
        sleeper.waits(),
        vec![Duration::from_millis(2000), Duration::from_millis(4000)]
    );
}

/// Generator that writes the file itself and reports only its path
struct LocalFileGenerator;

#[async_trait]
impl ImageGenerator for LocalFileGenerator {
    fn name(&self) -> &str {
        "local"
    }

    async fn generate(&self, _prompt: &str, _size: ImageSize, _n: u32) -> Result<ImageGenerationResult> {
        Ok(ImageGenerationResult {
            success: true,
            url: String::new(),
            local_path: Some(PathBuf::from("/var/assets/generated.png")),
            error: None,
        })
    }
}

#[tokio::test]
async fn test_local_result_is_not_downloaded_again() {
    let store = Arc::new(FlakyStore {
        downloads: AtomicUsize::new(0),
        urls: Mutex::new(Vec::new()),
    });
    let sleeper = RecordingSleeper::new();
    let client = ImageClient::new(Arc::new(LocalFileGenerator))
        .with_sleeper(sleeper.clone())
        .with_store(store.clone());

    let result = client
        .generate_with_retry(&ImageRequest::new("书桌"), 2)
        .await;

    assert!(result.success);
    assert_eq!(result.local_path, Some(PathBuf::from("/var/assets/generated.png")));
    assert!(store.urls.lock().unwrap().is_empty());
    assert!(sleeper.waits().is_empty());
}
