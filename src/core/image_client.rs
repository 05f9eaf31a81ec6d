//! Image generation client.
//!
//! Wraps an [`ImageGenerator`] with a uniform result contract, optional
//! download to durable storage, linear-backoff retry and semaphore-gated
//! batching. Nothing here returns an error: every failure ends up as a
//! result value the pipeline can turn into a placeholder.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::adapters::{AssetStore, ImageGenerator};
use crate::domain::{
    ImageGenerationResult, ImageRequest, ImageResult, ImageSize, DEFAULT_PLACEHOLDER_URL,
};

/// Retry policy for image generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay unit; the wait after attempt `k` is `base_delay_ms * k`
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}
fn default_base_delay() -> u64 {
    2000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
        }
    }
}

impl RetryPolicy {
    /// Delay after a failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }

    /// Whether another attempt follows failed attempt `attempt`
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}

/// Batch scheduling settings
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    /// Requests in flight at once
    pub concurrency: usize,

    /// Cooldown before a finished slot is handed to the next request
    pub batch_delay: Duration,

    /// Timeout for a single generation call
    pub request_timeout: Duration,

    pub placeholder_url: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: 3,
            batch_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(120),
            placeholder_url: DEFAULT_PLACEHOLDER_URL.to_string(),
        }
    }
}

/// Suspends the current task; swapped out in tests to record waits
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real-time sleeper
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Live updates from a running batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchUpdate {
    /// Request `index` acquired a slot and started generating
    Started { index: usize, prompt: String },

    /// Request `index` reached its terminal result
    Finished(ImageResult),
}

/// Image generation with retry, persistence and batching
#[derive(Clone)]
pub struct ImageClient {
    generator: Arc<dyn ImageGenerator>,
    store: Option<Arc<dyn AssetStore>>,
    retry: RetryPolicy,
    batch: BatchSettings,
    sleeper: Arc<dyn Sleeper>,
}

impl ImageClient {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            generator,
            store: None,
            retry: RetryPolicy::default(),
            batch: BatchSettings::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch(mut self, batch: BatchSettings) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// One generation call; errors and timeouts become failed results
    pub async fn generate(&self, prompt: &str, size: ImageSize, n: u32) -> ImageGenerationResult {
        let call = self.generator.generate(prompt, size, n);
        match tokio::time::timeout(self.batch.request_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ImageGenerationResult::failed(format!("{:#}", e)),
            Err(_) => ImageGenerationResult::failed(format!(
                "image generation timed out after {:?}",
                self.batch.request_timeout
            )),
        }
    }

    /// Generate and download the asset to durable storage.
    ///
    /// A failed or empty download fails the attempt, so retries cover it.
    /// Results that already point at a local file are kept as they are.
    pub async fn generate_and_persist(&self, request: &ImageRequest) -> ImageGenerationResult {
        let mut result = self
            .generate(&request.prompt, request.size, request.n)
            .await;

        let Some(store) = &self.store else {
            return result;
        };
        if !result.has_asset() || result.local_path.is_some() {
            return result;
        }

        let download = tokio::time::timeout(self.batch.request_timeout, store.download(&result.url));
        match download.await {
            Ok(Ok(Some(path))) => {
                debug!(path = %path.display(), "Persisted generated image");
                result.local_path = Some(path);
                result
            }
            Ok(Ok(None)) => ImageGenerationResult::failed(format!(
                "download of {} produced no file",
                result.url
            )),
            Ok(Err(e)) => ImageGenerationResult::failed(format!("{:#}", e)),
            Err(_) => ImageGenerationResult::failed(format!(
                "download of {} timed out after {:?}",
                result.url, self.batch.request_timeout
            )),
        }
    }

    /// Up to `max_retries + 1` attempts, waiting `base_delay * attempt` between them
    pub async fn generate_with_retry(
        &self,
        request: &ImageRequest,
        max_retries: u32,
    ) -> ImageGenerationResult {
        let policy = RetryPolicy {
            max_retries,
            ..self.retry.clone()
        };
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = if request.persist {
                self.generate_and_persist(request).await
            } else {
                self.generate(&request.prompt, request.size, request.n).await
            };

            if result.has_asset() {
                return result;
            }

            let error = result
                .error
                .unwrap_or_else(|| "image generation returned no asset".to_string());

            if !policy.should_retry(attempt) {
                error!(attempt, %error, "Image generation failed permanently");
                return ImageGenerationResult::failed(format!(
                    "image generation failed after {} attempts: {}",
                    attempt, error
                ));
            }

            let delay = policy.delay_for_attempt(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                %error,
                "Image generation failed, retrying"
            );
            self.sleeper.sleep(delay).await;
        }
    }

    /// Generate every request with bounded concurrency.
    ///
    /// Results are returned in input order and there is exactly one per
    /// request. A request that exhausts its retries, or whose task dies,
    /// yields a placeholder without affecting the others.
    pub async fn generate_batch(
        &self,
        requests: Vec<ImageRequest>,
        updates: Option<mpsc::UnboundedSender<BatchUpdate>>,
    ) -> Vec<ImageResult> {
        let total = requests.len();
        let concurrency = self.batch.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let prompts: Vec<String> = requests.iter().map(|r| r.prompt.clone()).collect();

        let mut set = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let client = self.clone();
            let semaphore = semaphore.clone();
            let updates = updates.clone();

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();

                send(&updates, BatchUpdate::Started {
                    index,
                    prompt: request.prompt.clone(),
                });

                let started = Instant::now();
                let generated = client
                    .generate_with_retry(&request, client.retry.max_retries)
                    .await;
                let result = ImageResult::from_generation(
                    index,
                    request.prompt,
                    generated,
                    &client.batch.placeholder_url,
                    started.elapsed().as_millis() as u64,
                );

                send(&updates, BatchUpdate::Finished(result.clone()));

                // Hold the slot a little longer while others are still queued
                if index + concurrency < total {
                    client.sleeper.sleep(client.batch.batch_delay).await;
                }

                result
            });
        }

        let mut slots: Vec<Option<ImageResult>> = vec![None; total];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => {
                    let index = result.placement_index;
                    slots[index] = Some(result);
                }
                Err(e) => warn!(error = %e, "Image generation task failed"),
            }
        }

        slots
            .into_iter()
            .zip(prompts)
            .enumerate()
            .map(|(index, (slot, prompt))| {
                slot.unwrap_or_else(|| {
                    let result = ImageResult::placeholder(
                        index,
                        prompt,
                        &self.batch.placeholder_url,
                        "image generation task aborted",
                    );
                    send(&updates, BatchUpdate::Finished(result.clone()));
                    result
                })
            })
            .collect()
    }
}

fn send(updates: &Option<mpsc::UnboundedSender<BatchUpdate>>, update: BatchUpdate) {
    if let Some(tx) = updates {
        // Receiver gone means nobody is listening anymore
        let _ = tx.send(update);
    }
}
