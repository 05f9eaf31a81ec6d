//! Adapter interfaces for external capabilities.
//!
//! The pipeline depends on three capabilities: text generation, image
//! generation and durable asset storage. Production implementations talk to
//! an OpenAI-compatible HTTP API and the local filesystem; tests substitute
//! in-process stubs.

pub mod openai;
pub mod storage;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{ImageGenerationResult, ImageSize};

pub use openai::{OpenAiImageGenerator, OpenAiTextGenerator, ProviderSettings};
pub use storage::LocalAssetStore;

/// Large-language-model text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Produce a completion for the given prompts
    async fn generate(&self, model: &str, system_prompt: &str, user_prompt: &str)
        -> Result<String>;
}

/// Text-to-image generation
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Request `n` images for a prompt.
    ///
    /// Provider-level failures may be reported either as `Err` or as a result
    /// with `success == false`; callers treat both the same way.
    async fn generate(&self, prompt: &str, size: ImageSize, n: u32)
        -> Result<ImageGenerationResult>;
}

/// Durable storage for generated assets
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Download a remote asset, returning its local path (None if nothing was stored)
    async fn download(&self, url: &str) -> Result<Option<PathBuf>>;
}
