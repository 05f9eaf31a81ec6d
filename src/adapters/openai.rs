//! OpenAI-compatible HTTP adapters.
//!
//! Works against any provider exposing `/chat/completions` and
//! `/images/generations` (OpenAI, DeepSeek, local gateways). Every request
//! carries a client-level timeout so one stalled call cannot hang a run.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ImageGenerator, TextGenerator};
use crate::domain::{ImageGenerationResult, ImageSize};

/// Connection settings shared by the HTTP adapters
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// API root, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    pub api_key: Option<String>,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ProviderSettings {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .context("Failed to build HTTP client")
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) if !key.is_empty() => request.bearer_auth(key),
            _ => request,
        }
    }
}

/// Error body returned by OpenAI-compatible APIs
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .map(|e| e.message)
        .unwrap_or(body);
    format!("HTTP {}: {}", status, detail.trim())
}

/// Chat-completions text generator
pub struct OpenAiTextGenerator {
    settings: ProviderSettings,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiTextGenerator {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = settings.build_client()?;
        Ok(Self { settings, client })
    }
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    fn name(&self) -> &str {
        "openai-chat"
    }

    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String> {
        let url = self.settings.endpoint("chat/completions");
        debug!(%url, model, "Requesting chat completion");

        let response = self
            .settings
            .authorize(self.client.post(&url))
            .json(&json!({
                "model": model,
                "messages": [
                    { "role": "system", "content": system_prompt },
                    { "role": "user", "content": user_prompt },
                ],
            }))
            .send()
            .await
            .with_context(|| format!("Chat completion request to {} failed", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Chat completion failed: {}", error_message(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .context("Chat completion returned no content")
    }
}

/// Images-API generator
pub struct OpenAiImageGenerator {
    settings: ProviderSettings,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    url: Option<String>,
}

impl OpenAiImageGenerator {
    pub fn new(settings: ProviderSettings, model: impl Into<String>) -> Result<Self> {
        let client = settings.build_client()?;
        Ok(Self {
            settings,
            model: model.into(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    fn name(&self) -> &str {
        "openai-images"
    }

    async fn generate(
        &self,
        prompt: &str,
        size: ImageSize,
        n: u32,
    ) -> Result<ImageGenerationResult> {
        let url = self.settings.endpoint("images/generations");
        debug!(%url, model = %self.model, %size, "Requesting image generation");

        let response = self
            .settings
            .authorize(self.client.post(&url))
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "size": size.to_string(),
                "n": n.max(1),
            }))
            .send()
            .await
            .with_context(|| format!("Image generation request to {} failed", url))?;

        if !response.status().is_success() {
            return Ok(ImageGenerationResult::failed(error_message(response).await));
        }

        let body: ImagesResponse = response
            .json()
            .await
            .context("Failed to parse image generation response")?;

        match body.data.into_iter().find_map(|d| d.url) {
            Some(image_url) if !image_url.is_empty() => Ok(ImageGenerationResult::ok(image_url)),
            _ => Ok(ImageGenerationResult::failed(
                "Image generation response contained no URL",
            )),
        }
    }
}
