//! Image generation requests and results.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Asset reference used whenever a real illustration is unavailable
pub const DEFAULT_PLACEHOLDER_URL: &str = "/assets/placeholder-image.png";

/// Requested image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| format!("invalid image size '{}', expected WIDTHxHEIGHT", s))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| format!("invalid image width in '{}'", s))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid image height in '{}'", s))?;
        Ok(Self { width, height })
    }
}

/// A single image request
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: ImageSize,
    /// Number of images to request
    pub n: u32,
    /// Download the asset to local storage after generation
    pub persist: bool,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            size: ImageSize::default(),
            n: 1,
            persist: true,
        }
    }

    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    pub fn without_persist(mut self) -> Self {
        self.persist = false;
        self
    }
}

/// Uniform response of the image-generation capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerationResult {
    pub success: bool,

    /// Remote asset URL (empty on failure)
    #[serde(default)]
    pub url: String,

    /// Durable local copy, when downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageGenerationResult {
    pub fn ok(url: impl Into<String>) -> Self {
        Self {
            success: true,
            url: url.into(),
            local_path: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            url: String::new(),
            local_path: None,
            error: Some(error.into()),
        }
    }

    /// True when the result carries a usable asset reference
    pub fn has_asset(&self) -> bool {
        self.success
            && (!self.url.trim().is_empty()
                || self
                    .local_path
                    .as_ref()
                    .is_some_and(|p| !p.as_os_str().is_empty()))
    }
}

/// Outcome of one placement's illustration.
///
/// The pipeline builds these through [`ImageResult::from_generation`], whose
/// two branches keep `success` and `is_placeholder` mutually exclusive and
/// give every failed generation the placeholder reference. Fields stay public
/// so run logs can read results back; values built by hand are not checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    /// Position of the placement in the plan (input order)
    pub placement_index: usize,

    pub prompt: String,

    pub image_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,

    pub is_placeholder: bool,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_time_ms: Option<u64>,
}

impl ImageResult {
    /// Convert a generation result, substituting the placeholder when no asset exists
    pub fn from_generation(
        placement_index: usize,
        prompt: String,
        result: ImageGenerationResult,
        placeholder_url: &str,
        generation_time_ms: u64,
    ) -> Self {
        if result.has_asset() {
            let image_url = if result.url.trim().is_empty() {
                result
                    .local_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default()
            } else {
                result.url
            };
            Self::succeeded(
                placement_index,
                prompt,
                image_url,
                result.local_path,
                generation_time_ms,
            )
        } else {
            let error = result
                .error
                .unwrap_or_else(|| "image generation returned no asset".to_string());
            Self::placeholder(placement_index, prompt, placeholder_url, error)
                .with_generation_time(generation_time_ms)
        }
    }

    pub fn succeeded(
        placement_index: usize,
        prompt: String,
        image_url: String,
        local_path: Option<PathBuf>,
        generation_time_ms: u64,
    ) -> Self {
        Self {
            placement_index,
            prompt,
            image_url,
            local_path,
            is_placeholder: false,
            success: true,
            error: None,
            generation_time_ms: Some(generation_time_ms),
        }
    }

    pub fn placeholder(
        placement_index: usize,
        prompt: String,
        placeholder_url: &str,
        error: impl Into<String>,
    ) -> Self {
        Self {
            placement_index,
            prompt,
            image_url: placeholder_url.to_string(),
            local_path: None,
            is_placeholder: true,
            success: false,
            error: Some(error.into()),
            generation_time_ms: None,
        }
    }

    fn with_generation_time(mut self, ms: u64) -> Self {
        self.generation_time_ms = Some(ms);
        self
    }

    /// Reference to embed in the article (local copy preferred)
    pub fn display_url(&self) -> String {
        match &self.local_path {
            Some(path) if !self.is_placeholder => path.to_string_lossy().into_owned(),
            _ => self.image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_size_parse() {
        let size: ImageSize = "1792x1024".parse().unwrap();
        assert_eq!(size, ImageSize { width: 1792, height: 1024 });
        assert_eq!(size.to_string(), "1792x1024");
        assert!("square".parse::<ImageSize>().is_err());
    }

    #[test]
    fn test_failed_generation_becomes_placeholder() {
        let result = ImageResult::from_generation(
            1,
            "prompt".to_string(),
            ImageGenerationResult::failed("boom"),
            DEFAULT_PLACEHOLDER_URL,
            10,
        );

        assert!(!result.success);
        assert!(result.is_placeholder);
        assert_eq!(result.image_url, DEFAULT_PLACEHOLDER_URL);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_success_without_url_becomes_placeholder() {
        let result = ImageResult::from_generation(
            0,
            "prompt".to_string(),
            ImageGenerationResult::ok(""),
            DEFAULT_PLACEHOLDER_URL,
            10,
        );

        assert!(result.is_placeholder);
        assert!(!result.success);
    }

    #[test]
    fn test_local_path_preferred_for_display() {
        let mut generated = ImageGenerationResult::ok("https://cdn.example/a.png");
        generated.local_path = Some(PathBuf::from("/data/images/a.png"));

        let result =
            ImageResult::from_generation(0, "p".to_string(), generated, DEFAULT_PLACEHOLDER_URL, 5);
        assert!(result.success);
        assert_eq!(result.display_url(), "/data/images/a.png");
        assert_eq!(result.image_url, "https://cdn.example/a.png");
    }

    #[test]
    fn test_success_and_placeholder_are_exclusive() {
        let mut local_only = ImageGenerationResult::ok("");
        local_only.local_path = Some(PathBuf::from("/data/images/b.png"));

        let inputs = vec![
            ImageGenerationResult::ok("https://cdn.example/a.png"),
            ImageGenerationResult::ok("  "),
            ImageGenerationResult::failed("boom"),
            local_only,
        ];
        for (index, generated) in inputs.into_iter().enumerate() {
            let result = ImageResult::from_generation(
                index,
                "p".to_string(),
                generated,
                DEFAULT_PLACEHOLDER_URL,
                1,
            );
            assert_ne!(result.success, result.is_placeholder, "input {}", index);
            if result.is_placeholder {
                assert_eq!(result.image_url, DEFAULT_PLACEHOLDER_URL);
                assert!(result.error.is_some());
            } else {
                assert!(!result.image_url.trim().is_empty());
            }
        }
    }
}
