//! Configuration for quill.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (QUILL_HOME, QUILL_API_KEY, QUILL_BASE_URL)
//! 2. Config file (.quill/config.yaml)
//! 3. Defaults (~/.quill, OpenAI endpoint)
//!
//! Config file discovery:
//! - Searches the start directory and its parents for .quill/config.yaml
//! - Paths in the config file are relative to the .quill/ directory
//!
//! There is no process-wide cache: the owner holds a [`ConfigCache`] and
//! calls [`ConfigCache::invalidate`] when the configuration changes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::ProviderSettings;
use crate::core::{BatchSettings, RetryPolicy};
use crate::domain::{ImageSize, DEFAULT_PLACEHOLDER_URL};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TEXT_MODEL: &str = "gpt-4o";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 180;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub images: Option<ImagesConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to the .quill/ directory)
    pub home: Option<String>,
    /// Directory for downloaded images
    pub assets: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagesConfig {
    pub concurrency: Option<usize>,
    pub batch_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub size: Option<String>,
    pub placeholder_url: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// State directory (run logs)
    pub home: PathBuf,
    /// Directory for downloaded images
    pub assets_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub provider: ProviderDefaults,
    pub images: ImageSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderDefaults {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSettings {
    pub concurrency: usize,
    pub batch_delay_ms: u64,
    pub retry: RetryPolicy,
    pub size: ImageSize,
    pub placeholder_url: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            concurrency: 3,
            batch_delay_ms: 500,
            retry: RetryPolicy::default(),
            size: ImageSize::default(),
            placeholder_url: DEFAULT_PLACEHOLDER_URL.to_string(),
        }
    }
}

impl ResolvedConfig {
    /// Directory holding one subdirectory per run
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.request_timeout_seconds)
    }

    /// Connection settings for the HTTP adapters
    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            base_url: self.provider.base_url.clone(),
            api_key: self.provider.api_key.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    /// Scheduling settings for image batches
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            concurrency: self.images.concurrency.max(1),
            batch_delay: Duration::from_millis(self.images.batch_delay_ms),
            request_timeout: self.request_timeout(),
            placeholder_url: self.images.placeholder_url.clone(),
        }
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".quill").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge defaults, an optional config file and environment lookups
fn resolve(
    default_home: PathBuf,
    config_file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let (config_path, file) = match config_file {
        Some((path, file)) => (Some(path), file),
        None => (None, ConfigFile::default()),
    };
    let quill_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let home = if let Some(env_home) = env("QUILL_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = file.paths.home {
        resolve_path(&quill_dir, home_path)
    } else {
        default_home
    };

    let assets_dir = match file.paths.assets {
        Some(ref assets) => resolve_path(&quill_dir, assets),
        None => home.join("assets"),
    };

    let provider_file = file.provider.unwrap_or_default();
    let provider = ProviderDefaults {
        base_url: env("QUILL_BASE_URL")
            .or(provider_file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        api_key: env("QUILL_API_KEY")
            .or(provider_file.api_key)
            .or_else(|| env("OPENAI_API_KEY")),
        text_model: provider_file
            .text_model
            .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
        image_model: provider_file
            .image_model
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
        request_timeout_seconds: provider_file
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
    };

    let images_file = file.images.unwrap_or_default();
    let defaults = ImageSettings::default();
    let size = match images_file.size {
        Some(ref size) => size
            .parse::<ImageSize>()
            .map_err(anyhow::Error::msg)
            .context("Invalid images.size in config file")?,
        None => defaults.size,
    };
    let images = ImageSettings {
        concurrency: images_file.concurrency.unwrap_or(defaults.concurrency),
        batch_delay_ms: images_file.batch_delay_ms.unwrap_or(defaults.batch_delay_ms),
        retry: RetryPolicy {
            max_retries: images_file
                .max_retries
                .unwrap_or(defaults.retry.max_retries),
            base_delay_ms: images_file
                .retry_base_delay_ms
                .unwrap_or(defaults.retry.base_delay_ms),
        },
        size,
        placeholder_url: images_file
            .placeholder_url
            .unwrap_or(defaults.placeholder_url),
    };

    Ok(ResolvedConfig {
        home,
        assets_dir,
        config_file: config_path,
        provider,
        images,
    })
}

/// Load configuration from all sources, searching upward from `start`
pub fn load_config(start: &Path) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".quill");

    let config_file = match find_config_file(start) {
        Some(path) => {
            let file = load_config_file(&path)?;
            Some((path, file))
        }
        None => None,
    };

    resolve(default_home, config_file, |key| std::env::var(key).ok())
}

/// Lazily loaded configuration owned by the caller
pub struct ConfigCache {
    start: PathBuf,
    cached: Mutex<Option<Arc<ResolvedConfig>>>,
}

impl ConfigCache {
    /// Cache that discovers its config file from `start`
    pub fn new(start: impl Into<PathBuf>) -> Self {
        Self {
            start: start.into(),
            cached: Mutex::new(None),
        }
    }

    /// Cache rooted at the current working directory
    pub fn from_current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        Ok(Self::new(cwd))
    }

    /// Current configuration, loading it on first use
    pub fn get(&self) -> Result<Arc<ResolvedConfig>> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| anyhow::anyhow!("Configuration cache lock poisoned"))?;

        if let Some(config) = cached.as_ref() {
            return Ok(config.clone());
        }

        let config = Arc::new(load_config(&self.start)?);
        *cached = Some(config.clone());
        Ok(config)
    }

    /// Drop the cached configuration; the next `get` reloads it
    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }
}
