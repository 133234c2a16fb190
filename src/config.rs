//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILPRISM_CONFIG` (environment variable)
//! 2. `~/.config/mailprism/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailprism\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assemble::{AssembleOptions, DatePolicy, DEFAULT_BATCH_CONCURRENCY};
use crate::error::{MailError, Result};
use crate::parser::mime::TreeMode;
use crate::render::plain::DEFAULT_PLAIN_WIDTH;
use crate::render::sanitize::ImageProxy;
use crate::store::cache::DEFAULT_CACHE_CAPACITY;

/// Environment variable that overrides the image proxy base URL.
pub const IMAGE_PROXY_ENV: &str = "IMG_PROXY_BASE";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Message assembly settings.
    pub assembly: AssemblyConfig,
    /// Remote message source.
    pub source: SourceConfig,
    /// Assembled-message cache.
    pub cache: CacheConfig,
    /// Bulk assembly.
    pub batch: BatchConfig,
    /// Image handling in sanitized HTML.
    pub images: ImagesConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Message assembly settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// MIME tree shape: "canonical" or "structural".
    pub tree_mode: TreeMode,
    /// Unparseable `Date` header: "epoch" or "strict".
    pub date_policy: DatePolicy,
    /// Maximum line width for the plain-text rendering.
    pub plain_text_width: usize,
}

/// Remote message source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Endpoint answering `?id=<id>&format=raw` with `{"raw": "..."}`.
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Assembled-message cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of assembled messages kept in the LRU cache.
    pub capacity: usize,
}

/// Bulk assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of assemblies in flight.
    pub concurrency: usize,
}

/// Image handling in sanitized HTML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Proxy base URL for remote images. Disabled when unset.
    pub proxy_base: Option<String>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            tree_mode: TreeMode::Canonical,
            date_policy: DatePolicy::Epoch,
            plain_text_width: DEFAULT_PLAIN_WIDTH,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

impl Config {
    /// Options for the assembly stages, honoring `IMG_PROXY_BASE`.
    pub fn assemble_options(&self) -> AssembleOptions {
        let proxy_base = std::env::var(IMAGE_PROXY_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.images.proxy_base.clone());

        AssembleOptions {
            tree_mode: self.assembly.tree_mode,
            date_policy: self.assembly.date_policy,
            plain_text_width: self.assembly.plain_text_width.max(1),
            image_proxy: proxy_base.map(ImageProxy::new),
        }
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_secs)
    }
}

// ── Load ─────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_config_from(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "Loaded config");
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load configuration from an explicit file.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| MailError::io(path, e))?;
    toml::from_str::<Config>(&contents)
        .map_err(|e| MailError::Config(format!("{}: {e}", path.display())))
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILPRISM_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailprism").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailprism")
}
