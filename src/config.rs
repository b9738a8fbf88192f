//! Configuration file loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. Explicit path (e.g. the CLI's `--config <path>`)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Secrets are not read from the file; see `HUGINN_API_TOKEN`.
//!
//! ```toml
//! [api]
//! base_url = "https://images.example.com/api"
//! images_path = "/images"
//! timeout_secs = 30
//!
//! [cache]
//! directory = "/var/cache/huginn"
//! max_metadata_entries = 100
//! memory_count_limit = 100
//! memory_cost_limit = 52428800
//! disk_quality = 80
//!
//! [defaults]
//! cache_policy = "all"
//! retry = { kind = "exponential_backoff", max_retries = 3, base_delay_ms = 1000 }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::bytes::{DEFAULT_COST_LIMIT, DEFAULT_COUNT_LIMIT, DEFAULT_DISK_QUALITY};
use crate::cache::metadata::DEFAULT_MAX_ENTRIES;
use crate::fetch::http::DEFAULT_IMAGES_PATH;
use crate::retry::{DEFAULT_BASE_DELAY, RetryPolicy};
use crate::types::{CachePolicy, ResolveOptions};
use crate::{HuginnError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Image API location.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API base URL. Without it no HTTP fetchers are configured.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Path of the image collection below `base_url` (default: `/images`).
    #[serde(default = "default_images_path")]
    pub images_path: String,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            images_path: default_images_path(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_images_path() -> String {
    DEFAULT_IMAGES_PATH.to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Cache limits and location.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Persistent tier directory. Falls back to `HUGINN_CACHE_DIR`, then the
    /// platform cache directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_max_metadata_entries")]
    pub max_metadata_entries: usize,
    #[serde(default = "default_memory_count_limit")]
    pub memory_count_limit: u64,
    /// Decoded bytes held in memory (default: 50 MiB).
    #[serde(default = "default_memory_cost_limit")]
    pub memory_cost_limit: u64,
    /// JPEG quality for persisted images (default: 80).
    #[serde(default = "default_disk_quality")]
    pub disk_quality: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_metadata_entries: default_max_metadata_entries(),
            memory_count_limit: default_memory_count_limit(),
            memory_cost_limit: default_memory_cost_limit(),
            disk_quality: default_disk_quality(),
        }
    }
}

fn default_max_metadata_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn default_memory_count_limit() -> u64 {
    DEFAULT_COUNT_LIMIT
}

fn default_memory_cost_limit() -> u64 {
    DEFAULT_COST_LIMIT
}

fn default_disk_quality() -> u8 {
    DEFAULT_DISK_QUALITY
}

/// Default options for resolutions that don't specify their own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub cache_policy: CachePolicy,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl DefaultsConfig {
    pub fn options(&self) -> ResolveOptions {
        ResolveOptions::new()
            .cache_policy(self.cache_policy)
            .retry_policy(self.retry.clone().into())
    }
}

/// Retry policy as written in TOML, tagged by `kind`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryConfig {
    #[default]
    None,
    Fixed {
        count: u32,
    },
    ExponentialBackoff {
        max_retries: u32,
        #[serde(default = "default_base_delay_ms")]
        base_delay_ms: u64,
    },
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY.as_millis() as u64
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        match config {
            RetryConfig::None => RetryPolicy::None,
            RetryConfig::Fixed { count } => RetryPolicy::fixed(count),
            RetryConfig::ExponentialBackoff {
                max_retries,
                base_delay_ms,
            } => RetryPolicy::exponential_with_base(
                max_retries,
                Duration::from_millis(base_delay_ms),
            ),
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            HuginnError::Configuration(msg) => {
                HuginnError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        if explicit_path.is_none() && Self::resolve_config_path(None).is_err() {
            return Ok(Self::default());
        }
        Self::load(explicit_path)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| HuginnError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Default resolve options from the `[defaults]` section.
    pub fn resolve_options(&self) -> ResolveOptions {
        self.defaults.options()
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(HuginnError::Configuration(
            "No config file found. Create ~/.huginn/config.toml or /etc/huginn/config.toml"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.api.base_url.is_none());
        assert_eq!(config.api.images_path, "/images");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.cache.max_metadata_entries, 100);
        assert_eq!(config.cache.memory_cost_limit, 50 * 1024 * 1024);
        assert_eq!(config.resolve_options(), ResolveOptions::standard());
    }

    #[test]
    fn retry_default_base_delay() {
        let config = Config::from_toml(
            r#"
            [defaults]
            retry = { kind = "exponential_backoff", max_retries = 2 }
            "#,
        )
        .unwrap();
        assert_eq!(
            config.resolve_options().retry_policy,
            RetryPolicy::exponential(2)
        );
    }
}
