//! Builder for configuring image service instances

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::ImageService;
use crate::cache::{ByteCache, ByteCacheConfig, MetadataCache, MetadataCacheConfig};
use crate::config::Config;
use crate::fetch::{ByteFetcher, HttpByteFetcher, HttpMetadataFetcher, MetadataFetcher};
use crate::fetch::http::DEFAULT_IMAGES_PATH;
use crate::resolver::Resolver;
use crate::store::{ByteStore, FsByteStore};
use crate::types::ResolveOptions;
use crate::{HuginnError, Result};

/// Environment variable overriding the persistent cache directory.
pub const CACHE_DIR_ENV: &str = "HUGINN_CACHE_DIR";

/// Environment variable holding the API bearer token.
pub const API_TOKEN_ENV: &str = "HUGINN_API_TOKEN";

/// Main entry point for creating image service instances.
pub struct Huginn;

impl Huginn {
    /// Create a new builder for configuring the service.
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }
}

/// Builder for configuring image service instances.
pub struct HuginnBuilder {
    http: Option<(String, String)>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
    metadata_fetcher: Option<Arc<dyn MetadataFetcher>>,
    byte_fetcher: Option<Arc<dyn ByteFetcher>>,
    cache_dir: Option<PathBuf>,
    byte_store: Option<Arc<dyn ByteStore>>,
    metadata_config: MetadataCacheConfig,
    byte_config: ByteCacheConfig,
    default_options: ResolveOptions,
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self {
            http: None,
            api_token: None,
            timeout_secs: None,
            metadata_fetcher: None,
            byte_fetcher: None,
            cache_dir: None,
            byte_store: None,
            metadata_config: MetadataCacheConfig::default(),
            byte_config: ByteCacheConfig::default(),
            default_options: ResolveOptions::default(),
        }
    }

    /// Apply a loaded configuration file.
    ///
    /// Settings made on the builder afterwards take precedence.
    pub fn from_config(mut self, config: &Config) -> Self {
        if let Some(base_url) = &config.api.base_url {
            self = self.http(base_url.clone(), config.api.images_path.clone());
        }
        if let Some(dir) = &config.cache.directory {
            self = self.cache_dir(dir.clone());
        }
        self.timeout(config.api.timeout_secs)
            .max_metadata_entries(config.cache.max_metadata_entries)
            .memory_count_limit(config.cache.memory_count_limit)
            .memory_cost_limit(config.cache.memory_cost_limit)
            .disk_quality(config.cache.disk_quality)
            .default_options(config.resolve_options())
    }

    /// Use the HTTP image API at `base_url` for metadata, and plain HTTP
    /// for image bytes.
    pub fn http(mut self, base_url: impl Into<String>, images_path: impl Into<String>) -> Self {
        self.http = Some((base_url.into(), images_path.into()));
        self
    }

    /// Same as [`http`](Self::http) with the default `/images` path.
    pub fn http_base_url(self, base_url: impl Into<String>) -> Self {
        self.http(base_url, DEFAULT_IMAGES_PATH)
    }

    /// Bearer token for metadata requests. Default: `HUGINN_API_TOKEN`.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Set the timeout for HTTP requests (seconds).
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Use a custom metadata fetcher instead of HTTP.
    pub fn metadata_fetcher(mut self, fetcher: Arc<dyn MetadataFetcher>) -> Self {
        self.metadata_fetcher = Some(fetcher);
        self
    }

    /// Use a custom byte fetcher instead of HTTP.
    pub fn byte_fetcher(mut self, fetcher: Arc<dyn ByteFetcher>) -> Self {
        self.byte_fetcher = Some(fetcher);
        self
    }

    /// Set the directory of the filesystem persistent tier.
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Use a custom persistent tier. Overrides [`cache_dir`](Self::cache_dir).
    pub fn byte_store(mut self, store: Arc<dyn ByteStore>) -> Self {
        self.byte_store = Some(store);
        self
    }

    pub fn max_metadata_entries(mut self, n: usize) -> Self {
        self.metadata_config = self.metadata_config.max_entries(n);
        self
    }

    pub fn memory_count_limit(mut self, n: u64) -> Self {
        self.byte_config = self.byte_config.count_limit(n);
        self
    }

    /// Set the decoded-bytes budget of the in-memory image tier.
    pub fn memory_cost_limit(mut self, bytes: u64) -> Self {
        self.byte_config = self.byte_config.cost_limit(bytes);
        self
    }

    pub fn disk_quality(mut self, quality: u8) -> Self {
        self.byte_config = self.byte_config.disk_quality(quality);
        self
    }

    /// Options used by [`ImageService::fetch`] and the cache lookups.
    pub fn default_options(mut self, options: ResolveOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Build the service.
    pub fn build(self) -> Result<ImageService> {
        let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(30));

        let metadata_fetcher: Arc<dyn MetadataFetcher> = match (self.metadata_fetcher, &self.http)
        {
            (Some(fetcher), _) => fetcher,
            (None, Some((base_url, images_path))) => {
                let mut fetcher =
                    HttpMetadataFetcher::with_options(base_url, images_path, timeout)?;
                if let Some(token) = self
                    .api_token
                    .or_else(|| std::env::var(API_TOKEN_ENV).ok())
                    .filter(|t| !t.is_empty())
                {
                    fetcher = fetcher.with_api_token(token);
                }
                Arc::new(fetcher)
            }
            (None, None) => return Err(HuginnError::NoFetcher),
        };

        let byte_fetcher: Arc<dyn ByteFetcher> = match (self.byte_fetcher, &self.http) {
            (Some(fetcher), _) => fetcher,
            (None, Some(_)) => Arc::new(HttpByteFetcher::with_timeout(timeout)?),
            (None, None) => return Err(HuginnError::NoFetcher),
        };

        let store: Arc<dyn ByteStore> = match self.byte_store {
            Some(store) => store,
            None => {
                let dir = resolve_cache_dir(self.cache_dir);
                debug!(path = %dir.display(), "using filesystem image cache");
                Arc::new(FsByteStore::new(dir))
            }
        };

        let metadata_cache = Arc::new(MetadataCache::new(&self.metadata_config));
        let byte_cache = Arc::new(ByteCache::new(&self.byte_config, store));
        let resolver = Resolver::new(metadata_cache, byte_cache, metadata_fetcher, byte_fetcher);

        Ok(ImageService::new(resolver, self.default_options))
    }
}

impl Default for HuginnBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistent cache directory: explicit, else `HUGINN_CACHE_DIR`, else the
/// platform cache directory, else `.cache` below the working directory.
pub fn resolve_cache_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        std::env::var(CACHE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::cache_dir()
                    .unwrap_or_else(|| PathBuf::from(".cache"))
                    .join("huginn")
                    .join("images")
            })
    })
}
