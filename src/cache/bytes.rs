//! Two-tier cache for decoded images.
//!
//! # Architecture
//!
//! - **Memory tier**: moka LRU cache of decoded [`Resource`]s, bounded both
//!   by entry count and by cumulative decoded pixel footprint.
//! - **Persistent tier**: any [`ByteStore`], holding a JPEG re-encoding of
//!   each image at a fixed quality.
//!
//! Reads fall through memory → store; a store hit is decoded and promoted
//! back into memory. Writes go to both tiers concurrently; a failed persist
//! is logged and otherwise ignored, since the memory entry and the caller's
//! result are still valid.
//!
//! # Memory bounds
//!
//! moka supports a single weighted capacity, so both limits are folded into
//! one budget. With `n` = count limit and cost measured in `unit`-sized
//! chunks, the capacity is `cost_units * n` and each entry weighs
//! `max(ceil(cost / unit) * n, cost_units)`. Any set of entries that fits
//! therefore has at most `n` members and a total cost of at most the cost
//! limit. moka applies evictions during its housekeeping, so every insert
//! is followed by a housekeeping pass and `set`/`get` return within bounds.
//!
//! # Keys
//!
//! The cache key of a URL is its standard base64 encoding: deterministic,
//! reversible (see [`url_for_key`]) and free of characters a filesystem
//! store has to reject once `/` is substituted.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use tracing::{debug, info, warn};

use crate::store::ByteStore;
use crate::telemetry;
use crate::types::Resource;

/// Default maximum number of images held in memory.
pub const DEFAULT_COUNT_LIMIT: u64 = 100;

/// Default cap on the decoded pixel footprint held in memory (50 MiB).
pub const DEFAULT_COST_LIMIT: u64 = 50 * 1024 * 1024;

/// Default JPEG quality for the persistent tier.
pub const DEFAULT_DISK_QUALITY: u8 = 80;

/// Configuration for [`ByteCache`].
///
/// ```rust
/// # use huginn::cache::ByteCacheConfig;
/// let config = ByteCacheConfig::new()
///     .count_limit(200)
///     .cost_limit(128 * 1024 * 1024);
/// assert_eq!(config.disk_quality, 80);
/// ```
#[derive(Debug, Clone)]
pub struct ByteCacheConfig {
    /// Maximum images in memory. Default: 100. Values below 1 are treated as 1.
    pub count_limit: u64,
    /// Maximum decoded bytes in memory. Default: 50 MiB.
    pub cost_limit: u64,
    /// JPEG quality (1-100) used when persisting. Default: 80.
    pub disk_quality: u8,
}

impl Default for ByteCacheConfig {
    fn default() -> Self {
        Self {
            count_limit: DEFAULT_COUNT_LIMIT,
            cost_limit: DEFAULT_COST_LIMIT,
            disk_quality: DEFAULT_DISK_QUALITY,
        }
    }
}

impl ByteCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of images held in memory.
    pub fn count_limit(mut self, n: u64) -> Self {
        self.count_limit = n;
        self
    }

    /// Set the maximum decoded pixel footprint held in memory.
    pub fn cost_limit(mut self, bytes: u64) -> Self {
        self.cost_limit = bytes;
        self
    }

    /// Set the JPEG quality used for the persistent tier.
    pub fn disk_quality(mut self, quality: u8) -> Self {
        self.disk_quality = quality;
        self
    }
}

/// Current occupancy of the memory tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Number of images held.
    pub entries: u64,
    /// Sum of their decoded pixel footprints.
    pub cost: u64,
}

/// Count and cost limits folded into a single moka weight budget.
#[derive(Debug, Clone, Copy)]
struct MemoryBudget {
    unit: u64,
    cost_units: u64,
    count: u64,
}

impl MemoryBudget {
    fn new(count_limit: u64, cost_limit: u64) -> Self {
        let count = count_limit.max(1);
        // keep capacity (and so every admissible weight) below u32::MAX
        let unit = cost_limit.saturating_mul(count) / (u64::from(u32::MAX) - 1) + 1;
        Self {
            unit,
            cost_units: cost_limit / unit,
            count,
        }
    }

    fn capacity(&self) -> u64 {
        self.cost_units * self.count
    }

    fn weight(&self, cost: u64) -> u32 {
        let weight = cost
            .div_ceil(self.unit)
            .saturating_mul(self.count)
            .max(self.cost_units);
        u32::try_from(weight).unwrap_or(u32::MAX)
    }
}

/// Cache key for a URL string.
pub fn cache_key(url: &str) -> String {
    STANDARD.encode(url.as_bytes())
}

/// Inverse of [`cache_key`].
pub fn url_for_key(key: &str) -> Option<String> {
    let bytes = STANDARD.decode(key).ok()?;
    String::from_utf8(bytes).ok()
}

/// Memory + persistent cache of decoded images, keyed by URL.
pub struct ByteCache {
    memory: Cache<String, Resource>,
    store: Arc<dyn ByteStore>,
    disk_quality: u8,
}

impl ByteCache {
    /// Create a cache in front of `store`.
    pub fn new(config: &ByteCacheConfig, store: Arc<dyn ByteStore>) -> Self {
        let budget = MemoryBudget::new(config.count_limit, config.cost_limit);
        let memory = Cache::builder()
            .max_capacity(budget.capacity())
            .weigher(move |_key: &String, value: &Resource| budget.weight(value.memory_cost()))
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self {
            memory,
            store,
            disk_quality: config.disk_quality,
        }
    }

    /// Look up the image cached for `url`.
    ///
    /// Checks memory first, then the persistent tier. A persistent hit is
    /// decoded and re-inserted into memory before returning. Undecodable
    /// persisted data is deleted and reported as a miss.
    pub async fn get(&self, url: &str) -> Option<Resource> {
        let key = cache_key(url);
        if let Some(resource) = self.memory.get(&key).await {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "bytes", "tier" => "memory")
                .increment(1);
            return Some(resource);
        }

        let Some(bytes) = self.store.read(&key).await else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "bytes").increment(1);
            return None;
        };
        match Resource::decode(&bytes) {
            Ok(resource) => {
                debug!(url, "promoting persisted image to memory");
                self.memory.insert(key, resource.clone()).await;
                self.memory.run_pending_tasks().await;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "bytes", "tier" => "disk")
                    .increment(1);
                Some(resource)
            }
            Err(e) => {
                warn!(url, store = self.store.name(), error = %e, "discarding undecodable cached image");
                self.store.delete(&key).await;
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "bytes").increment(1);
                None
            }
        }
    }

    /// Cache `resource` for `url` in both tiers.
    ///
    /// Returns once both writes have finished and the memory tier is back
    /// within its limits. Persistent tier failures are logged and swallowed.
    pub async fn set(&self, resource: Resource, url: &str) {
        let key = cache_key(url);
        let memory_copy = resource.clone();
        tokio::join!(
            async {
                self.memory.insert(key.clone(), memory_copy).await;
                self.memory.run_pending_tasks().await;
            },
            self.persist(&key, resource),
        );
    }

    async fn persist(&self, key: &str, resource: Resource) {
        let quality = self.disk_quality;
        let encoded = match tokio::task::spawn_blocking(move || resource.encode_jpeg(quality)).await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                warn!(error = %e, "failed to encode image for persistence");
                return;
            }
            Err(e) => {
                warn!(error = %e, "image encoding task failed");
                return;
            }
        };
        if let Err(e) = self.store.write(key, &encoded).await {
            warn!(store = self.store.name(), error = %e, "failed to persist cached image");
        }
    }

    /// Remove `url` from both tiers.
    pub async fn remove(&self, url: &str) {
        let key = cache_key(url);
        self.memory.invalidate(&key).await;
        self.store.delete(&key).await;
    }

    /// Drop the memory tier and delete every persisted entry.
    pub async fn clear_all(&self) {
        self.memory.invalidate_all();
        self.store.clear().await;
        info!(store = self.store.name(), "cleared image cache");
    }

    /// Total size of persisted entries in bytes. Advisory only.
    pub async fn size_on_disk(&self) -> u64 {
        self.store.list_all().await.iter().map(|(_, size)| size).sum()
    }

    /// Drop `url` from the memory tier only.
    pub async fn evict_from_memory(&self, url: &str) {
        self.memory.invalidate(&cache_key(url)).await;
    }

    /// Drop the whole memory tier, keeping persisted entries.
    pub fn trim_memory(&self) {
        self.memory.invalidate_all();
    }

    /// Whether `url` is currently held in memory.
    pub fn memory_contains(&self, url: &str) -> bool {
        self.memory.contains_key(&cache_key(url))
    }

    /// Occupancy of the memory tier, computed from the live entries.
    pub fn memory_usage(&self) -> MemoryUsage {
        self.memory
            .iter()
            .fold(MemoryUsage { entries: 0, cost: 0 }, |usage, (_, resource)| {
                MemoryUsage {
                    entries: usage.entries + 1,
                    cost: usage.cost + resource.memory_cost(),
                }
            })
    }

    /// Run moka's pending maintenance (evictions, invalidations) now.
    pub async fn run_pending_tasks(&self) {
        self.memory.run_pending_tasks().await;
    }
}
