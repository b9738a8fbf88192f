//! Bounded LRU cache for image metadata.
//!
//! Entries carry a logical access stamp taken from a per-cache counter, so
//! recency is strictly ordered even when many operations land within the
//! same clock tick. When the cache is full, a batch of the least recently
//! used entries (10 % of capacity, at least one) is evicted before the
//! insert, which keeps the number of full sorts low under steady churn.
//!
//! All state sits behind a single mutex with short critical sections; no
//! I/O happens while it is held.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::telemetry;
use crate::types::ResourceMetadata;

/// Default maximum number of entries.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Configuration for [`MetadataCache`].
///
/// ```rust
/// # use huginn::cache::MetadataCacheConfig;
/// let config = MetadataCacheConfig::new().max_entries(500);
/// assert_eq!(config.max_entries, 500);
/// ```
#[derive(Debug, Clone)]
pub struct MetadataCacheConfig {
    /// Maximum cached entries. Default: 100. Values below 1 are treated as 1.
    pub max_entries: usize,
}

impl Default for MetadataCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl MetadataCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }
}

struct CacheEntry<V> {
    value: V,
    last_access: u64,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    clock: u64,
}

impl<V> Inner<V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Thread-safe id → metadata map with least-recently-used eviction.
pub struct MetadataCache<V = ResourceMetadata> {
    inner: Mutex<Inner<V>>,
    max_entries: usize,
}

impl<V: Clone> MetadataCache<V> {
    /// Create an empty cache with the given configuration.
    pub fn new(config: &MetadataCacheConfig) -> Self {
        Self::with_max_entries(config.max_entries)
    }

    /// Create an empty cache holding at most `max_entries` entries.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
            }),
            max_entries: max_entries.max(1),
        }
    }

    /// Capacity of the cache.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Look up an entry and mark it as most recently used.
    ///
    /// Misses have no side effect.
    pub fn get(&self, id: &str) -> Option<V> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.entries.get_mut(id) {
            Some(entry) => {
                inner.clock += 1;
                entry.last_access = inner.clock;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "metadata", "tier" => "memory")
                    .increment(1);
                Some(entry.value.clone())
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "metadata")
                    .increment(1);
                None
            }
        }
    }

    /// Insert or replace an entry, evicting first if the cache is full.
    pub fn set(&self, id: impl Into<String>, value: V) {
        let mut inner = self.lock();
        if inner.entries.len() >= self.max_entries {
            self.evict_oldest(&mut inner);
        }
        let now = inner.tick();
        inner.entries.insert(
            id.into(),
            CacheEntry {
                value,
                last_access: now,
            },
        );
    }

    /// Remove an entry. No-op if absent.
    pub fn remove(&self, id: &str) {
        self.lock().entries.remove(id);
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Whether `id` is cached, without touching its recency.
    pub fn contains_key(&self, id: &str) -> bool {
        self.lock().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_oldest(&self, inner: &mut Inner<V>) {
        let batch = (self.max_entries / 10).max(1);
        let mut by_age: Vec<(u64, String)> = inner
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_access, key.clone()))
            .collect();
        by_age.sort_unstable();
        for (_, key) in by_age.into_iter().take(batch) {
            inner.entries.remove(&key);
        }
        debug!(evicted = batch, max_entries = self.max_entries, "metadata cache eviction");
    }

    // A panic while the lock is held cannot leave the map half-written: every
    // mutation is a single HashMap call.
    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for MetadataCache<V> {
    fn default() -> Self {
        Self::new(&MetadataCacheConfig::default())
    }
}
