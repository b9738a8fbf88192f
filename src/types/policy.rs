//! Per-request cache and retry configuration.

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Which caches a resolution may read from and populate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Cache both metadata and image bytes (default).
    #[default]
    All,
    /// Cache metadata; download image bytes every time.
    MetadataOnly,
    /// Cache image bytes; fetch metadata every time.
    ImageOnly,
    /// Bypass both caches.
    None,
}

impl CachePolicy {
    /// Whether the metadata cache is consulted and populated.
    pub fn caches_metadata(self) -> bool {
        matches!(self, Self::All | Self::MetadataOnly)
    }

    /// Whether the byte cache is consulted and populated.
    pub fn caches_bytes(self) -> bool {
        matches!(self, Self::All | Self::ImageOnly)
    }
}

/// Cache and retry settings for a single resolution.
///
/// ```rust
/// # use huginn::{CachePolicy, ResolveOptions, RetryPolicy};
/// let options = ResolveOptions::new()
///     .cache_policy(CachePolicy::MetadataOnly)
///     .retry_policy(RetryPolicy::exponential(3));
/// assert_eq!(options.retry_policy.max_retries(), 3);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Default: [`CachePolicy::All`].
    pub cache_policy: CachePolicy,
    /// Default: [`RetryPolicy::None`].
    pub retry_policy: RetryPolicy,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache everything, no retry.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Always go to the network.
    pub fn no_cache() -> Self {
        Self::default().cache_policy(CachePolicy::None)
    }

    /// Cache everything, retry three times with exponential backoff.
    pub fn with_retry() -> Self {
        Self::default().retry_policy(RetryPolicy::exponential(3))
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_flags() {
        assert!(CachePolicy::All.caches_metadata() && CachePolicy::All.caches_bytes());
        assert!(CachePolicy::MetadataOnly.caches_metadata());
        assert!(!CachePolicy::MetadataOnly.caches_bytes());
        assert!(!CachePolicy::ImageOnly.caches_metadata());
        assert!(CachePolicy::ImageOnly.caches_bytes());
        assert!(!CachePolicy::None.caches_metadata() && !CachePolicy::None.caches_bytes());
    }

    #[test]
    fn presets() {
        assert_eq!(ResolveOptions::standard().cache_policy, CachePolicy::All);
        assert_eq!(ResolveOptions::standard().retry_policy, RetryPolicy::None);
        assert_eq!(ResolveOptions::no_cache().cache_policy, CachePolicy::None);
        assert_eq!(ResolveOptions::with_retry().retry_policy.max_retries(), 3);
    }

    #[test]
    fn cache_policy_serde_is_snake_case() {
        let policy: CachePolicy = serde_json::from_str(r#""metadata_only""#).unwrap();
        assert_eq!(policy, CachePolicy::MetadataOnly);
    }
}
