//! Resolution engine.
//!
//! A [`Resolver`] turns a [`ResourceRef`] into a decoded [`Resource`]:
//!
//! ```text
//! ResourceRef::Id ──► metadata (cache | fetcher) ──► url ─┐
//! ResourceRef::Url / UrlString ───────────────────────────┴─► bytes (cache | fetcher) ──► decode
//! ```
//!
//! Each call runs its own attempt loop governed by the [`RetryPolicy`] in
//! its [`ResolveOptions`]; every failure kind is retried the same way and
//! only the last attempt's error is reported. Concurrent resolutions of the
//! same reference are not deduplicated.
//!
//! [`RetryPolicy`]: crate::RetryPolicy

mod resolution;

pub use resolution::Resolution;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures_util::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{ByteCache, MetadataCache};
use crate::fetch::{ByteFetcher, MetadataFetcher};
use crate::telemetry;
use crate::types::{
    CachePolicy, LoadError, LoadingState, ResolveOptions, Resource, ResourceMetadata, ResourceRef,
};

/// Stream of [`LoadingState`]s produced by [`Resolver::resolve_stream`].
pub type StateStream = Pin<Box<dyn Stream<Item = LoadingState> + Send>>;

/// Shared resolution engine: caches plus fetchers.
///
/// Cheap to clone; clones share the same caches and fetchers.
#[derive(Clone)]
pub struct Resolver {
    metadata_cache: Arc<MetadataCache>,
    byte_cache: Arc<ByteCache>,
    metadata_fetcher: Arc<dyn MetadataFetcher>,
    byte_fetcher: Arc<dyn ByteFetcher>,
}

impl Resolver {
    pub fn new(
        metadata_cache: Arc<MetadataCache>,
        byte_cache: Arc<ByteCache>,
        metadata_fetcher: Arc<dyn MetadataFetcher>,
        byte_fetcher: Arc<dyn ByteFetcher>,
    ) -> Self {
        Self {
            metadata_cache,
            byte_cache,
            metadata_fetcher,
            byte_fetcher,
        }
    }

    pub fn metadata_cache(&self) -> &Arc<MetadataCache> {
        &self.metadata_cache
    }

    pub fn byte_cache(&self) -> &Arc<ByteCache> {
        &self.byte_cache
    }

    /// Create an idle [`Resolution`] handle for `source`.
    ///
    /// Nothing happens until [`Resolution::load`] is called.
    pub fn resolution(&self, source: ResourceRef, options: ResolveOptions) -> Resolution {
        Resolution::new(self.clone(), source, options)
    }

    /// Resolve `source` to completion and return the terminal state.
    pub async fn resolve(&self, source: ResourceRef, options: ResolveOptions) -> LoadingState {
        self.resolution(source, options).load().await
    }

    /// Resolve `source` in a background task, yielding `Loading` and then
    /// the terminal state.
    ///
    /// Dropping the stream abandons the resolution at its next suspension
    /// point.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn resolve_stream(&self, source: ResourceRef, options: ResolveOptions) -> StateStream {
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let resolution = self.resolution(source, options);

        tokio::spawn(async move {
            if tx
                .send(LoadingState::Loading { progress: None })
                .await
                .is_err()
            {
                return;
            }
            tokio::select! {
                state = resolution.load() => {
                    let _ = tx.send(state).await;
                }
                () = tx.closed() => {
                    debug!(source = %resolution.source(), "resolution stream dropped, abandoning");
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    /// Metadata for `id`, from the cache when `cache_policy` allows it.
    pub async fn metadata(
        &self,
        id: &str,
        cache_policy: CachePolicy,
    ) -> Result<ResourceMetadata, LoadError> {
        if cache_policy.caches_metadata()
            && let Some(metadata) = self.metadata_cache.get(id)
        {
            debug!(id, "metadata cache hit");
            return Ok(metadata);
        }

        let result = self.metadata_fetcher.fetch(id).await;
        record_fetch("metadata", result.is_ok());
        let metadata = result.map_err(|e| {
            warn!(id, fetcher = self.metadata_fetcher.name(), error = %e, "metadata fetch failed");
            LoadError::MetadataFetchFailed(e.to_string())
        })?;

        if cache_policy.caches_metadata() {
            self.metadata_cache.set(id, metadata.clone());
        }
        Ok(metadata)
    }

    /// Decoded image at `url`, from the byte cache when `cache_policy`
    /// allows it.
    pub async fn image(&self, url: &Url, cache_policy: CachePolicy) -> Result<Resource, LoadError> {
        if cache_policy.caches_bytes()
            && let Some(resource) = self.byte_cache.get(url.as_str()).await
        {
            debug!(%url, "byte cache hit");
            return Ok(resource);
        }

        let result = self.byte_fetcher.fetch(url).await;
        record_fetch("bytes", result.is_ok());
        let bytes = result.map_err(|e| {
            warn!(%url, fetcher = self.byte_fetcher.name(), error = %e, "image download failed");
            LoadError::DownloadFailed
        })?;
        let resource = Resource::decode(&bytes).map_err(|e| {
            warn!(%url, error = %e, "downloaded payload is not a decodable image");
            LoadError::DownloadFailed
        })?;

        if cache_policy.caches_bytes() {
            self.byte_cache.set(resource.clone(), url.as_str()).await;
        }
        Ok(resource)
    }

    /// Attempt loop: up to `max_attempts`, sleeping per the retry policy
    /// between attempts. Returns a terminal state.
    async fn run(&self, source: &ResourceRef, options: ResolveOptions) -> LoadingState {
        let started = Instant::now();
        let retry = options.retry_policy;
        let max_attempts = retry.max_attempts();
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = retry.delay(attempt - 1);
                metrics::counter!(telemetry::RETRIES_TOTAL).increment(1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            metrics::counter!(telemetry::RESOLVE_ATTEMPTS_TOTAL).increment(1);
            debug!(%source, attempt, max_attempts, "starting resolution attempt");

            match self.attempt(source, options.cache_policy).await {
                Ok(resource) => {
                    record_resolution("ok", started);
                    return LoadingState::Success(resource);
                }
                Err(e) => {
                    if attempt + 1 < max_attempts {
                        let next_delay_ms =
                            u64::try_from(retry.delay(attempt).as_millis()).unwrap_or(u64::MAX);
                        warn!(
                            %source,
                            attempt,
                            next_delay_ms,
                            error = %e,
                            "resolution attempt failed, retrying"
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| LoadError::Unknown("no attempt made".into()));
        warn!(%source, error = %error, "resolution failed");
        record_resolution("error", started);
        LoadingState::Failure(error)
    }

    async fn attempt(
        &self,
        source: &ResourceRef,
        cache_policy: CachePolicy,
    ) -> Result<Resource, LoadError> {
        let url = match source {
            ResourceRef::Url(url) => url.clone(),
            ResourceRef::UrlString(s) => {
                Url::parse(s).map_err(|_| LoadError::InvalidUrl(s.clone()))?
            }
            ResourceRef::Id(id) => {
                let metadata = self.metadata(id, cache_policy).await?;
                metadata
                    .parsed_url()
                    .map_err(|_| LoadError::InvalidUrl(metadata.url.clone()))?
            }
        };
        self.image(&url, cache_policy).await
    }
}

fn record_fetch(kind: &'static str, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(telemetry::FETCHES_TOTAL, "kind" => kind, "status" => status).increment(1);
}

fn record_resolution(status: &'static str, started: Instant) {
    metrics::counter!(telemetry::RESOLUTIONS_TOTAL, "status" => status).increment(1);
    metrics::histogram!(telemetry::RESOLVE_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
}
