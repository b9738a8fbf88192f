//! Tests for the resolution engine: cache gating, retry loop, state handle.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use url::Url;

use huginn::cache::{ByteCache, ByteCacheConfig, MetadataCache};
use huginn::store::MemoryByteStore;
use huginn::{
    ByteFetcher, CachePolicy, HuginnError, LoadError, LoadingState, MetadataFetcher,
    ResolveOptions, Resolver, Resource, ResourceMetadata, ResourceRef, Result, RetryPolicy,
};

// ============================================================================
// Fakes
// ============================================================================

const IMAGE_URL: &str = "https://cdn.example.com/abc.png";

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([1, 2, 3])));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

struct FakeMetadata {
    calls: AtomicU32,
    url: String,
    fail: bool,
}

impl FakeMetadata {
    fn ok() -> Arc<Self> {
        Self::with_url(IMAGE_URL)
    }

    fn with_url(url: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            url: url.to_string(),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            url: String::new(),
            fail: true,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataFetcher for FakeMetadata {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch(&self, id: &str) -> Result<ResourceMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(HuginnError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(ResourceMetadata::new(id, self.url.clone()))
    }
}

/// Byte fetcher failing its first `failures` calls, recording call times.
struct FakeBytes {
    calls: AtomicU32,
    failures: u32,
    payload: Vec<u8>,
    call_times: Mutex<Vec<tokio::time::Instant>>,
}

impl FakeBytes {
    fn ok() -> Arc<Self> {
        Self::failing_first(0)
    }

    fn always_failing() -> Arc<Self> {
        Self::failing_first(u32::MAX)
    }

    fn failing_first(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failures,
            payload: png(6, 4),
            call_times: Mutex::new(Vec::new()),
        })
    }

    fn garbage() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failures: 0,
            payload: b"<html>not an image</html>".to_vec(),
            call_times: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn gaps(&self) -> Vec<Duration> {
        let times = self.call_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl ByteFetcher for FakeBytes {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch(&self, _url: &Url) -> Result<Vec<u8>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        if n < self.failures {
            return Err(HuginnError::Http("connection reset".to_string()));
        }
        Ok(self.payload.clone())
    }
}

struct Harness {
    resolver: Resolver,
    metadata_cache: Arc<MetadataCache>,
    byte_cache: Arc<ByteCache>,
}

fn harness(metadata: Arc<FakeMetadata>, bytes: Arc<FakeBytes>) -> Harness {
    let metadata_cache = Arc::new(MetadataCache::default());
    let byte_cache = Arc::new(ByteCache::new(
        &ByteCacheConfig::default(),
        Arc::new(MemoryByteStore::new()),
    ));
    let resolver = Resolver::new(
        metadata_cache.clone(),
        byte_cache.clone(),
        metadata,
        bytes,
    );
    Harness {
        resolver,
        metadata_cache,
        byte_cache,
    }
}

fn options(cache: CachePolicy, retry: RetryPolicy) -> ResolveOptions {
    ResolveOptions::new().cache_policy(cache).retry_policy(retry)
}

// ============================================================================
// Cache behaviour
// ============================================================================

#[tokio::test]
async fn test_cache_hit_skips_fetchers() {
    let metadata = FakeMetadata::ok();
    let bytes = FakeBytes::ok();
    let h = harness(metadata.clone(), bytes.clone());

    h.metadata_cache
        .set("abc", ResourceMetadata::new("abc", IMAGE_URL));
    h.byte_cache
        .set(Resource::decode(&png(3, 3)).unwrap(), IMAGE_URL)
        .await;

    let state = h
        .resolver
        .resolve(ResourceRef::id("abc"), ResolveOptions::standard())
        .await;

    assert!(state.is_success());
    assert_eq!(state.resource().unwrap().width(), 3);
    assert_eq!(metadata.calls(), 0);
    assert_eq!(bytes.calls(), 0);
}

#[tokio::test]
async fn test_successful_fetch_populates_caches() {
    let metadata = FakeMetadata::ok();
    let bytes = FakeBytes::ok();
    let h = harness(metadata.clone(), bytes.clone());

    let state = h
        .resolver
        .resolve(ResourceRef::id("abc"), ResolveOptions::standard())
        .await;

    let resource = state.resource().expect("success");
    assert_eq!((resource.width(), resource.height()), (6, 4));
    assert!(h.metadata_cache.contains_key("abc"));
    assert!(h.byte_cache.memory_contains(IMAGE_URL));

    // second run is served entirely from cache
    let again = h
        .resolver
        .resolve(ResourceRef::id("abc"), ResolveOptions::standard())
        .await;
    assert!(again.is_success());
    assert_eq!(metadata.calls(), 1);
    assert_eq!(bytes.calls(), 1);
}

#[tokio::test]
async fn test_metadata_only_policy_refetches_bytes() {
    let metadata = FakeMetadata::ok();
    let bytes = FakeBytes::ok();
    let h = harness(metadata.clone(), bytes.clone());
    let opts = options(CachePolicy::MetadataOnly, RetryPolicy::None);

    for _ in 0..2 {
        let state = h.resolver.resolve(ResourceRef::id("abc"), opts).await;
        assert!(state.is_success());
    }

    assert_eq!(metadata.calls(), 1);
    assert_eq!(bytes.calls(), 2);
    assert!(!h.byte_cache.memory_contains(IMAGE_URL));
}

#[tokio::test]
async fn test_image_only_policy_refetches_metadata() {
    let metadata = FakeMetadata::ok();
    let bytes = FakeBytes::ok();
    let h = harness(metadata.clone(), bytes.clone());
    let opts = options(CachePolicy::ImageOnly, RetryPolicy::None);

    for _ in 0..2 {
        assert!(h.resolver.resolve(ResourceRef::id("abc"), opts).await.is_success());
    }

    assert_eq!(metadata.calls(), 2);
    assert_eq!(bytes.calls(), 1);
    assert!(!h.metadata_cache.contains_key("abc"));
}

#[tokio::test]
async fn test_no_cache_policy_bypasses_everything() {
    let metadata = FakeMetadata::ok();
    let bytes = FakeBytes::ok();
    let h = harness(metadata.clone(), bytes.clone());

    h.metadata_cache
        .set("abc", ResourceMetadata::new("abc", IMAGE_URL));

    for _ in 0..2 {
        let state = h
            .resolver
            .resolve(ResourceRef::id("abc"), ResolveOptions::no_cache())
            .await;
        assert!(state.is_success());
    }

    assert_eq!(metadata.calls(), 2);
    assert_eq!(bytes.calls(), 2);
    assert!(h.byte_cache.get(IMAGE_URL).await.is_none());
}

#[tokio::test]
async fn test_url_reference_skips_metadata() {
    let metadata = FakeMetadata::ok();
    let bytes = FakeBytes::ok();
    let h = harness(metadata.clone(), bytes.clone());

    let by_url = ResourceRef::url(Url::parse(IMAGE_URL).unwrap());
    assert!(h.resolver.resolve(by_url, ResolveOptions::standard()).await.is_success());

    let by_string = ResourceRef::url_string("https://cdn.example.com/other.png");
    assert!(
        h.resolver
            .resolve(by_string, ResolveOptions::standard())
            .await
            .is_success()
    );

    assert_eq!(metadata.calls(), 0);
    assert_eq!(bytes.calls(), 2);
}

// ============================================================================
// Failure kinds
// ============================================================================

#[tokio::test]
async fn test_metadata_failure() {
    let bytes = FakeBytes::ok();
    let h = harness(FakeMetadata::failing(), bytes.clone());

    let state = h
        .resolver
        .resolve(ResourceRef::id("abc"), ResolveOptions::standard())
        .await;

    match state {
        LoadingState::Failure(LoadError::MetadataFetchFailed(detail)) => {
            assert!(detail.contains("503"), "detail: {detail}");
        }
        other => panic!("expected MetadataFetchFailed, got {other:?}"),
    }
    assert_eq!(bytes.calls(), 0);
}

#[tokio::test]
async fn test_metadata_with_invalid_url() {
    let bytes = FakeBytes::ok();
    let h = harness(FakeMetadata::with_url("not a url"), bytes.clone());

    let state = h
        .resolver
        .resolve(ResourceRef::id("abc"), ResolveOptions::standard())
        .await;

    assert_eq!(
        state,
        LoadingState::Failure(LoadError::InvalidUrl("not a url".to_string()))
    );
    assert_eq!(bytes.calls(), 0);
}

#[tokio::test]
async fn test_unparseable_url_string() {
    let bytes = FakeBytes::ok();
    let h = harness(FakeMetadata::ok(), bytes.clone());

    let state = h
        .resolver
        .resolve(ResourceRef::url_string("::nope::"), ResolveOptions::standard())
        .await;

    assert_eq!(
        state.error(),
        Some(&LoadError::InvalidUrl("::nope::".to_string()))
    );
    assert_eq!(bytes.calls(), 0);
}

#[tokio::test]
async fn test_undecodable_payload_is_download_failure() {
    let h = harness(FakeMetadata::ok(), FakeBytes::garbage());

    let state = h
        .resolver
        .resolve(ResourceRef::id("abc"), ResolveOptions::standard())
        .await;

    assert_eq!(state, LoadingState::Failure(LoadError::DownloadFailed));
    assert!(!h.byte_cache.memory_contains(IMAGE_URL));
}

// ============================================================================
// Retry loop
// ============================================================================

#[tokio::test]
async fn test_exhaustive_retry_failure() {
    let bytes = FakeBytes::always_failing();
    let h = harness(FakeMetadata::ok(), bytes.clone());

    let state = h
        .resolver
        .resolve(
            ResourceRef::id("abc"),
            options(CachePolicy::All, RetryPolicy::fixed(2)),
        )
        .await;

    assert_eq!(bytes.calls(), 3);
    assert_eq!(state, LoadingState::Failure(LoadError::DownloadFailed));
}

#[tokio::test]
async fn test_no_retry_is_single_attempt() {
    let bytes = FakeBytes::always_failing();
    let h = harness(FakeMetadata::ok(), bytes.clone());

    let state = h
        .resolver
        .resolve(ResourceRef::id("abc"), ResolveOptions::standard())
        .await;

    assert!(state.is_failure());
    assert_eq!(bytes.calls(), 1);
}

#[tokio::test]
async fn test_retry_recovers_after_transient_failures() {
    let bytes = FakeBytes::failing_first(2);
    let h = harness(FakeMetadata::ok(), bytes.clone());

    let state = h
        .resolver
        .resolve(
            ResourceRef::id("abc"),
            options(CachePolicy::All, RetryPolicy::fixed(5)),
        )
        .await;

    assert!(state.is_success());
    // stops at the first success
    assert_eq!(bytes.calls(), 3);
}

#[tokio::test]
async fn test_metadata_cached_across_attempts() {
    let metadata = FakeMetadata::ok();
    let bytes = FakeBytes::failing_first(2);
    let h = harness(metadata.clone(), bytes.clone());

    let state = h
        .resolver
        .resolve(
            ResourceRef::id("abc"),
            options(CachePolicy::All, RetryPolicy::fixed(2)),
        )
        .await;

    assert!(state.is_success());
    assert_eq!(metadata.calls(), 1);
    assert_eq!(bytes.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_timing() {
    let bytes = FakeBytes::always_failing();
    let h = harness(FakeMetadata::ok(), bytes.clone());
    let started = tokio::time::Instant::now();

    let state = h
        .resolver
        .resolve(
            ResourceRef::url_string(IMAGE_URL),
            options(
                CachePolicy::None,
                RetryPolicy::exponential_with_base(3, Duration::from_secs(1)),
            ),
        )
        .await;

    assert!(state.is_failure());
    assert_eq!(bytes.calls(), 4);
    assert_eq!(
        bytes.gaps(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert_eq!(started.elapsed(), Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_fixed_retry_does_not_wait() {
    let bytes = FakeBytes::always_failing();
    let h = harness(FakeMetadata::ok(), bytes.clone());
    let started = tokio::time::Instant::now();

    h.resolver
        .resolve(
            ResourceRef::url_string(IMAGE_URL),
            options(CachePolicy::None, RetryPolicy::fixed(2)),
        )
        .await;

    assert_eq!(bytes.gaps(), vec![Duration::ZERO, Duration::ZERO]);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_concurrent_resolutions_are_independent() {
    let bytes = FakeBytes::ok();
    let h = harness(FakeMetadata::ok(), bytes.clone());
    let source = ResourceRef::url_string(IMAGE_URL);

    let (a, b) = tokio::join!(
        h.resolver.resolve(source.clone(), ResolveOptions::no_cache()),
        h.resolver.resolve(source.clone(), ResolveOptions::no_cache()),
    );

    assert!(a.is_success() && b.is_success());
    assert_eq!(bytes.calls(), 2);
}

// ============================================================================
// Resolution handle
// ============================================================================

#[tokio::test]
async fn test_resolution_state_transitions() {
    let bytes = FakeBytes::ok();
    let h = harness(FakeMetadata::ok(), bytes.clone());

    let resolution = h
        .resolver
        .resolution(ResourceRef::id("abc"), ResolveOptions::standard());
    assert_eq!(resolution.state(), LoadingState::Idle);

    let state = resolution.load().await;
    assert!(state.is_success());
    assert_eq!(resolution.state(), state);

    // terminal: a second load is a no-op
    let again = resolution.load().await;
    assert_eq!(again, state);
    assert_eq!(bytes.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resolution_is_loading_during_backoff() {
    let bytes = FakeBytes::always_failing();
    let h = harness(FakeMetadata::ok(), bytes.clone());

    let resolution = Arc::new(h.resolver.resolution(
        ResourceRef::url_string(IMAGE_URL),
        options(
            CachePolicy::None,
            RetryPolicy::exponential_with_base(1, Duration::from_secs(10)),
        ),
    ));
    let mut updates = resolution.subscribe();

    let task = {
        let resolution = Arc::clone(&resolution);
        tokio::spawn(async move { resolution.load().await })
    };

    updates.changed().await.unwrap();
    assert_eq!(
        *updates.borrow_and_update(),
        LoadingState::Loading { progress: None }
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(resolution.state(), LoadingState::Loading { progress: None });
    // a concurrent load does not start a second run
    assert_eq!(
        resolution.load().await,
        LoadingState::Loading { progress: None }
    );

    let terminal = task.await.unwrap();
    assert_eq!(terminal, LoadingState::Failure(LoadError::DownloadFailed));
    updates.changed().await.unwrap();
    assert_eq!(*updates.borrow(), terminal);
    assert_eq!(bytes.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_saturated_backoff_delay_keeps_waiting() {
    let bytes = FakeBytes::failing_first(1);
    let h = harness(FakeMetadata::ok(), bytes.clone());

    let pending = tokio::time::timeout(
        Duration::from_secs(3600),
        h.resolver.resolve(
            ResourceRef::url_string(IMAGE_URL),
            options(
                CachePolicy::None,
                RetryPolicy::exponential_with_base(2, Duration::MAX),
            ),
        ),
    )
    .await;

    assert!(pending.is_err());
    assert_eq!(bytes.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_load_returns_to_idle() {
    let bytes = FakeBytes::failing_first(1);
    let h = harness(FakeMetadata::ok(), bytes.clone());

    let resolution = h.resolver.resolution(
        ResourceRef::url_string(IMAGE_URL),
        options(
            CachePolicy::None,
            RetryPolicy::exponential_with_base(1, Duration::from_secs(10)),
        ),
    );

    // gives up while the run sleeps in its backoff
    let abandoned = tokio::time::timeout(Duration::from_secs(1), resolution.load()).await;
    assert!(abandoned.is_err());
    assert_eq!(bytes.calls(), 1);
    assert_eq!(resolution.state(), LoadingState::Idle);

    let state = resolution.load().await;
    assert!(state.is_success(), "unexpected state: {state:?}");
    assert_eq!(resolution.state(), state);
    assert_eq!(bytes.calls(), 2);
}

// ============================================================================
// Streamed resolution
// ============================================================================

#[tokio::test]
async fn test_resolve_stream_yields_loading_then_terminal() {
    let h = harness(FakeMetadata::ok(), FakeBytes::ok());

    let states: Vec<LoadingState> = h
        .resolver
        .resolve_stream(ResourceRef::id("abc"), ResolveOptions::standard())
        .collect()
        .await;

    assert_eq!(states.len(), 2);
    assert_eq!(states[0], LoadingState::Loading { progress: None });
    assert!(states[1].is_success());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_stream_abandons_resolution() {
    let bytes = FakeBytes::always_failing();
    let h = harness(FakeMetadata::ok(), bytes.clone());

    let mut stream = h.resolver.resolve_stream(
        ResourceRef::url_string(IMAGE_URL),
        options(
            CachePolicy::None,
            RetryPolicy::exponential_with_base(5, Duration::from_secs(1)),
        ),
    );
    assert_eq!(
        stream.next().await,
        Some(LoadingState::Loading { progress: None })
    );
    drop(stream);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(bytes.calls() < 6, "resolution kept running: {}", bytes.calls());
}
