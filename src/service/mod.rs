//! Image service facade.
//!
//! [`ImageService`] bundles a [`Resolver`] with default [`ResolveOptions`]
//! and exposes the cache-management operations applications need
//! (invalidation, clearing, disk usage, memory-pressure trimming).
//!
//! ```rust,no_run
//! use huginn::{Huginn, ResourceRef};
//!
//! # async fn example() -> huginn::Result<()> {
//! let service = Huginn::builder()
//!     .http_base_url("https://images.example.com/api")
//!     .build()?;
//!
//! let state = service.fetch(ResourceRef::id("abc123")).await;
//! if let Some(resource) = state.resource() {
//!     println!("{}x{}", resource.width(), resource.height());
//! }
//! # Ok(())
//! # }
//! ```

mod builder;

pub use builder::{API_TOKEN_ENV, CACHE_DIR_ENV, Huginn, HuginnBuilder, resolve_cache_dir};

use tracing::info;
use url::Url;

use crate::resolver::{Resolution, Resolver, StateStream};
use crate::types::{LoadError, LoadingState, ResolveOptions, Resource, ResourceMetadata, ResourceRef};

/// Resolver plus defaults and cache management.
#[derive(Clone)]
pub struct ImageService {
    resolver: Resolver,
    default_options: ResolveOptions,
}

impl ImageService {
    pub fn new(resolver: Resolver, default_options: ResolveOptions) -> Self {
        Self {
            resolver,
            default_options,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn default_options(&self) -> ResolveOptions {
        self.default_options
    }

    /// Resolve `source` with the default options.
    pub async fn fetch(&self, source: ResourceRef) -> LoadingState {
        self.resolver.resolve(source, self.default_options).await
    }

    /// Resolve `source` with explicit options.
    pub async fn resolve(&self, source: ResourceRef, options: ResolveOptions) -> LoadingState {
        self.resolver.resolve(source, options).await
    }

    /// See [`Resolver::resolve_stream`].
    pub fn resolve_stream(&self, source: ResourceRef, options: ResolveOptions) -> StateStream {
        self.resolver.resolve_stream(source, options)
    }

    /// See [`Resolver::resolution`].
    pub fn resolution(&self, source: ResourceRef, options: ResolveOptions) -> Resolution {
        self.resolver.resolution(source, options)
    }

    /// Metadata for `id`, served from the metadata cache when the default
    /// cache policy allows it.
    pub async fn metadata(&self, id: &str) -> Result<ResourceMetadata, LoadError> {
        self.resolver
            .metadata(id, self.default_options.cache_policy)
            .await
    }

    /// Image at `url`, served from the byte cache when the default cache
    /// policy allows it. No retry.
    pub async fn load_image(&self, url: &Url) -> Result<Resource, LoadError> {
        self.resolver
            .image(url, self.default_options.cache_policy)
            .await
    }

    /// Forget cached metadata for `id`.
    pub fn remove_metadata(&self, id: &str) {
        self.resolver.metadata_cache().remove(id);
    }

    /// Forget the cached image for `url` in both tiers.
    pub async fn remove_image(&self, url: &str) {
        self.resolver.byte_cache().remove(url).await;
    }

    pub fn clear_metadata_cache(&self) {
        self.resolver.metadata_cache().clear();
        info!("cleared metadata cache");
    }

    /// Drop every cached image, in memory and on disk.
    pub async fn clear_byte_cache(&self) {
        self.resolver.byte_cache().clear_all().await;
    }

    /// Total bytes held by the persistent tier.
    pub async fn cache_size_on_disk(&self) -> u64 {
        self.resolver.byte_cache().size_on_disk().await
    }

    /// Release in-memory images, keeping persisted copies. Call on memory
    /// pressure.
    pub fn trim_memory(&self) {
        self.resolver.byte_cache().trim_memory();
        info!("trimmed in-memory image cache");
    }
}
