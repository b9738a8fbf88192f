//! Huginn - resolve remote images through layered caching and retry
//!
//! This crate turns a reference to a remote image (a server-side id, a URL,
//! or a URL string) into decoded image data. Metadata lookups go through a
//! bounded LRU [`MetadataCache`]; image bytes go through a two-tier
//! [`ByteCache`] (decoded images in memory, JPEG copies on disk). Failed
//! resolutions are retried according to a [`RetryPolicy`].
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{Huginn, ResolveOptions, ResourceRef, LoadingState};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let service = Huginn::builder()
//!         .http_base_url("https://images.example.com/api")
//!         .build()?;
//!
//!     match service
//!         .resolve(ResourceRef::id("abc123"), ResolveOptions::with_retry())
//!         .await
//!     {
//!         LoadingState::Success(resource) => {
//!             println!("{}x{}", resource.width(), resource.height());
//!         }
//!         LoadingState::Failure(error) => eprintln!("{}", error.user_message()),
//!         _ => unreachable!("resolve returns a terminal state"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Custom fetchers
//!
//! The network is reached only through the [`MetadataFetcher`] and
//! [`ByteFetcher`] traits, so tests and embedders can substitute their own:
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use huginn::{Huginn, MetadataFetcher, ResourceMetadata, store::MemoryByteStore};
//!
//! struct StaticMetadata;
//!
//! #[async_trait]
//! impl MetadataFetcher for StaticMetadata {
//!     fn name(&self) -> &str {
//!         "static"
//!     }
//!
//!     async fn fetch(&self, id: &str) -> huginn::Result<ResourceMetadata> {
//!         Ok(ResourceMetadata::new(id, format!("https://cdn.example.com/{id}.png")))
//!     }
//! }
//!
//! let service = Huginn::builder()
//!     .metadata_fetcher(Arc::new(StaticMetadata))
//!     .http_base_url("https://unused.example.com")
//!     .byte_store(Arc::new(MemoryByteStore::new()))
//!     .build()
//!     .unwrap();
//! # let _ = service;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types at crate root
pub use cache::{ByteCache, ByteCacheConfig, MetadataCache, MetadataCacheConfig, cache_key};
pub use config::Config;
pub use error::{HuginnError, Result};
pub use fetch::{ByteFetcher, HttpByteFetcher, HttpMetadataFetcher, MetadataFetcher};
pub use resolver::{Resolution, Resolver, StateStream};
pub use retry::RetryPolicy;
pub use service::{Huginn, HuginnBuilder, ImageService};
pub use store::{ByteStore, FsByteStore, MemoryByteStore};

pub use types::{
    CachePolicy, LoadError, LoadingState, ResolveOptions, Resource, ResourceMetadata, ResourceRef,
};
