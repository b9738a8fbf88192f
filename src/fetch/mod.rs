//! Fetcher traits: the network seam of the resolver.
//!
//! The resolver never talks to the network directly. It asks a
//! [`MetadataFetcher`] to turn an image id into [`ResourceMetadata`] and a
//! [`ByteFetcher`] to download the bytes behind a URL. The HTTP
//! implementations in [`http`] cover the common case; tests and embedders
//! supply their own.

pub mod http;

pub use http::{HttpByteFetcher, HttpMetadataFetcher};

use async_trait::async_trait;
use url::Url;

use crate::Result;
use crate::types::ResourceMetadata;

/// Looks up image metadata by id.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetcher name for logging/debugging.
    fn name(&self) -> &str;

    /// Fetch the metadata record for `id`.
    async fn fetch(&self, id: &str) -> Result<ResourceMetadata>;
}

/// Downloads the raw bytes behind a URL.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    /// Fetcher name for logging/debugging.
    fn name(&self) -> &str;

    /// Download the body at `url`.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}
