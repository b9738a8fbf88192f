//! Caching subsystem.
//!
//! Two independent caches sit in front of the network:
//!
//! - [`MetadataCache`]: bounded in-memory map from image id to
//!   [`ResourceMetadata`](crate::types::ResourceMetadata). When full it
//!   evicts the least recently used tenth of its entries in one batch.
//!
//! - [`ByteCache`]: two-tier cache of decoded images keyed by URL. A moka
//!   memory tier bounded by count and decoded size, backed by a persistent
//!   [`ByteStore`](crate::store::ByteStore). See [`bytes`] module docs.

pub mod bytes;
pub mod metadata;

pub use bytes::{ByteCache, ByteCacheConfig, MemoryUsage, cache_key, url_for_key};
pub use metadata::{MetadataCache, MetadataCacheConfig};
