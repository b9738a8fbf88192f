//! Persistent key → bytes storage backing the byte cache.
//!
//! [`ByteStore`] is the seam between [`ByteCache`](crate::cache::ByteCache)
//! and durable storage. Implementations must tolerate concurrent use:
//! writes to distinct keys never interfere, and a read racing a write of
//! the same key may observe either version.
//!
//! - [`FsByteStore`]: one file per key under a cache directory.
//! - [`MemoryByteStore`]: process-local map, for tests and ephemeral use.

mod fs;
mod memory;

pub use fs::FsByteStore;
pub use memory::MemoryByteStore;

use async_trait::async_trait;

use crate::Result;

/// Durable key → bytes storage.
///
/// Read and delete failures are logged by the implementation and surface as
/// a miss / no-op; only writes report errors, so callers can decide whether
/// a failed persist matters.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Store name for logging/debugging.
    fn name(&self) -> &str;

    /// Read the bytes stored under `key`.
    async fn read(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `bytes` under `key`, replacing any previous value.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Delete `key`. No-op if absent.
    async fn delete(&self, key: &str);

    /// Every stored key with its size in bytes. Order is not guaranteed.
    async fn list_all(&self) -> Vec<(String, u64)>;

    /// Delete every stored key.
    ///
    /// Default implementation deletes the keys from [`list_all()`](Self::list_all)
    /// one by one.
    async fn clear(&self) {
        for (key, _) in self.list_all().await {
            self.delete(&key).await;
        }
    }
}
