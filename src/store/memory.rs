//! In-process byte store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::ByteStore;
use crate::Result;

/// [`ByteStore`] backed by a `HashMap`. Contents die with the process.
#[derive(Default)]
pub struct MemoryByteStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ByteStore for MemoryByteStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    async fn list_all(&self) -> Vec<(String, u64)> {
        self.lock()
            .iter()
            .map(|(key, bytes)| (key.clone(), bytes.len() as u64))
            .collect()
    }

    async fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_delete() {
        let store = MemoryByteStore::new();
        store.write("k", b"abc").await.unwrap();
        assert_eq!(store.read("k").await.as_deref(), Some(&b"abc"[..]));
        assert_eq!(store.list_all().await, vec![("k".to_string(), 3)]);
        store.delete("k").await;
        assert!(store.read("k").await.is_none());
        assert!(store.is_empty());
    }
}
