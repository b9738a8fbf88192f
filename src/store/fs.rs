//! Filesystem byte store.
//!
//! Each key maps to one file under the root directory. `/` in a key becomes
//! `_` in the file name. Names longer than [`MAX_SEGMENT`] characters are
//! split into nested directories; every directory component carries a `.d`
//! suffix so that a key and a longer key sharing its prefix never collide
//! (the file `abc` and the directory `abc.d` are distinct).
//!
//! Writes go to a unique `.tmp-*` sibling first and are renamed into place,
//! so readers never observe a partially written file. Anything containing a
//! `.` other than a `.d` directory is not a stored key and is ignored when
//! listing.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use super::ByteStore;
use crate::{HuginnError, Result};

/// Longest single path component derived from a key.
pub const MAX_SEGMENT: usize = 128;

const DIR_SUFFIX: &str = ".d";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// [`ByteStore`] writing one file per key below a root directory.
///
/// The root is created lazily on first write.
///
/// ```no_run
/// use huginn::store::{ByteStore, FsByteStore};
///
/// # async fn example() -> huginn::Result<()> {
/// let store = FsByteStore::new("/tmp/huginn-images");
/// store.write("aGVsbG8=", b"bytes").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FsByteStore {
    root: PathBuf,
}

impl FsByteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`, or `None` if `key` cannot be stored.
    pub fn path_for(&self, key: &str) -> Option<PathBuf> {
        if !is_storable(key) {
            return None;
        }
        let name = key.replace('/', "_");
        let segments: Vec<&str> = name
            .as_bytes()
            .chunks(MAX_SEGMENT)
            // keys are ASCII, so every chunk boundary is a char boundary
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect();
        let (leaf, dirs) = segments.split_last()?;
        let mut path = self.root.clone();
        for dir in dirs {
            path.push(format!("{dir}{DIR_SUFFIX}"));
        }
        path.push(leaf);
        Some(path)
    }

    async fn walk(&self) -> Vec<(String, u64)> {
        let mut found = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];
        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "failed to list cache directory");
                    continue;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "failed to read cache directory entry");
                        break;
                    }
                };
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };
                if file_type.is_dir() {
                    if let Some(stem) = name.strip_suffix(DIR_SUFFIX)
                        && !stem.contains('.')
                    {
                        pending.push((entry.path(), format!("{prefix}{stem}")));
                    }
                } else if file_type.is_file() && !name.contains('.') {
                    let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                    found.push((format!("{prefix}{name}").replace('_', "/"), size));
                }
            }
        }
        found
    }
}

/// Keys must be non-empty ASCII without `.`, `_`, `\` or NUL, which keeps the
/// key → path mapping injective and confined to the root.
fn is_storable(key: &str) -> bool {
    !key.is_empty()
        && key.is_ascii()
        && !key.contains(['.', '_', '\\', '\0'])
}

#[async_trait]
impl ByteStore for FsByteStore {
    fn name(&self) -> &str {
        "fs"
    }

    async fn read(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cached file");
                None
            }
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self
            .path_for(key)
            .ok_or_else(|| HuginnError::InvalidInput(format!("unstorable cache key {key:?}")))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a unique tmp file, then rename for atomicity
        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".tmp-{}-{seq}", std::process::id()));
        let tmp_path = path.with_file_name(tmp_name);

        fs::write(&tmp_path, bytes).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) {
        let Some(path) = self.path_for(key) else {
            return;
        };
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to delete cached file"),
        }
    }

    async fn list_all(&self) -> Vec<(String, u64)> {
        self.walk().await
    }

    /// Removes stored files, split-key directories and stray tmp files.
    /// Unrelated files in the root are left alone.
    async fn clear(&self) {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "failed to list cache directory");
                return;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            let path = entry.path();
            let result = if file_type.is_dir() && name.ends_with(DIR_SUFFIX) {
                fs::remove_dir_all(&path).await
            } else if file_type.is_file() && (!name.contains('.') || name.contains(".tmp-")) {
                fs::remove_file(&path).await
            } else {
                continue;
            };
            if let Err(e) = result {
                warn!(path = %path.display(), error = %e, "failed to remove cached entry");
            }
        }
    }
}
