//! Durable disk tier.
//!
//! The disk tier is a superset of the memory tier: memory eviction never
//! touches it and nothing expires automatically. Entries leave only through
//! [`DiskTier::remove`] or [`DiskTier::purge`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::key::{ENTRY_EXTENSION, key_from_storage_path, storage_path};
use crate::Error;

/// Key-value byte store persisted across restarts.
#[async_trait]
pub trait DiskTier: Send + Sync {
    /// `Ok(None)` on a miss; `Err` only when the store itself faults.
    async fn read(&self, key: &str) -> Result<Option<Bytes>, Error>;

    /// Store `bytes` under `key`. A failed write leaves no partial entry.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error>;

    /// Returns whether an entry was removed.
    async fn remove(&self, key: &str) -> Result<bool, Error>;

    /// Remove every entry, returning how many were removed.
    async fn purge(&self) -> Result<u64, Error>;

    /// Keys currently stored.
    async fn keys(&self) -> Result<Vec<String>, Error>;
}

/// One file per key under a root directory.
///
/// File names are the reversible encoding from [`storage_path`]. Writes land
/// in a temporary sibling first and are renamed into place.
#[derive(Debug)]
pub struct FileDiskTier {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl FileDiskTier {
    /// Open (and create if needed) a disk tier rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root, tmp_counter: AtomicU64::new(0) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(storage_path(key))
    }

    fn temp_path(&self, entry: &Path) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        entry.with_extension(format!("{ENTRY_EXTENSION}.tmp-{}-{n}", std::process::id()))
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>, Error> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut read_dir = match tokio::fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION) {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl DiskTier for FileDiskTier {
    async fn read(&self, key: &str) -> Result<Option<Bytes>, Error> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path(&path);
        let written = async {
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge(&self) -> Result<u64, Error> {
        let count = self.entry_files().await?.len() as u64;
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(count)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let mut keys = Vec::new();
        for path in self.entry_files().await? {
            let Ok(relative) = path.strip_prefix(&self.root) else { continue };
            match key_from_storage_path(relative) {
                Ok(key) => keys.push(key),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping foreign file in disk tier"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
