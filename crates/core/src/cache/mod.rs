//! Two-tier image cache: memory, then disk, then network.
//!
//! This module provides:
//!
//! - A bounded LRU memory tier (entry count and byte ceilings)
//! - Durable disk tiers (one file per key, or SQLite) that never evict on their own
//! - Write-through population: disk hits and network fills land in memory
//! - Per-key request coalescing so concurrent misses share one network fetch

pub mod blobs;
pub mod connection;
pub mod disk;
pub mod key;
pub mod memory;
pub mod stats;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::source::ImageSource;
use crate::{Error, FetchError};

pub use connection::SqliteDiskTier;
pub use disk::{DiskTier, FileDiskTier};
pub use key::validate_key;
pub use memory::{CacheEntry, MemoryLimits, Tier};
use memory::MemoryTier;
use stats::CacheStats;
pub use stats::CacheStatsSnapshot;

/// Default number of concurrent resolves in a prefetch batch.
pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 8;

type Fill = Shared<BoxFuture<'static, Result<Bytes, Error>>>;

/// Outcome of a [`TieredCache::prefetch_all`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    /// Distinct keys in the batch.
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct Inner {
    memory: Mutex<MemoryTier>,
    disk: Arc<dyn DiskTier>,
    source: Arc<dyn ImageSource>,
    in_flight: Mutex<HashMap<String, Fill>>,
    stats: CacheStats,
    prefetch_concurrency: usize,
}

impl Inner {
    async fn populate_memory(&self, key: &str, bytes: Bytes) {
        let evicted = self.memory.lock().await.insert(key, bytes);
        if evicted > 0 {
            self.stats.on_evictions(evicted);
            tracing::debug!(key, evicted, "memory tier evicted least recently used entries");
        }
    }

    /// Disk, then network. Runs at most once per key at a time.
    async fn load(&self, key: &str) -> Result<Bytes, Error> {
        match self.disk.read(key).await {
            Ok(Some(bytes)) => {
                self.stats.on_disk_hit();
                tracing::debug!(key, size = bytes.len(), "disk tier hit");
                self.populate_memory(key, bytes.clone()).await;
                return Ok(bytes);
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.on_disk_fault();
                tracing::warn!(key, error = %e, "disk tier read failed, falling through to network");
            }
        }

        self.stats.on_network_fetch();
        let bytes = match self.source.fetch(key).await {
            Ok(bytes) if bytes.is_empty() => {
                self.stats.on_network_failure();
                return Err(FetchError::Parse("empty payload".into()).into());
            }
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.on_network_failure();
                return Err(e.into());
            }
        };
        tracing::debug!(key, size = bytes.len(), "fetched from network");

        if let Err(e) = self.disk.write(key, &bytes).await {
            self.stats.on_disk_fault();
            // Disk may still hold older bytes for this key; memory must not disagree with it.
            if let Err(remove_err) = self.disk.remove(key).await {
                self.stats.on_disk_fault();
                tracing::warn!(key, error = %e, remove_error = %remove_err, "disk tier write failed, not caching");
                return Ok(bytes);
            }
            tracing::warn!(key, error = %e, "disk tier write failed, serving from memory only");
        }
        self.populate_memory(key, bytes.clone()).await;

        Ok(bytes)
    }

    /// Memory is populated before the key is deregistered, so a caller that
    /// misses the in-flight entry always finds the bytes in memory.
    async fn fill(self: Arc<Self>, key: String) -> Result<Bytes, Error> {
        let result = self.load(&key).await;
        self.in_flight.lock().await.remove(&key);
        result
    }
}

/// Memory → disk → network resolver for image keys.
///
/// Cheap to clone; clones share tiers, in-flight fills and stats.
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("prefetch_concurrency", &self.inner.prefetch_concurrency)
            .field("stats", &self.inner.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl TieredCache {
    /// Build a cache over `source` and `disk` with the given memory ceilings.
    pub fn new(
        source: Arc<dyn ImageSource>, disk: Arc<dyn DiskTier>, limits: MemoryLimits, prefetch_concurrency: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                memory: Mutex::new(MemoryTier::new(limits)),
                disk,
                source,
                in_flight: Mutex::new(HashMap::new()),
                stats: CacheStats::default(),
                prefetch_concurrency: prefetch_concurrency.max(1),
            }),
        }
    }

    /// Resolve `key` to bytes.
    ///
    /// A disk fault is logged and treated as a miss. Concurrent calls for the
    /// same key share a single disk lookup and network fetch.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidKey` if the key is empty or malformed
    /// - `Error::Fetch` if both tiers miss and the network fetch fails
    pub async fn resolve(&self, key: &str) -> Result<Bytes, Error> {
        validate_key(key)?;

        if let Some(bytes) = self.memory_hit(key).await {
            return Ok(bytes);
        }

        let fill = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.get(key) {
                Some(fill) => {
                    self.inner.stats.on_coalesced();
                    tracing::debug!(key, "joining in-flight fill");
                    fill.clone()
                }
                None => {
                    if let Some(bytes) = self.memory_hit(key).await {
                        return Ok(bytes);
                    }
                    let fill = Arc::clone(&self.inner).fill(key.to_string()).boxed().shared();
                    in_flight.insert(key.to_string(), fill.clone());
                    fill
                }
            }
        };

        fill.await
    }

    async fn memory_hit(&self, key: &str) -> Option<Bytes> {
        let bytes = self.inner.memory.lock().await.get(key)?;
        self.inner.stats.on_memory_hit();
        tracing::debug!(key, size = bytes.len(), "memory tier hit");
        Some(bytes)
    }

    /// Resolve every key, tolerating individual failures.
    ///
    /// Duplicate keys are resolved once. At most `prefetch_concurrency`
    /// resolves run at a time.
    pub async fn prefetch_all<I, K>(&self, keys: I) -> PrefetchReport
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let mut report = PrefetchReport { requested: keys.len(), ..Default::default() };
        if keys.is_empty() {
            return report;
        }

        let semaphore = Arc::new(Semaphore::new(self.inner.prefetch_concurrency));
        let mut join_set = JoinSet::new();

        for key in keys {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else { break };
            let cache = self.clone();
            join_set.spawn(async move {
                // Hold permit for task duration to enforce concurrency limit
                let _permit = permit;
                let result = cache.resolve(&key).await;
                (key, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(_))) => report.succeeded += 1,
                Ok((key, Err(e))) => {
                    report.failed += 1;
                    tracing::warn!(key = %key, error = %e, "prefetch failed");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(error = %e, "prefetch task aborted");
                }
            }
        }

        tracing::debug!(
            requested = report.requested,
            succeeded = report.succeeded,
            failed = report.failed,
            "prefetch finished"
        );
        report
    }

    /// Whether `key` is currently held in the memory tier. Does not touch recency.
    pub async fn in_memory(&self, key: &str) -> bool {
        self.inner.memory.lock().await.contains(key)
    }

    /// Memory tier entries from least to most recently used.
    pub async fn memory_entries(&self) -> Vec<CacheEntry> {
        self.inner.memory.lock().await.entries_by_recency()
    }

    /// `(entry count, total bytes)` of the memory tier.
    pub async fn memory_usage(&self) -> (usize, u64) {
        let memory = self.inner.memory.lock().await;
        (memory.len(), memory.total_bytes())
    }

    /// Drop the whole memory tier, as under memory pressure. Disk is untouched.
    pub async fn clear_memory(&self) -> usize {
        let cleared = self.inner.memory.lock().await.clear();
        self.inner.stats.on_evictions(cleared);
        tracing::info!(cleared, "memory tier cleared");
        cleared
    }

    /// Remove one key from both tiers. Returns whether the disk held it.
    pub async fn remove(&self, key: &str) -> Result<bool, Error> {
        validate_key(key)?;
        self.inner.memory.lock().await.remove(key);
        self.inner.disk.remove(key).await
    }

    /// Explicitly purge both tiers. Returns the number of disk entries removed.
    pub async fn purge(&self) -> Result<u64, Error> {
        self.inner.memory.lock().await.clear();
        let removed = self.inner.disk.purge().await?;
        tracing::info!(removed, "disk tier purged");
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn disk(&self) -> &Arc<dyn DiskTier> {
        &self.inner.disk
    }
}
