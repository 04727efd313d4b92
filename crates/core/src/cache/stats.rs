use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub network_fetches: u64,
    pub network_failures: u64,
    pub coalesced_waiters: u64,
    pub memory_evictions: u64,
    pub disk_faults: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CacheStats {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    network_fetches: AtomicU64,
    network_failures: AtomicU64,
    coalesced_waiters: AtomicU64,
    memory_evictions: AtomicU64,
    disk_faults: AtomicU64,
}

impl CacheStats {
    pub(crate) fn on_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_network_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_network_failure(&self) {
        self.network_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_coalesced(&self) {
        self.coalesced_waiters.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_evictions(&self, count: usize) {
        self.memory_evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn on_disk_fault(&self) {
        self.disk_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            network_failures: self.network_failures.load(Ordering::Relaxed),
            coalesced_waiters: self.coalesced_waiters.load(Ordering::Relaxed),
            memory_evictions: self.memory_evictions.load(Ordering::Relaxed),
            disk_faults: self.disk_faults.load(Ordering::Relaxed),
        }
    }
}
