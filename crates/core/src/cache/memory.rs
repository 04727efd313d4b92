//! Bounded in-memory tier with least-recently-used eviction.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Cache hierarchy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Memory,
    Disk,
}

/// Memory tier ceilings. Both are enforced on every insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    pub max_entries: usize,
    pub max_bytes: u64,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self { max_entries: 64, max_bytes: 128 * 1024 * 1024 }
    }
}

/// A cached payload.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub bytes: Bytes,
    pub size: u64,
    pub tier: Tier,
    /// Logical recency stamp; the smallest stamp is evicted first.
    pub order: u64,
}

/// LRU map of key to bytes.
///
/// `recency` mirrors `entries` keyed by each entry's `order`, so the least
/// recently used entry is always the first element.
#[derive(Debug, Default)]
pub(crate) struct MemoryTier {
    entries: HashMap<String, CacheEntry>,
    recency: BTreeMap<u64, String>,
    next_order: u64,
    total_bytes: u64,
    limits: MemoryLimits,
}

impl MemoryTier {
    pub(crate) fn new(limits: MemoryLimits) -> Self {
        Self { limits, ..Default::default() }
    }

    fn bump(&mut self) -> u64 {
        self.next_order += 1;
        self.next_order
    }

    /// Look up `key`, counting the hit as a recency touch.
    pub(crate) fn get(&mut self, key: &str) -> Option<Bytes> {
        let order = self.bump();
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.order);
        entry.order = order;
        self.recency.insert(order, key.to_string());
        Some(entry.bytes.clone())
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace `key`, then evict least-recently-used entries until
    /// both ceilings hold. Returns the number of evicted entries.
    ///
    /// A payload larger than the byte ceiling is not cached at all.
    pub(crate) fn insert(&mut self, key: &str, bytes: Bytes) -> usize {
        let size = bytes.len() as u64;
        self.remove(key);
        if size > self.limits.max_bytes || self.limits.max_entries == 0 {
            return 0;
        }

        let order = self.bump();
        self.recency.insert(order, key.to_string());
        self.entries
            .insert(key.to_string(), CacheEntry { key: key.to_string(), bytes, size, tier: Tier::Memory, order });
        self.total_bytes += size;

        let mut evicted = 0;
        while self.entries.len() > self.limits.max_entries || self.total_bytes > self.limits.max_bytes {
            let Some((_, oldest)) = self.recency.pop_first() else { break };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.total_bytes -= entry.size;
                evicted += 1;
            }
        }
        evicted
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.recency.remove(&entry.order);
                self.total_bytes -= entry.size;
                true
            }
            None => false,
        }
    }

    /// Drop every entry. Returns how many were held.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.recency.clear();
        self.total_bytes = 0;
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Entries from least to most recently used.
    pub(crate) fn entries_by_recency(&self) -> Vec<CacheEntry> {
        self.recency.values().filter_map(|key| self.entries.get(key).cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(max_entries: usize, max_bytes: u64) -> MemoryTier {
        MemoryTier::new(MemoryLimits { max_entries, max_bytes })
    }

    fn payload(len: usize) -> Bytes {
        Bytes::from(vec![7u8; len])
    }

    fn keys(tier: &MemoryTier) -> Vec<String> {
        tier.entries_by_recency().into_iter().map(|e| e.key).collect()
    }

    #[test]
    fn test_get_miss() {
        let mut tier = tier(4, 1024);
        assert!(tier.get("missing").is_none());
    }

    #[test]
    fn test_entry_count_ceiling_evicts_lru() {
        let mut tier = tier(2, 1024);
        tier.insert("a", payload(1));
        tier.insert("b", payload(1));
        assert_eq!(tier.insert("c", payload(1)), 1);
        assert_eq!(keys(&tier), vec!["b", "c"]);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut tier = tier(2, 1024);
        tier.insert("a", payload(1));
        tier.insert("b", payload(1));
        assert!(tier.get("a").is_some());
        tier.insert("c", payload(1));
        assert_eq!(keys(&tier), vec!["a", "c"]);
    }

    #[test]
    fn test_byte_ceiling_evicts_until_satisfied() {
        let mut tier = tier(10, 100);
        tier.insert("a", payload(40));
        tier.insert("b", payload(40));
        tier.insert("c", payload(10));
        assert_eq!(tier.insert("d", payload(60)), 2);
        assert_eq!(keys(&tier), vec!["c", "d"]);
        assert_eq!(tier.total_bytes(), 70);
    }

    #[test]
    fn test_oversized_payload_not_cached() {
        let mut tier = tier(10, 100);
        tier.insert("a", payload(10));
        assert_eq!(tier.insert("huge", payload(101)), 0);
        assert!(!tier.contains("huge"));
        assert!(tier.contains("a"));
    }

    #[test]
    fn test_replace_updates_size() {
        let mut tier = tier(10, 100);
        tier.insert("a", payload(10));
        tier.insert("a", payload(30));
        assert_eq!(tier.len(), 1);
        assert_eq!(tier.total_bytes(), 30);
    }

    #[test]
    fn test_clear() {
        let mut tier = tier(10, 100);
        tier.insert("a", payload(10));
        tier.insert("b", payload(10));
        assert_eq!(tier.clear(), 2);
        assert_eq!(tier.len(), 0);
        assert_eq!(tier.total_bytes(), 0);
        assert!(tier.get("a").is_none());
    }
}
