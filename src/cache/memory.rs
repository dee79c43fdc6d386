//! Bounded in-memory tier of the content cache.
//!
//! A view over a subset of the disk-resident entries. Entries may be evicted
//! at any time; the disk tier stays authoritative.

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use super::{Blob, CacheKey};

/// Bounds of one memory tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLimits {
    /// Maximum number of entries held
    pub max_entries: u64,

    /// Maximum estimated total size in bytes
    pub max_bytes: u64,
}

impl MemoryLimits {
    pub fn new(max_entries: u64, max_bytes: u64) -> Self {
        Self {
            max_entries: max_entries.max(1),
            max_bytes: max_bytes.max(1),
        }
    }

    /// Minimum weight charged per entry.
    ///
    /// Charging at least `max_bytes / max_entries` per entry caps the count
    /// at `max_entries` while the weighted total caps the bytes.
    pub fn min_entry_weight(&self) -> u64 {
        self.max_bytes.div_ceil(self.max_entries.max(1)).max(1)
    }
}

/// LRU-style memory cache bounded by entry count and byte size
#[derive(Clone)]
pub struct MemoryTier {
    inner: Cache<CacheKey, Blob>,
    limits: MemoryLimits,
}

impl MemoryTier {
    /// Create a tier with the given bounds
    pub fn new(limits: MemoryLimits) -> Self {
        let floor = limits.min_entry_weight();

        let inner = Cache::builder()
            .max_capacity(limits.max_bytes)
            .weigher(move |_key: &CacheKey, blob: &Blob| -> u32 {
                (blob.len() as u64).max(floor).min(u32::MAX as u64) as u32
            })
            .build();

        Self { inner, limits }
    }

    /// Configured bounds
    pub fn limits(&self) -> MemoryLimits {
        self.limits
    }

    /// Look up a blob
    pub fn get(&self, key: &CacheKey) -> Option<Blob> {
        self.inner.get(key)
    }

    /// Whether the key is currently resident
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Insert or replace a blob
    pub fn insert(&self, key: CacheKey, blob: Blob) {
        self.inner.insert(key, blob);
    }

    /// Drop one entry
    pub fn remove(&self, key: &CacheKey) {
        self.inner.invalidate(key);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
    }

    /// Resident entries (after applying pending evictions)
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    /// Weighted size of resident entries (after applying pending evictions)
    pub fn weighted_size(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.weighted_size()
    }
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("limits", &self.limits)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> CacheKey {
        CacheKey::new(name).unwrap()
    }

    #[test]
    fn test_min_entry_weight() {
        assert_eq!(MemoryLimits::new(4, 100).min_entry_weight(), 25);
        assert_eq!(MemoryLimits::new(3, 100).min_entry_weight(), 34);
        assert_eq!(MemoryLimits::new(0, 0).min_entry_weight(), 1);
    }

    #[test]
    fn test_insert_and_get() {
        let tier = MemoryTier::new(MemoryLimits::new(10, 1024));
        tier.insert(key("a.jpg"), Blob::from(b"abc".to_vec()));

        assert!(tier.contains(&key("a.jpg")));
        assert_eq!(tier.get(&key("a.jpg")).unwrap().as_bytes(), b"abc");
        assert!(tier.get(&key("b.jpg")).is_none());
    }

    #[test]
    fn test_entry_count_bound() {
        let tier = MemoryTier::new(MemoryLimits::new(3, 1024 * 1024));

        for i in 0..20 {
            tier.insert(key(&format!("{}.jpg", i)), Blob::from(vec![0u8; 8]));
        }

        assert!(tier.entry_count() <= 3);
    }

    #[test]
    fn test_byte_size_bound() {
        let tier = MemoryTier::new(MemoryLimits::new(1000, 1000));

        for i in 0..10 {
            tier.insert(key(&format!("{}.jpg", i)), Blob::from(vec![0u8; 300]));
        }

        assert!(tier.weighted_size() <= 1000);
        assert!(tier.entry_count() <= 3);
    }

    #[test]
    fn test_clear() {
        let tier = MemoryTier::new(MemoryLimits::new(10, 1024));
        tier.insert(key("a.jpg"), Blob::from(b"abc".to_vec()));
        tier.clear();

        assert!(!tier.contains(&key("a.jpg")));
        assert!(tier.get(&key("a.jpg")).is_none());
    }
}
