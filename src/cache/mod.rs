//! Content-addressed media cache.
//!
//! Every media kind gets its own namespace: a disk directory that is the
//! source of truth plus a bounded memory tier in front of it.
//!
//! # Storage Layout
//!
//! ```text
//! <cache root>/
//! ├── image_cache/
//! │   ├── <artifact_id>-grid.jpg
//! │   ├── <artifact_id>-list.jpg
//! │   └── <exhibition_id>-thumb.jpg
//! ├── video_cache/
//! │   └── <key>.mp4
//! └── audio_cache/
//!     └── <key>.m4a
//! ```

pub mod disk;
pub mod key;
pub mod memory;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub use disk::{ClearReport, DiskStore, DiskUsage};
pub use key::{CacheKey, MediaKind, Variant};
pub use memory::{MemoryLimits, MemoryTier};

/// Errors that can occur in the cache
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("Disk error at {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl CacheError {
    pub(crate) fn io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Opaque, cheaply clonable byte buffer stored by the cache.
///
/// Decoding into an image or a player is the consumer's concern.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Blob(Arc<[u8]>);

impl Blob {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.0.len())
    }
}

/// Snapshot of one namespace's occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub kind: MediaKind,

    /// Entries resident in memory
    pub memory_entries: u64,

    /// Weighted memory size
    pub memory_weight: u64,

    /// Files and bytes on disk
    pub disk: DiskUsage,
}

/// Disk + memory cache for one media kind
#[derive(Debug)]
pub struct ContentCache {
    kind: MediaKind,
    disk: DiskStore,
    memory: MemoryTier,
    /// Per-key write locks so memory always mirrors the last disk write
    writes: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl ContentCache {
    /// Open the namespace for `kind` under `root`
    pub async fn open(
        root: impl AsRef<Path>,
        kind: MediaKind,
        limits: MemoryLimits,
    ) -> Result<Self, CacheError> {
        let disk = DiskStore::open(root.as_ref().join(kind.dir_name())).await?;
        debug!(%kind, dir = %disk.dir().display(), "Cache namespace opened");

        Ok(Self {
            kind,
            disk,
            memory: MemoryTier::new(limits),
            writes: DashMap::new(),
        })
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Namespace directory on disk
    pub fn dir(&self) -> &Path {
        self.disk.dir()
    }

    /// Check memory, then disk. No reads beyond a map lookup and a stat.
    pub fn exists(&self, key: &CacheKey) -> bool {
        let hit = self.memory.contains(key) || self.disk.exists(key);
        debug!(kind = %self.kind, %key, hit, "Cache lookup");
        hit
    }

    /// Load a blob: memory first, then disk. A disk hit is promoted to memory.
    pub async fn load(&self, key: &CacheKey) -> Option<Blob> {
        if let Some(blob) = self.memory.get(key) {
            debug!(kind = %self.kind, %key, "Memory cache hit");
            return Some(blob);
        }

        match self.disk.read(key).await {
            Ok(Some(blob)) => {
                debug!(kind = %self.kind, %key, bytes = blob.len(), "Disk cache hit");
                self.memory.insert(key.clone(), blob.clone());
                Some(blob)
            }
            Ok(None) => {
                debug!(kind = %self.kind, %key, "Cache miss");
                None
            }
            Err(e) => {
                warn!(kind = %self.kind, %key, error = %e, "Failed to read cached blob");
                None
            }
        }
    }

    /// Write a blob to disk, then to memory, replacing any previous entry.
    ///
    /// Stores for one key are serialized. On disk failure the memory tier
    /// is left without the key, so it keeps reporting a miss and is
    /// downloaded again on next access.
    pub async fn store(&self, key: &CacheKey, blob: Blob) -> Result<(), CacheError> {
        let lock = self.writes.entry(key.clone()).or_default().clone();

        let result = {
            let _guard = lock.lock().await;
            self.write_through(key, blob).await
        };

        drop(lock);
        self.writes.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn write_through(&self, key: &CacheKey, blob: Blob) -> Result<(), CacheError> {
        if let Err(e) = self.disk.write(key, &blob).await {
            warn!(kind = %self.kind, %key, error = %e, "Failed to store blob");
            self.memory.remove(key);
            return Err(e);
        }

        debug!(kind = %self.kind, %key, bytes = blob.len(), "Stored blob");
        self.memory.insert(key.clone(), blob);
        Ok(())
    }

    /// Evict one entry from both tiers
    pub async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.memory.remove(key);
        self.disk.remove(key).await
    }

    /// Drop every memory entry and every file in the namespace (best-effort)
    pub async fn clear(&self) -> ClearReport {
        self.memory.clear();
        let report = self.disk.clear().await;
        debug!(kind = %self.kind, removed = report.removed, failed = report.failed, "Cache cleared");
        report
    }

    /// Occupancy snapshot
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(CacheStats {
            kind: self.kind,
            memory_entries: self.memory.entry_count(),
            memory_weight: self.memory.weighted_size(),
            disk: self.disk.usage().await?,
        })
    }
}

/// The image, video and audio namespaces
#[derive(Debug, Clone)]
pub struct MediaCaches {
    pub image: Arc<ContentCache>,
    pub video: Arc<ContentCache>,
    pub audio: Arc<ContentCache>,
}

impl MediaCaches {
    /// Open all three namespaces under `root`
    pub async fn open(
        root: impl AsRef<Path>,
        limits: impl Fn(MediaKind) -> MemoryLimits,
    ) -> Result<Self, CacheError> {
        let root = root.as_ref();

        Ok(Self {
            image: Arc::new(ContentCache::open(root, MediaKind::Image, limits(MediaKind::Image)).await?),
            video: Arc::new(ContentCache::open(root, MediaKind::Video, limits(MediaKind::Video)).await?),
            audio: Arc::new(ContentCache::open(root, MediaKind::Audio, limits(MediaKind::Audio)).await?),
        })
    }

    /// The namespace for a kind
    pub fn get(&self, kind: MediaKind) -> &Arc<ContentCache> {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    /// Clear every namespace
    pub async fn clear_all(&self) -> ClearReport {
        let mut total = ClearReport::default();

        for kind in MediaKind::ALL {
            let report = self.get(kind).clear().await;
            total.removed += report.removed;
            total.failed += report.failed;
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn limits() -> MemoryLimits {
        MemoryLimits::new(16, 1024 * 1024)
    }

    #[tokio::test]
    async fn test_disk_hit_populates_memory() {
        let temp = TempDir::new().unwrap();
        let key = CacheKey::new("foo.jpg").unwrap();

        // Write through one instance, read through a fresh one (cold memory)
        let writer = ContentCache::open(temp.path(), MediaKind::Image, limits()).await.unwrap();
        writer.store(&key, Blob::from(b"data".to_vec())).await.unwrap();

        let reader = ContentCache::open(temp.path(), MediaKind::Image, limits()).await.unwrap();
        assert!(!reader.memory.contains(&key));
        assert!(reader.exists(&key));

        let loaded = reader.load(&key).await.unwrap();
        assert_eq!(loaded.as_bytes(), b"data");
        assert!(reader.memory.contains(&key));
    }

    #[tokio::test]
    async fn test_memory_hit_survives_disk_loss() {
        let temp = TempDir::new().unwrap();
        let cache = ContentCache::open(temp.path(), MediaKind::Audio, limits()).await.unwrap();
        let key = CacheKey::new("tour.m4a").unwrap();

        cache.store(&key, Blob::from(b"audio".to_vec())).await.unwrap();
        std::fs::remove_file(cache.dir().join("tour.m4a")).unwrap();

        assert_eq!(cache.load(&key).await.unwrap().as_bytes(), b"audio");
    }

    #[tokio::test]
    async fn test_store_failure_leaves_miss() {
        let temp = TempDir::new().unwrap();
        let cache = ContentCache::open(temp.path(), MediaKind::Image, limits()).await.unwrap();
        let key = CacheKey::new("foo.jpg").unwrap();

        // A directory squatting on the key makes the rename fail
        std::fs::create_dir_all(cache.dir().join("foo.jpg").join("occupied")).unwrap();

        assert!(cache.store(&key, Blob::from(b"data".to_vec())).await.is_err());
        assert!(!cache.memory.contains(&key));
        assert!(cache.load(&key).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stores_keep_tiers_coherent() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(
            ContentCache::open(temp.path(), MediaKind::Image, limits()).await.unwrap(),
        );
        let key = CacheKey::new("foo.jpg").unwrap();

        let writers: Vec<_> = (0..16u8)
            .map(|n| {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                tokio::spawn(async move { cache.store(&key, Blob::from(vec![n; 256])).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let in_memory = cache.memory.get(&key).unwrap();
        let on_disk = std::fs::read(cache.dir().join("foo.jpg")).unwrap();
        assert_eq!(in_memory.as_bytes(), on_disk.as_slice());
        assert!(cache.writes.is_empty());
    }

    #[tokio::test]
    async fn test_namespaces_are_separate() {
        let temp = TempDir::new().unwrap();
        let caches = MediaCaches::open(temp.path(), |_| limits()).await.unwrap();
        let key = CacheKey::new("shared-name.bin").unwrap();

        caches.image.store(&key, Blob::from(b"img".to_vec())).await.unwrap();

        assert!(caches.image.exists(&key));
        assert!(!caches.video.exists(&key));
        assert!(!caches.audio.exists(&key));
        assert!(temp.path().join("image_cache").join("shared-name.bin").is_file());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let temp = TempDir::new().unwrap();
        let caches = MediaCaches::open(temp.path(), |_| limits()).await.unwrap();

        for kind in MediaKind::ALL {
            let key = CacheKey::new(format!("x.{}", kind.default_extension())).unwrap();
            caches.get(kind).store(&key, Blob::from(b"x".to_vec())).await.unwrap();
        }

        let report = caches.clear_all().await;
        assert_eq!(report.removed, 3);

        for kind in MediaKind::ALL {
            let stats = caches.get(kind).stats().await.unwrap();
            assert_eq!(stats.disk.files, 0);
        }
    }
}
