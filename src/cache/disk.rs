//! Disk tier of the content cache.
//!
//! One flat directory per namespace, one file per key. Writes land in a
//! dot-prefixed temp file first and are renamed into place, so a file
//! under its real name is always complete.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Blob, CacheError, CacheKey};

/// Outcome of a best-effort clear
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Entries removed
    pub removed: usize,

    /// Entries that could not be removed
    pub failed: usize,
}

/// Disk usage of one namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    /// Complete cache files
    pub files: u64,

    /// Sum of their sizes
    pub bytes: u64,
}

/// Flat file store for one cache namespace
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Open the store, creating the directory if absent
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Namespace directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing a key
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    /// Whether a complete file exists for the key (stat only)
    pub fn exists(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Read the blob for a key, `None` when absent
    pub async fn read(&self, key: &CacheKey) -> Result<Option<Blob>, CacheError> {
        let path = self.path_for(key);

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(Blob::from(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Write a blob, replacing any previous file for the key
    pub async fn write(&self, key: &CacheKey, blob: &Blob) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let temp = self.dir.join(format!(".{}.{}.part", key, Uuid::new_v4().simple()));

        if let Err(e) = fs::write(&temp, blob.as_bytes()).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::io(&temp, e));
        }

        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::io(&path, e));
        }

        Ok(())
    }

    /// Remove the file for a key. Returns whether a file was removed.
    pub async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.path_for(key);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Remove every entry in the namespace, one at a time.
    ///
    /// Failures are logged and counted; they never stop the sweep. The
    /// directory is recreated afterwards.
    pub async fn clear(&self) -> ClearReport {
        let mut report = ClearReport::default();

        match fs::read_dir(&self.dir).await {
            Ok(mut entries) => loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(dir = %self.dir.display(), error = %e, "Failed to list cache entry");
                        report.failed += 1;
                        break;
                    }
                };

                let path = entry.path();
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                let result = if is_dir {
                    fs::remove_dir_all(&path).await
                } else {
                    fs::remove_file(&path).await
                };

                match result {
                    Ok(()) => report.removed += 1,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to remove cache entry");
                        report.failed += 1;
                    }
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to read cache directory");
                report.failed += 1;
            }
        }

        if let Err(e) = fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "Failed to recreate cache directory");
        }

        debug!(dir = %self.dir.display(), removed = report.removed, failed = report.failed, "Disk cache cleared");
        report
    }

    /// Count complete files and their sizes, ignoring in-progress writes
    pub async fn usage(&self) -> Result<DiskUsage, CacheError> {
        let mut usage = DiskUsage::default();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(usage),
            Err(e) => return Err(CacheError::io(&self.dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?
        {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            let metadata = entry
                .metadata()
                .await
                .map_err(|e| CacheError::io(entry.path(), e))?;
            if metadata.is_file() {
                usage.files += 1;
                usage.bytes += metadata.len();
            }
        }

        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (DiskStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::open(temp.path().join("image_cache")).await.unwrap();
        (store, temp)
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("video_cache");

        DiskStore::open(&dir).await.unwrap();
        DiskStore::open(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::new("foo.jpg").unwrap();

        assert!(!store.exists(&key));
        assert!(store.read(&key).await.unwrap().is_none());

        store.write(&key, &Blob::from(b"jpeg bytes".to_vec())).await.unwrap();

        assert!(store.exists(&key));
        assert_eq!(store.read(&key).await.unwrap().unwrap().as_bytes(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::new("foo.jpg").unwrap();

        store.write(&key, &Blob::from(b"first".to_vec())).await.unwrap();
        store.write(&key, &Blob::from(b"second".to_vec())).await.unwrap();

        assert_eq!(store.read(&key).await.unwrap().unwrap().as_bytes(), b"second");
        assert_eq!(store.usage().await.unwrap().files, 1);
    }

    #[tokio::test]
    async fn test_partial_write_is_not_a_hit() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::new("bar.mp4").unwrap();

        // Leftover from an abandoned write
        tokio::fs::write(store.dir().join(".bar.mp4.dead.part"), b"half")
            .await
            .unwrap();

        assert!(!store.exists(&key));
        assert_eq!(store.usage().await.unwrap(), DiskUsage::default());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let (store, _temp) = create_test_store().await;

        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            let key = CacheKey::new(name).unwrap();
            store.write(&key, &Blob::from(name.as_bytes().to_vec())).await.unwrap();
        }
        tokio::fs::write(store.dir().join(".x.part"), b"partial").await.unwrap();

        let report = store.clear().await;

        assert_eq!(report.removed, 4);
        assert_eq!(report.failed, 0);
        assert!(store.dir().is_dir());
        assert_eq!(store.usage().await.unwrap().files, 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::new("foo.jpg").unwrap();

        store.write(&key, &Blob::from(b"x".to_vec())).await.unwrap();
        assert!(store.remove(&key).await.unwrap());
        assert!(!store.remove(&key).await.unwrap());
        assert!(!store.exists(&key));
    }
}
