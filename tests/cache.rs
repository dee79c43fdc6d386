//! Cache Integration Tests
//!
//! Round-trip, existence and clearing behavior of the content cache.

use lcva::cache::{Blob, CacheKey, ContentCache, MediaCaches, MediaKind, MemoryLimits};
use tempfile::TempDir;

fn limits() -> MemoryLimits {
    MemoryLimits::new(8, 64 * 1024)
}

async fn open(temp: &TempDir, kind: MediaKind) -> ContentCache {
    ContentCache::open(temp.path(), kind, limits()).await.unwrap()
}

#[tokio::test]
async fn test_empty_cache_scenario() {
    let temp = TempDir::new().unwrap();
    let cache = open(&temp, MediaKind::Image).await;
    let key = CacheKey::new("foo.jpg").unwrap();
    let data = Blob::from(b"\xff\xd8\xff\xe0 jpeg bytes".to_vec());

    assert!(!cache.exists(&key));
    assert!(cache.load(&key).await.is_none());

    cache.store(&key, data.clone()).await.unwrap();

    assert!(cache.exists(&key));
    assert_eq!(cache.load(&key).await.unwrap(), data);
    assert!(temp.path().join("image_cache").join("foo.jpg").is_file());
}

#[tokio::test]
async fn test_round_trip_per_kind() {
    let temp = TempDir::new().unwrap();
    let caches = MediaCaches::open(temp.path(), |_| limits()).await.unwrap();

    for (kind, name, bytes) in [
        (MediaKind::Image, "a-grid.jpg", b"image".as_slice()),
        (MediaKind::Video, "clip.mp4", b"video".as_slice()),
        (MediaKind::Audio, "tour.m4a", b"".as_slice()),
    ] {
        let key = CacheKey::new(name).unwrap();
        let cache = caches.get(kind);

        assert!(!cache.exists(&key));
        cache.store(&key, Blob::from(bytes)).await.unwrap();
        assert!(cache.exists(&key));
        assert_eq!(cache.load(&key).await.unwrap().as_bytes(), bytes);
    }
}

#[tokio::test]
async fn test_store_overwrites() {
    let temp = TempDir::new().unwrap();
    let cache = open(&temp, MediaKind::Video).await;
    let key = CacheKey::new("bar.mp4").unwrap();

    cache.store(&key, Blob::from(b"old".to_vec())).await.unwrap();
    cache.store(&key, Blob::from(b"new".to_vec())).await.unwrap();

    assert_eq!(cache.load(&key).await.unwrap().as_bytes(), b"new");

    // A cold instance sees the same bytes on disk
    let cold = open(&temp, MediaKind::Video).await;
    assert_eq!(cold.load(&key).await.unwrap().as_bytes(), b"new");
}

#[tokio::test]
async fn test_entries_survive_memory_eviction() {
    let temp = TempDir::new().unwrap();
    let cache = ContentCache::open(temp.path(), MediaKind::Image, MemoryLimits::new(2, 1024))
        .await
        .unwrap();

    let keys: Vec<CacheKey> = (0..10)
        .map(|i| CacheKey::new(format!("item-{}.jpg", i)).unwrap())
        .collect();

    for (i, key) in keys.iter().enumerate() {
        cache.store(key, Blob::from(vec![i as u8; 100])).await.unwrap();
    }

    let stats = cache.stats().await.unwrap();
    assert!(stats.memory_entries <= 2);
    assert_eq!(stats.disk.files, 10);

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(cache.load(key).await.unwrap().as_bytes(), vec![i as u8; 100].as_slice());
    }
}

#[tokio::test]
async fn test_clear_removes_everything() {
    let temp = TempDir::new().unwrap();
    let cache = open(&temp, MediaKind::Audio).await;

    for name in ["one.m4a", "two.m4a", "three.m4a"] {
        let key = CacheKey::new(name).unwrap();
        cache.store(&key, Blob::from(b"x".to_vec())).await.unwrap();
    }

    let report = cache.clear().await;
    assert_eq!(report.removed, 3);
    assert_eq!(report.failed, 0);

    for name in ["one.m4a", "two.m4a", "three.m4a"] {
        let key = CacheKey::new(name).unwrap();
        assert!(!cache.exists(&key));
        assert!(cache.load(&key).await.is_none());
    }

    // Namespace stays usable after a clear
    let key = CacheKey::new("four.m4a").unwrap();
    cache.store(&key, Blob::from(b"y".to_vec())).await.unwrap();
    assert!(cache.exists(&key));
}
