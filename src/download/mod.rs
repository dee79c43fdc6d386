//! Media downloads with per-key deduplication.
//!
//! At most one download is in flight per cache key. Later callers for the
//! same key attach to the running download and receive its result. The
//! registry entry is cleared only after the blob has been stored, so a
//! waiter that resumes sees a cache hit.

pub mod fetcher;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::cache::{Blob, CacheKey, ContentCache, MediaCaches, MediaKind};

pub use fetcher::{HttpFetcher, MediaFetcher};

/// Errors that can occur while downloading media.
///
/// Clonable because one outcome is handed to every attached caller.
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    #[error("Invalid URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to cache {key}: {message}")]
    Storage { key: String, message: String },
}

impl DownloadError {
    pub(crate) fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

type SharedDownload = Shared<BoxFuture<'static, Result<(), DownloadError>>>;

/// Registry entry for a running download
struct InFlight {
    /// Distinguishes successive downloads of the same key
    id: u64,
    download: SharedDownload,
}

/// Downloads media into one cache namespace
pub struct MediaDownloader {
    fetcher: Arc<dyn MediaFetcher>,
    cache: Arc<ContentCache>,
    in_flight: DashMap<CacheKey, InFlight>,
    next_id: AtomicU64,
}

impl MediaDownloader {
    /// Create a downloader feeding `cache`
    pub fn new(fetcher: Arc<dyn MediaFetcher>, cache: Arc<ContentCache>) -> Self {
        Self {
            fetcher,
            cache,
            in_flight: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// The namespace this downloader fills
    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Number of downloads currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Plain network GET, bypassing the cache
    pub async fn fetch(&self, url: &str) -> Result<Blob, DownloadError> {
        self.fetcher.fetch(url).await
    }

    /// Ensure `key` is cached, downloading `url` on a miss.
    ///
    /// Concurrent calls for the same key share a single request.
    #[instrument(skip(self, url), fields(kind = %self.cache.kind(), key = %key))]
    pub async fn cache_media(&self, url: &str, key: &CacheKey) -> Result<(), DownloadError> {
        if self.cache.exists(key) {
            debug!("Already cached");
            return Ok(());
        }

        let Some((id, download)) = self.join_or_start(url, key) else {
            return Ok(());
        };

        let result = download.await;

        // Whoever finishes first clears the entry; a newer download for the
        // same key carries a different id and is left alone.
        self.in_flight.remove_if(key, |_, entry| entry.id == id);

        result
    }

    /// Load `key`, downloading it first on a miss
    pub async fn get_or_fetch(&self, url: &str, key: &CacheKey) -> Result<Blob, DownloadError> {
        if let Some(blob) = self.cache.load(key).await {
            return Ok(blob);
        }

        self.cache_media(url, key).await?;

        self.cache.load(key).await.ok_or_else(|| DownloadError::Storage {
            key: key.to_string(),
            message: "entry missing after store".to_string(),
        })
    }

    /// Attach to the running download for `key` or start a new one.
    /// Returns `None` when the key turned out to be cached already.
    fn join_or_start(&self, url: &str, key: &CacheKey) -> Option<(u64, SharedDownload)> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!("Attaching to in-flight download");
                let running = entry.get();
                Some((running.id, running.download.clone()))
            }
            Entry::Vacant(entry) => {
                // A download that finished since the first check has already
                // stored its blob before leaving the registry.
                if self.cache.exists(key) {
                    return None;
                }

                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let download = Self::download(
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.cache),
                    url.to_string(),
                    key.clone(),
                )
                .boxed()
                .shared();

                entry.insert(InFlight {
                    id,
                    download: download.clone(),
                });
                Some((id, download))
            }
        }
    }

    async fn download(
        fetcher: Arc<dyn MediaFetcher>,
        cache: Arc<ContentCache>,
        url: String,
        key: CacheKey,
    ) -> Result<(), DownloadError> {
        let blob = fetcher.fetch(&url).await?;
        let bytes = blob.len();

        cache
            .store(&key, blob)
            .await
            .map_err(|e| DownloadError::Storage {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        info!(kind = %cache.kind(), %key, bytes, "Media cached");
        Ok(())
    }
}

/// One downloader per media namespace
#[derive(Clone)]
pub struct Downloaders {
    pub image: Arc<MediaDownloader>,
    pub video: Arc<MediaDownloader>,
    pub audio: Arc<MediaDownloader>,
}

impl Downloaders {
    /// Wire a downloader to each namespace, sharing one fetcher
    pub fn new(fetcher: Arc<dyn MediaFetcher>, caches: &MediaCaches) -> Self {
        let make = |kind: MediaKind| {
            Arc::new(MediaDownloader::new(
                Arc::clone(&fetcher),
                Arc::clone(caches.get(kind)),
            ))
        };

        Self {
            image: make(MediaKind::Image),
            video: make(MediaKind::Video),
            audio: make(MediaKind::Audio),
        }
    }

    /// The downloader for a kind
    pub fn get(&self, kind: MediaKind) -> &Arc<MediaDownloader> {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    pub async fn cache_image(&self, url: &str, key: &CacheKey) -> Result<(), DownloadError> {
        self.image.cache_media(url, key).await
    }

    pub async fn cache_video(&self, url: &str, key: &CacheKey) -> Result<(), DownloadError> {
        self.video.cache_media(url, key).await
    }

    pub async fn cache_audio(&self, url: &str, key: &CacheKey) -> Result<(), DownloadError> {
        self.audio.cache_media(url, key).await
    }

    /// Audio addressed by its URL's filename
    pub async fn audio_for(&self, url: &str) -> Result<Blob, DownloadError> {
        let key = CacheKey::from_url(url, MediaKind::Audio);
        self.audio.get_or_fetch(url, &key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryLimits;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct FailingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaFetcher for FailingFetcher {
        async fn fetch(&self, url: &str) -> Result<Blob, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DownloadError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    #[tokio::test]
    async fn test_failure_clears_registry() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(
            ContentCache::open(temp.path(), MediaKind::Video, MemoryLimits::new(4, 1024))
                .await
                .unwrap(),
        );
        let fetcher = Arc::new(FailingFetcher {
            calls: AtomicUsize::new(0),
        });
        let downloader = MediaDownloader::new(fetcher.clone(), cache);
        let key = CacheKey::new("bar.mp4").unwrap();

        let err = downloader
            .cache_media("https://example.org/bar.mp4", &key)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Status { status: 404, .. }));
        assert_eq!(downloader.in_flight(), 0);

        // A failed download is retried on the next request
        let _ = downloader.cache_media("https://example.org/bar.mp4", &key).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
