//! Content preloading at application start.
//!
//! A run loads the artifact and exhibition catalogs, enumerates every media
//! item they reference, and pulls each one into the cache. Catalog failures
//! abort the run; media failures only skip the item, which is fetched
//! lazily the next time a view asks for it.

pub mod status;

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::backend::{BackendError, ContentStore};
use crate::domain::{Catalog, MediaRequest};
use crate::download::Downloaders;

pub use status::{PreloadPhase, PreloadReport, PreloadStatus, ARTIFACTS_WEIGHT, CATALOG_WEIGHT};

/// Errors that abort a preload run
#[derive(Debug, Clone, Error)]
pub enum PreloadError {
    #[error("Failed to load artifacts: {0}")]
    Artifacts(#[source] BackendError),

    #[error("Failed to load exhibitions: {0}")]
    Exhibitions(#[source] BackendError),
}

/// Catalog plus per-part loaded flags
#[derive(Debug, Default)]
struct CatalogState {
    catalog: Catalog,
    artifacts_loaded: bool,
    exhibitions_loaded: bool,
}

/// Outcome of preloading one media item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaOutcome {
    Downloaded,
    AlreadyCached,
    Failed,
}

/// Drives catalog loading and media preloading
pub struct PreloadOrchestrator {
    store: Arc<dyn ContentStore>,
    downloaders: Downloaders,
    state: RwLock<CatalogState>,
    status: watch::Sender<PreloadStatus>,
    /// Serializes runs
    run_lock: Mutex<()>,
}

impl PreloadOrchestrator {
    /// Create an orchestrator over a content store and the media downloaders
    pub fn new(store: Arc<dyn ContentStore>, downloaders: Downloaders) -> Self {
        let (status, _) = watch::channel(PreloadStatus::default());

        Self {
            store,
            downloaders,
            state: RwLock::new(CatalogState::default()),
            status,
            run_lock: Mutex::new(()),
        }
    }

    /// Subscribe to status updates
    pub fn subscribe(&self) -> watch::Receiver<PreloadStatus> {
        self.status.subscribe()
    }

    /// Current status snapshot
    pub fn status(&self) -> PreloadStatus {
        self.status.borrow().clone()
    }

    /// Current progress fraction
    pub fn progress(&self) -> f64 {
        self.status.borrow().progress
    }

    /// Error of the last failed run
    pub fn error(&self) -> Option<String> {
        self.status.borrow().error.clone()
    }

    /// Snapshot of the loaded catalog
    pub fn catalog(&self) -> Catalog {
        self.state.read().catalog.clone()
    }

    /// Forget the loaded catalog so the next run fetches it again
    pub fn invalidate_catalog(&self) {
        *self.state.write() = CatalogState::default();
        debug!("Catalog invalidated");
    }

    /// Load catalogs, then preload every referenced media item.
    ///
    /// Catalog parts already loaded by an earlier run are not fetched again.
    #[instrument(skip(self), fields(store = %self.store.name()))]
    pub async fn preload_all(&self) -> Result<PreloadReport, PreloadError> {
        let _run = self.run_lock.lock().await;

        info!("Starting content preload");
        self.status.send_replace(PreloadStatus {
            phase: PreloadPhase::LoadingCatalog,
            ..PreloadStatus::default()
        });

        if let Err(e) = self.load_catalog().await {
            self.fail_run(&e);
            return Err(e);
        }

        let requests = self.state.read().catalog.media_requests();
        self.status.send_modify(|s| {
            s.phase = PreloadPhase::LoadingMedia;
            s.media_total = requests.len();
        });

        let report = self.preload_media(requests).await;
        self.complete_run(&report);

        Ok(report)
    }

    /// Fetch whichever catalog parts are not loaded yet
    async fn load_catalog(&self) -> Result<(), PreloadError> {
        let artifacts_loaded = self.state.read().artifacts_loaded;
        if artifacts_loaded {
            debug!("Artifacts already loaded");
        } else {
            let artifacts = self
                .store
                .fetch_all_artifacts()
                .await
                .map_err(PreloadError::Artifacts)?;
            info!(count = artifacts.len(), "Artifacts loaded");

            let mut state = self.state.write();
            state.catalog.artifacts = artifacts;
            state.artifacts_loaded = true;
        }
        self.status.send_modify(|s| s.advance(ARTIFACTS_WEIGHT));

        let exhibitions_loaded = self.state.read().exhibitions_loaded;
        if exhibitions_loaded {
            debug!("Exhibitions already loaded");
        } else {
            let exhibitions = self
                .store
                .fetch_exhibition_data()
                .await
                .map_err(PreloadError::Exhibitions)?;
            info!(count = exhibitions.len(), "Exhibitions loaded");

            let mut state = self.state.write();
            state.catalog.exhibitions = exhibitions;
            state.exhibitions_loaded = true;
        }
        self.status.send_modify(|s| s.advance(CATALOG_WEIGHT));

        Ok(())
    }

    /// Preload all media concurrently, advancing progress per finished item
    async fn preload_media(&self, requests: Vec<MediaRequest>) -> PreloadReport {
        let mut report = PreloadReport {
            total: requests.len(),
            ..PreloadReport::default()
        };

        info!(count = report.total, "Preloading media");

        let mut pending: FuturesUnordered<_> = requests
            .iter()
            .map(|request| self.preload_one(request))
            .collect();

        let mut done = 0;
        while let Some(outcome) = pending.next().await {
            done += 1;
            match outcome {
                MediaOutcome::Downloaded => report.downloaded += 1,
                MediaOutcome::AlreadyCached => report.already_cached += 1,
                MediaOutcome::Failed => report.failed += 1,
            }

            let progress = PreloadStatus::media_progress(done, report.total);
            self.status.send_modify(|s| {
                s.media_done = done;
                s.advance(progress);
            });
        }

        report
    }

    async fn preload_one(&self, request: &MediaRequest) -> MediaOutcome {
        let downloader = self.downloaders.get(request.kind);

        if downloader.cache().exists(&request.key) {
            return MediaOutcome::AlreadyCached;
        }

        match downloader.cache_media(&request.url, &request.key).await {
            Ok(()) => MediaOutcome::Downloaded,
            Err(e) => {
                warn!(key = %request.key, url = %request.url, error = %e, "Skipping media item");
                MediaOutcome::Failed
            }
        }
    }

    /// Record an aborted run
    fn fail_run(&self, err: &PreloadError) {
        error!(error = %err, "Preload failed");

        self.status.send_modify(|s| {
            s.phase = PreloadPhase::Failed;
            s.error = Some(err.to_string());
            s.finished_at = Some(Utc::now());
        });
    }

    /// Record a finished run
    fn complete_run(&self, report: &PreloadReport) {
        info!(
            total = report.total,
            downloaded = report.downloaded,
            already_cached = report.already_cached,
            failed = report.failed,
            "Content preload complete"
        );

        self.status.send_modify(|s| {
            s.phase = PreloadPhase::Complete;
            s.advance(1.0);
            s.finished_at = Some(Utc::now());
        });
    }
}
