//! Observable preload state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Share of the progress bar reached once the artifact catalog is loaded
pub const ARTIFACTS_WEIGHT: f64 = 0.3;

/// Share of the progress bar reached once both catalogs are loaded.
/// The media phase fills the rest, evenly per item.
pub const CATALOG_WEIGHT: f64 = 0.5;

/// Phase of a preload run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreloadPhase {
    /// No run started yet
    Idle,

    /// Fetching artifact and exhibition catalogs
    LoadingCatalog,

    /// Downloading referenced media
    LoadingMedia,

    /// Run finished
    Complete,

    /// Run aborted; the next call starts over
    Failed,
}

impl PreloadPhase {
    /// Whether a run is in progress
    pub fn is_loading(&self) -> bool {
        matches!(self, PreloadPhase::LoadingCatalog | PreloadPhase::LoadingMedia)
    }
}

/// Snapshot published to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadStatus {
    pub phase: PreloadPhase,

    /// Fraction in [0, 1], non-decreasing within a run
    pub progress: f64,

    /// Message of the error that aborted the run
    pub error: Option<String>,

    /// Media items enumerated for this run
    pub media_total: usize,

    /// Media items finished (cached, already present, or skipped)
    pub media_done: usize,

    /// When the run reached a terminal phase
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for PreloadStatus {
    fn default() -> Self {
        Self {
            phase: PreloadPhase::Idle,
            progress: 0.0,
            error: None,
            media_total: 0,
            media_done: 0,
            finished_at: None,
        }
    }
}

impl PreloadStatus {
    /// Raise progress to `value`, never lowering it
    pub(crate) fn advance(&mut self, value: f64) {
        let value = value.clamp(0.0, 1.0);
        if value > self.progress {
            self.progress = value;
        }
    }

    /// Progress after `done` of `total` media items
    pub fn media_progress(done: usize, total: usize) -> f64 {
        if total == 0 {
            return 1.0;
        }
        CATALOG_WEIGHT + (1.0 - CATALOG_WEIGHT) * (done as f64 / total as f64)
    }
}

/// Per-run media summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Media items enumerated
    pub total: usize,

    /// Downloaded and stored during this run
    pub downloaded: usize,

    /// Already cached before the run reached them
    pub already_cached: usize,

    /// Skipped after a download failure
    pub failed: usize,
}
