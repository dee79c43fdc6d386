//! In-memory catalog of artifacts and exhibitions.
//!
//! Filled by the preloader and queried by the presentation layer. Also
//! knows which media each catalog item references and under which derived
//! cache keys that media is stored.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::artifact::Artifact;
use super::exhibition::{Exhibition, ExhibitionData};
use crate::cache::{CacheKey, MediaKind, Variant};

/// Variants cached for every artifact image
pub const ARTIFACT_IMAGE_VARIANTS: [Variant; 2] = [Variant::Grid, Variant::List];

/// Variants cached for every exhibition image
pub const EXHIBITION_IMAGE_VARIANTS: [Variant; 1] = [Variant::Thumb];

/// Snapshot of the remote catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// All artifacts
    pub artifacts: Vec<Artifact>,

    /// All exhibitions with their joins
    pub exhibitions: Vec<ExhibitionData>,
}

/// One media item to cache: a source URL and the slot it lands in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    /// Remote source
    pub url: String,

    /// Derived cache slot
    pub key: CacheKey,

    /// Which cache namespace the slot belongs to
    pub kind: MediaKind,
}

impl Catalog {
    /// Get an artifact by ID
    pub fn artifact(&self, id: Uuid) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.id == id)
    }

    /// Featured artifacts
    pub fn featured_artifacts(&self) -> Vec<&Artifact> {
        self.artifacts.iter().filter(|a| a.featured).collect()
    }

    /// Artifacts currently on display
    pub fn on_display_artifacts(&self) -> Vec<&Artifact> {
        self.artifacts.iter().filter(|a| a.on_display).collect()
    }

    /// Artifacts belonging to a museum collection (case-insensitive)
    pub fn artifacts_in_collection(&self, collection_name: &str) -> Vec<&Artifact> {
        let wanted = collection_name.to_lowercase();

        self.artifacts
            .iter()
            .filter(|a| {
                a.collection
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase() == wanted)
            })
            .collect()
    }

    /// Search artifacts by title or artist (case-insensitive substring match)
    pub fn search(&self, query: &str) -> Vec<&Artifact> {
        let query_lower = query.to_lowercase();

        self.artifacts
            .iter()
            .filter(|a| {
                a.title.to_lowercase().contains(&query_lower)
                    || a.artist.to_lowercase().contains(&query_lower)
            })
            .collect()
    }

    /// Exhibitions running now
    pub fn current_exhibitions(&self) -> Vec<&Exhibition> {
        self.exhibitions
            .iter()
            .map(|d| &d.exhibitions)
            .filter(|e| e.current)
            .collect()
    }

    /// Exhibitions already closed
    pub fn past_exhibitions(&self) -> Vec<&Exhibition> {
        self.exhibitions
            .iter()
            .map(|d| &d.exhibitions)
            .filter(|e| e.past)
            .collect()
    }

    /// Artist names linked to an exhibition
    pub fn artists_for_exhibition(&self, exhibition_id: Uuid) -> Vec<&str> {
        self.exhibitions
            .iter()
            .filter(|d| d.id() == exhibition_id)
            .filter_map(|d| d.exhibition_artists.as_ref())
            .map(|a| a.artist_name.as_str())
            .collect()
    }

    /// The artifact representing an exhibition, if linked
    pub fn artifact_id_for_exhibition(&self, exhibition_id: Uuid) -> Option<Uuid> {
        self.exhibitions
            .iter()
            .find(|d| d.id() == exhibition_id)?
            .exhibition_artifacts
            .as_ref()
            .map(|j| j.artifact_id)
    }

    /// Whether artifacts have been loaded
    pub fn has_artifacts(&self) -> bool {
        !self.artifacts.is_empty()
    }

    /// Enumerate every media item the catalog references.
    ///
    /// Each source URL yields one request per size variant; the variants get
    /// distinct keys and are cached independently.
    pub fn media_requests(&self) -> Vec<MediaRequest> {
        let mut requests = Vec::new();

        for artifact in &self.artifacts {
            if let Some(url) = artifact.image_url.as_deref() {
                push_variants(&mut requests, url, artifact.id, &ARTIFACT_IMAGE_VARIANTS);
            }
        }

        for data in &self.exhibitions {
            if let Some(url) = data.exhibitions.image_url.as_deref() {
                push_variants(&mut requests, url, data.id(), &EXHIBITION_IMAGE_VARIANTS);
            }
        }

        requests
    }
}

fn push_variants(requests: &mut Vec<MediaRequest>, url: &str, id: Uuid, variants: &[Variant]) {
    let kind = MediaKind::Image;

    for variant in variants {
        match CacheKey::derive(id, *variant, kind.default_extension()) {
            Ok(key) => requests.push(MediaRequest {
                url: url.to_string(),
                key,
                kind,
            }),
            Err(e) => warn!(%id, %variant, error = %e, "Skipping media with underivable key"),
        }
    }
}
