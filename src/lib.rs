//! lcva - Media caching and collection sync for the LCVA Portal
//!
//! The offline-first core behind the museum guide: a multi-tier media
//! cache, deduplicated downloads, catalog preloading with observable
//! progress, and a personal collection kept in sync with the content store
//! through optimistic updates.
//!
//! # Architecture
//!
//! - Disk is the source of truth for cached media; memory is a bounded view
//! - At most one download is in flight per cache key
//! - Local collection changes apply immediately and roll back when the
//!   remote store rejects them
//!
//! # Modules
//!
//! - `cache`: Content-addressed disk + memory cache per media kind
//! - `download`: Deduplicating media downloader
//! - `backend`: Content store interface (Supabase)
//! - `preload`: Catalog and media preloading
//! - `collection`: Personal collection sync
//! - `domain`: Data structures (Artifact, Exhibition, Catalog)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Cache every catalog image
//! lcva preload --progress
//!
//! # Inspect the cache
//! lcva cache stats
//!
//! # Add an artifact to a user's collection
//! lcva collection add --user <uid> <artifact-id>
//! ```

pub mod app;
pub mod backend;
pub mod cache;
pub mod cli;
pub mod collection;
pub mod config;
pub mod domain;
pub mod download;
pub mod preload;

// Re-export commonly used types
pub use app::Services;
pub use backend::{BackendError, ContentStore, SupabaseClient, SupabaseConfig};
pub use cache::{Blob, CacheError, CacheKey, ContentCache, MediaCaches, MediaKind, MemoryLimits};
pub use collection::{CollectionSyncEngine, PendingSync, SyncError};
pub use domain::{Artifact, Catalog, Exhibition, ExhibitionData, PersonalCollectionItem};
pub use download::{DownloadError, Downloaders, HttpFetcher, MediaDownloader, MediaFetcher};
pub use preload::{PreloadError, PreloadOrchestrator, PreloadPhase, PreloadReport, PreloadStatus};
