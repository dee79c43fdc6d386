//! Composition root.
//!
//! Builds the caches, downloaders, content store client, preloader and
//! collection engine from a resolved configuration. Components receive
//! their collaborators here and never read configuration themselves.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::backend::{ContentStore, SupabaseClient};
use crate::cache::MediaCaches;
use crate::collection::CollectionSyncEngine;
use crate::config::ResolvedConfig;
use crate::download::{Downloaders, HttpFetcher, MediaFetcher};
use crate::preload::PreloadOrchestrator;

/// Shared service handles
pub struct Services {
    pub caches: MediaCaches,
    pub downloaders: Downloaders,
    /// Content store, or why it is unavailable
    store: Result<Arc<dyn ContentStore>, String>,
}

impl Services {
    /// Wire everything from configuration.
    ///
    /// Missing backend credentials are tolerated here; only operations that
    /// need the content store fail.
    pub async fn open(config: &ResolvedConfig) -> Result<Self> {
        let caches = MediaCaches::open(&config.cache_root, |kind| config.memory_limits(kind))
            .await
            .with_context(|| {
                format!("Failed to open cache at {}", config.cache_root.display())
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let store: Result<Arc<dyn ContentStore>, String> = match config.supabase() {
            Ok(supabase) => Ok(Arc::new(SupabaseClient::with_client(
                supabase.url,
                supabase.anon_key,
                client.clone(),
            ))),
            Err(e) => {
                warn!(error = %e, "Content store unavailable");
                Err(e.to_string())
            }
        };

        debug!(cache_root = %config.cache_root.display(), "Services ready");

        Ok(Self::assemble(
            caches,
            Arc::new(HttpFetcher::with_client(client)),
            store,
        ))
    }

    /// Wire explicit collaborators
    pub fn new(
        caches: MediaCaches,
        fetcher: Arc<dyn MediaFetcher>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self::assemble(caches, fetcher, Ok(store))
    }

    fn assemble(
        caches: MediaCaches,
        fetcher: Arc<dyn MediaFetcher>,
        store: Result<Arc<dyn ContentStore>, String>,
    ) -> Self {
        let downloaders = Downloaders::new(fetcher, &caches);

        Self {
            caches,
            downloaders,
            store,
        }
    }

    /// The content store client
    pub fn store(&self) -> Result<Arc<dyn ContentStore>> {
        self.store
            .as_ref()
            .map(Arc::clone)
            .map_err(|e| anyhow::anyhow!("{}", e))
    }

    /// A preloader over the content store and these downloaders
    pub fn preloader(&self) -> Result<PreloadOrchestrator> {
        Ok(PreloadOrchestrator::new(
            self.store()?,
            self.downloaders.clone(),
        ))
    }

    /// A collection engine over the content store
    pub fn collections(&self) -> Result<CollectionSyncEngine> {
        Ok(CollectionSyncEngine::new(self.store()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MediaKind;
    use crate::config::{BackendSettings, MemorySettings};
    use tempfile::TempDir;

    fn resolved(temp: &TempDir) -> ResolvedConfig {
        ResolvedConfig {
            home: temp.path().join("home"),
            cache_root: temp.path().join("cache"),
            config_file: None,
            backend: BackendSettings::default(),
            memory: MemorySettings::default(),
        }
    }

    #[tokio::test]
    async fn test_open_without_credentials() {
        let temp = TempDir::new().unwrap();
        let services = Services::open(&resolved(&temp)).await.unwrap();

        for kind in MediaKind::ALL {
            assert!(temp.path().join("cache").join(kind.dir_name()).is_dir());
        }

        let err = services.preloader().err().unwrap();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn test_open_with_credentials() {
        let temp = TempDir::new().unwrap();
        let mut config = resolved(&temp);
        config.backend.url = Some("https://abc.supabase.co".to_string());
        config.backend.anon_key = Some("KEY".to_string());

        let services = Services::open(&config).await.unwrap();
        assert_eq!(services.store().unwrap().name(), "supabase");
        assert!(services.collections().is_ok());
    }
}
