//! Command-line interface for lcva.
//!
//! Provides commands for preloading content, inspecting and clearing the
//! media cache, fetching single media items, browsing the catalog, and
//! managing a user's personal collection.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use crate::app::Services;
use crate::cache::MediaKind;
use crate::config::{self, ResolvedConfig};
use crate::preload::{PreloadPhase, PreloadStatus};

pub mod cache;
pub mod collection;

/// lcva - Media caching and collection sync for the LCVA Portal
#[derive(Parser, Debug)]
#[command(name = "lcva")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the catalog and cache every referenced image
    Preload {
        /// Print progress updates while running
        #[arg(short, long)]
        progress: bool,
    },

    /// Inspect or clear the media cache
    Cache {
        #[command(subcommand)]
        command: cache::CacheCommands,
    },

    /// Download one media item into the cache
    Fetch {
        /// Source URL
        url: String,

        /// Cache namespace
        #[arg(short, long, value_enum, default_value = "image")]
        kind: KindArg,

        /// Cache key (derived from the URL if not specified)
        #[arg(long)]
        key: Option<String>,
    },

    /// Manage a user's personal collection
    Collection {
        #[command(subcommand)]
        command: collection::CollectionCommands,
    },

    /// List the remote catalog
    Catalog {
        /// Only show artifacts matching this title or artist
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of artifacts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Media kind for CLI (maps to MediaKind)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Artwork and exhibition images
    Image,

    /// Video clips
    Video,

    /// Audio guides
    Audio,
}

impl From<KindArg> for MediaKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Image => MediaKind::Image,
            KindArg::Video => MediaKind::Video,
            KindArg::Audio => MediaKind::Audio,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Preload { progress } => preload(progress).await,
            Commands::Cache { command } => cache::execute(command).await,
            Commands::Fetch { url, kind, key } => cache::execute_fetch(&url, kind, key).await,
            Commands::Collection { command } => collection::execute(command).await,
            Commands::Catalog { search, limit } => list_catalog(search, limit).await,
            Commands::Config => show_config(),
        }
    }
}

/// Resolve configuration and wire services
pub(crate) async fn services() -> Result<(&'static ResolvedConfig, Services)> {
    let cfg = config::config()?;
    let services = Services::open(cfg).await?;
    Ok((cfg, services))
}

fn print_status(status: &PreloadStatus) {
    match status.phase {
        PreloadPhase::LoadingMedia => eprintln!(
            "[{:>5.1}%] media {}/{}",
            status.progress * 100.0,
            status.media_done,
            status.media_total
        ),
        phase => eprintln!("[{:>5.1}%] {:?}", status.progress * 100.0, phase),
    }
}

/// Run a full preload
async fn preload(show_progress: bool) -> Result<()> {
    let (_, services) = services().await?;
    let preloader = services.preloader()?;

    let watcher = show_progress.then(|| {
        let mut rx = preloader.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let status = rx.borrow_and_update().clone();
                print_status(&status);
            }
        })
    });

    let result = preloader.preload_all().await;

    if let Some(watcher) = watcher {
        // Let the last update print before tearing down
        tokio::time::sleep(Duration::from_millis(20)).await;
        watcher.abort();
    }

    let report = result.context("Preload failed")?;

    println!("Preload complete");
    println!("  Media items:    {}", report.total);
    println!("  Downloaded:     {}", report.downloaded);
    println!("  Already cached: {}", report.already_cached);
    println!("  Failed:         {}", report.failed);

    Ok(())
}

/// Print the catalog
async fn list_catalog(search: Option<String>, limit: usize) -> Result<()> {
    let (_, services) = services().await?;
    let store = services.store()?;

    let artifacts = store
        .fetch_all_artifacts()
        .await
        .context("Failed to fetch artifacts")?;
    let exhibitions = store
        .fetch_exhibition_data()
        .await
        .context("Failed to fetch exhibitions")?;
    debug!(artifacts = artifacts.len(), exhibitions = exhibitions.len(), "Catalog fetched");

    let catalog = crate::domain::Catalog {
        artifacts,
        exhibitions,
    };

    let shown = match search.as_deref() {
        Some(query) => catalog.search(query),
        None => catalog.artifacts.iter().collect(),
    };

    if shown.is_empty() {
        println!("No artifacts found");
    } else {
        println!("{:<38} {:<32} {:<24}", "ARTIFACT ID", "TITLE", "ARTIST");
        println!("{}", "-".repeat(94));

        for artifact in shown.iter().take(limit) {
            println!(
                "{:<38} {:<32} {:<24}",
                artifact.id,
                truncate(&artifact.title, 30),
                truncate(&artifact.artist, 22)
            );
        }

        if shown.len() > limit {
            println!("... and {} more", shown.len() - limit);
        }
    }

    println!();
    println!(
        "Exhibitions: {} current, {} past",
        catalog.current_exhibitions().len(),
        catalog.past_exhibitions().len()
    );

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("LCVA Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:       {}", cfg.home.display());
    println!("  Cache root: {}", cfg.cache_root.display());
    for kind in MediaKind::ALL {
        println!("  {:<10}  {}", format!("{}:", kind), cfg.cache_dir(kind).display());
    }
    println!();
    println!("Backend:");
    println!(
        "  URL:      {}",
        cfg.backend.url.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "  Anon key: {}",
        if cfg.backend.anon_key.is_some() { "(set)" } else { "(not configured)" }
    );
    println!("  Timeout:  {}s", cfg.backend.timeout_seconds);
    println!();
    println!("Memory tiers:");
    for kind in MediaKind::ALL {
        let limits = cfg.memory_limits(kind);
        println!(
            "  {:<6} {} entries, {} bytes",
            kind.to_string(),
            limits.max_entries,
            limits.max_bytes
        );
    }

    Ok(())
}

/// Truncate for table output
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long title indeed", 10), "a very ...");
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "lcva",
            "fetch",
            "https://example.org/bar.mp4",
            "--kind",
            "video",
        ])
        .unwrap();

        match cli.command {
            Commands::Fetch { url, kind, key } => {
                assert_eq!(url, "https://example.org/bar.mp4");
                assert_eq!(MediaKind::from(kind), MediaKind::Video);
                assert!(key.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_collection_add() {
        let cli = Cli::try_parse_from([
            "lcva",
            "collection",
            "add",
            "--user",
            "u1",
            "11111111-1111-1111-1111-111111111111",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Commands::Collection {
                command: collection::CollectionCommands::Add { .. }
            }
        ));
    }
}
