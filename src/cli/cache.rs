//! Cache CLI subcommands.
//!
//! - `stats`: memory and disk occupancy per namespace
//! - `clear`: remove cached media
//! - `fetch` (top-level): download one item through the deduplicating path

use anyhow::{Context, Result};
use clap::Subcommand;

use super::{services, KindArg};
use crate::cache::{CacheKey, MediaKind};

/// Cache-related subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show memory and disk occupancy
    Stats,

    /// Remove cached media
    Clear {
        /// Only clear this namespace
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,
    },
}

/// Execute cache subcommands
pub async fn execute(command: CacheCommands) -> Result<()> {
    match command {
        CacheCommands::Stats => execute_stats().await,
        CacheCommands::Clear { kind } => execute_clear(kind).await,
    }
}

async fn execute_stats() -> Result<()> {
    let (cfg, services) = services().await?;

    println!("Cache root: {}", cfg.cache_root.display());
    println!();
    println!(
        "{:<8} {:>10} {:>14} {:>10} {:>14}",
        "KIND", "MEM ITEMS", "MEM WEIGHT", "FILES", "DISK BYTES"
    );
    println!("{}", "-".repeat(60));

    for kind in MediaKind::ALL {
        let stats = services
            .caches
            .get(kind)
            .stats()
            .await
            .with_context(|| format!("Failed to read {} cache", kind))?;

        println!(
            "{:<8} {:>10} {:>14} {:>10} {:>14}",
            kind.to_string(),
            stats.memory_entries,
            stats.memory_weight,
            stats.disk.files,
            stats.disk.bytes
        );
    }

    Ok(())
}

async fn execute_clear(kind: Option<KindArg>) -> Result<()> {
    let (_, services) = services().await?;

    let report = match kind {
        Some(kind) => services.caches.get(kind.into()).clear().await,
        None => services.caches.clear_all().await,
    };

    println!("Removed {} file(s)", report.removed);
    if report.failed > 0 {
        eprintln!("Warning: {} file(s) could not be removed", report.failed);
    }

    Ok(())
}

/// Download one media item into the cache
pub async fn execute_fetch(url: &str, kind: KindArg, key: Option<String>) -> Result<()> {
    let kind = MediaKind::from(kind);
    let key = match key {
        Some(key) => CacheKey::new(key)?,
        None => CacheKey::from_url(url, kind),
    };

    let (_, services) = services().await?;
    let downloader = services.downloaders.get(kind);

    let blob = downloader
        .get_or_fetch(url, &key)
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    println!(
        "Cached {} ({} bytes) at {}",
        key,
        blob.len(),
        downloader.cache().dir().join(key.as_str()).display()
    );

    Ok(())
}
