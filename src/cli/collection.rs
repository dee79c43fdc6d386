//! Collection CLI subcommands.
//!
//! Each command loads the user's collection, applies one change, and waits
//! for the remote push to settle before printing the resulting list.

use anyhow::{Context, Result};
use clap::Subcommand;
use uuid::Uuid;

use super::services;
use crate::collection::CollectionSyncEngine;
use crate::domain::PersonalCollectionItem;

/// Collection-related subcommands
#[derive(Subcommand, Debug)]
pub enum CollectionCommands {
    /// List the user's collection
    List {
        /// User ID
        #[arg(short, long)]
        user: String,
    },

    /// Add an artifact
    Add {
        #[arg(short, long)]
        user: String,

        /// Artifact ID
        artifact_id: Uuid,
    },

    /// Remove an artifact
    Remove {
        #[arg(short, long)]
        user: String,

        /// Artifact ID
        artifact_id: Uuid,
    },

    /// Toggle the favorite flag of an artifact
    Favorite {
        #[arg(short, long)]
        user: String,

        /// Artifact ID
        artifact_id: Uuid,
    },
}

/// Execute collection subcommands
pub async fn execute(command: CollectionCommands) -> Result<()> {
    match command {
        CollectionCommands::List { user } => {
            let engine = open(&user).await?;
            print_items(&engine);
            Ok(())
        }
        CollectionCommands::Add { user, artifact_id } => {
            let engine = open(&user).await?;
            engine
                .add(PersonalCollectionItem::new(artifact_id))
                .wait()
                .await
                .with_context(|| format!("Failed to add {}", artifact_id))?;
            print_items(&engine);
            Ok(())
        }
        CollectionCommands::Remove { user, artifact_id } => {
            let engine = open(&user).await?;
            if !engine.is_in_collection(artifact_id) {
                println!("{} is not in the collection", artifact_id);
                return Ok(());
            }
            engine
                .remove(artifact_id)
                .wait()
                .await
                .with_context(|| format!("Failed to remove {}", artifact_id))?;
            print_items(&engine);
            Ok(())
        }
        CollectionCommands::Favorite { user, artifact_id } => {
            let engine = open(&user).await?;
            if !engine.is_in_collection(artifact_id) {
                anyhow::bail!("{} is not in the collection", artifact_id);
            }
            engine
                .toggle_favorite(artifact_id)
                .wait()
                .await
                .with_context(|| format!("Failed to update {}", artifact_id))?;
            print_items(&engine);
            Ok(())
        }
    }
}

/// Build the engine and load the user's collection
async fn open(user: &str) -> Result<CollectionSyncEngine> {
    let (_, services) = services().await?;
    let engine = services.collections()?;

    engine
        .load(user)
        .await
        .with_context(|| format!("Failed to load collection for {}", user))?;

    Ok(engine)
}

fn print_items(engine: &CollectionSyncEngine) {
    let items = engine.items();

    if items.is_empty() {
        println!("Collection is empty");
        return;
    }

    println!("{:<38} {:<8}", "ARTIFACT ID", "FAVORITE");
    println!("{}", "-".repeat(47));
    for item in items {
        println!(
            "{:<38} {:<8}",
            item.artifact_id,
            if item.is_favorite { "*" } else { "" }
        );
    }
}
