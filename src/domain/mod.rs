//! Domain types for the museum guide.
//!
//! This module contains the records exchanged with the content store:
//! - Artifacts: catalog art pieces
//! - Exhibitions: exhibition rows joined with their artists and artifacts
//! - Collections: a user's personal collection and its members
//! - Catalog: the in-memory snapshot the preloader fills

pub mod artifact;
pub mod catalog;
pub mod collection;
pub mod exhibition;

// Re-export commonly used types
pub use artifact::Artifact;
pub use catalog::{Catalog, MediaRequest};
pub use collection::{PersonalCollectionItem, UserCollection, UserCollectionArtifact};
pub use exhibition::{Exhibition, ExhibitionArtifactJoin, ExhibitionArtistJoin, ExhibitionData};
