//! Backend content store interface.
//!
//! The catalog and the personal collections live in a remote store that
//! this crate treats as an opaque request/response service. Everything that
//! talks to it goes through [`ContentStore`] so tests can substitute fakes.

pub mod supabase;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Artifact, ExhibitionData, UserCollection, UserCollectionArtifact};

pub use supabase::{SupabaseClient, SupabaseConfig};

/// Errors that can occur talking to the content store
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Invalid URL for {endpoint}: {message}")]
    InvalidUrl { endpoint: String, message: String },

    #[error("Request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("Request to {endpoint} failed with HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Failed to encode request for {endpoint}: {message}")]
    Encode { endpoint: String, message: String },
}

impl BackendError {
    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the payload could not be decoded
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Remote catalog and collection operations
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Human-readable store name
    fn name(&self) -> &str;

    /// Every artifact in the catalog
    async fn fetch_all_artifacts(&self) -> Result<Vec<Artifact>, BackendError>;

    /// Every exhibition with its joins
    async fn fetch_exhibition_data(&self) -> Result<Vec<ExhibitionData>, BackendError>;

    /// Collection containers owned by a user
    async fn fetch_user_collections(&self, user_id: &str)
        -> Result<Vec<UserCollection>, BackendError>;

    /// Create the user's collection container
    async fn create_user_collection(&self, user_id: &str) -> Result<UserCollection, BackendError>;

    /// Members of a collection container
    async fn fetch_collection_artifacts(
        &self,
        collection_id: Uuid,
    ) -> Result<Vec<UserCollectionArtifact>, BackendError>;

    async fn add_artifact_to_collection(
        &self,
        artifact_id: Uuid,
        collection_id: Uuid,
    ) -> Result<(), BackendError>;

    async fn remove_artifact_from_collection(
        &self,
        artifact_id: Uuid,
        collection_id: Uuid,
    ) -> Result<(), BackendError>;

    /// Set the favorite flag on a member
    async fn set_favorite(
        &self,
        artifact_id: Uuid,
        collection_id: Uuid,
        is_favorite: bool,
    ) -> Result<(), BackendError>;
}
