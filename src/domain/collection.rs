//! Personal collection records.
//!
//! The backing store keeps one `user_collections` row per collection
//! container and one `user_collection_artifacts` row per member. The sync
//! engine only tracks members as [`PersonalCollectionItem`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default name given to a container created on first load
pub const DEFAULT_COLLECTION_NAME: &str = "My Collection";

/// A collection container owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCollection {
    pub id: Uuid,

    /// Owner (authentication uid)
    pub user_id: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A member row of a collection container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCollectionArtifact {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub artifact_id: Uuid,

    #[serde(default)]
    pub is_favorite: bool,
}

/// A reference to an art piece in the user's locally held collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonalCollectionItem {
    /// Art piece identifier
    pub artifact_id: Uuid,

    /// Marked as favorite by the user
    pub is_favorite: bool,
}

impl PersonalCollectionItem {
    /// Create a non-favorite item
    pub fn new(artifact_id: Uuid) -> Self {
        Self {
            artifact_id,
            is_favorite: false,
        }
    }

    /// Set the favorite flag
    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }
}

impl From<&UserCollectionArtifact> for PersonalCollectionItem {
    fn from(row: &UserCollectionArtifact) -> Self {
        Self {
            artifact_id: row.artifact_id,
            is_favorite: row.is_favorite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_row_to_item() {
        let row = UserCollectionArtifact {
            id: Uuid::new_v4(),
            collection_id: Uuid::new_v4(),
            artifact_id: Uuid::new_v4(),
            is_favorite: true,
        };

        let item = PersonalCollectionItem::from(&row);
        assert_eq!(item.artifact_id, row.artifact_id);
        assert!(item.is_favorite);
    }

    #[test]
    fn test_member_row_favorite_defaults_false() {
        let json = r#"{
            "id": "11111111-1111-1111-1111-111111111111",
            "collection_id": "22222222-2222-2222-2222-222222222222",
            "artifact_id": "33333333-3333-3333-3333-333333333333"
        }"#;

        let row: UserCollectionArtifact = serde_json::from_str(json).unwrap();
        assert!(!row.is_favorite);
    }
}
