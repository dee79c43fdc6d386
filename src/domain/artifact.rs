//! Catalog art pieces.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An art piece as returned by the `get_all_artifacts` RPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Stable identifier, also the stem of every derived cache key
    pub id: Uuid,

    /// Title of the piece
    pub title: String,

    /// Artist name as displayed
    pub artist: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Gallery the piece hangs in
    #[serde(default)]
    pub gallery: Option<String>,

    /// Name of the museum collection the piece belongs to
    #[serde(default)]
    pub collection: Option<String>,

    #[serde(default)]
    pub collection_id: Option<Uuid>,

    /// Remote image shown in grids, lists and detail views
    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    /// Currently on display in the museum
    pub on_display: bool,

    /// Highlighted on the home screen
    pub featured: bool,
}

impl Artifact {
    /// Create an artifact with only the required fields set
    pub fn new(id: Uuid, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            description: None,
            gallery: None,
            collection: None,
            collection_id: None,
            image_url: None,
            location: None,
            on_display: false,
            featured: false,
        }
    }

    /// Set the image URL
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Set the museum collection name
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Mark as featured
    pub fn featured(mut self) -> Self {
        self.featured = true;
        self
    }

    /// Mark as on display
    pub fn on_display(mut self) -> Self {
        self.on_display = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_missing_optionals() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "title": "Starry Kitty",
            "artist": "Nick Bruel",
            "on_display": true,
            "featured": false
        }"#;

        let artifact: Artifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.title, "Starry Kitty");
        assert!(artifact.image_url.is_none());
        assert!(artifact.on_display);
    }

    #[test]
    fn test_decode_rejects_missing_flags() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "title": "Untitled",
            "artist": "Unknown"
        }"#;

        assert!(serde_json::from_str::<Artifact>(json).is_err());
    }
}
