//! Exhibition rows and their join records.
//!
//! `get_exhibition_data` returns one [`ExhibitionData`] per exhibition, each
//! carrying the exhibition row plus optional artist and artifact joins.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the `get_exhibition_data` RPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhibitionData {
    /// The exhibition itself
    pub exhibitions: Exhibition,

    /// Link to the artifact representing this exhibition
    #[serde(default)]
    pub exhibition_artifacts: Option<ExhibitionArtifactJoin>,

    /// Link to the exhibiting artist
    #[serde(default)]
    pub exhibition_artists: Option<ExhibitionArtistJoin>,
}

impl ExhibitionData {
    /// Identifier of the wrapped exhibition
    pub fn id(&self) -> Uuid {
        self.exhibitions.id
    }
}

/// An exhibition record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exhibition {
    pub id: Uuid,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub start_date: Option<String>,

    #[serde(default)]
    pub end_date: Option<String>,

    /// Opening reception text
    #[serde(default)]
    pub reception: Option<String>,

    /// Closing text
    #[serde(default)]
    pub closing: Option<String>,

    /// Poster image, cached as the exhibition thumbnail
    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub survey_url: Option<String>,

    #[serde(default)]
    pub extra_link: Option<String>,

    /// Running now
    #[serde(default)]
    pub current: bool,

    /// Already closed
    #[serde(default)]
    pub past: bool,
}

impl Exhibition {
    /// Create an exhibition with only the required fields set
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            start_date: None,
            end_date: None,
            reception: None,
            closing: None,
            image_url: None,
            survey_url: None,
            extra_link: None,
            current: false,
            past: false,
        }
    }

    /// Set the poster image URL
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

/// Join row between an exhibition and an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhibitionArtifactJoin {
    pub id: Uuid,
    pub exhibition_id: Uuid,
    pub artifact_id: Uuid,
}

/// Join row between an exhibition and an artist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhibitionArtistJoin {
    pub id: Uuid,
    pub exhibition_id: Uuid,
    pub artist_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rpc_row() {
        let json = r#"{
            "exhibitions": {
                "id": "11111111-1111-1111-1111-111111111111",
                "name": "Letters from Farmville",
                "image_url": "https://example.org/letters.jpg",
                "current": true
            },
            "exhibition_artifacts": {
                "id": "22222222-2222-2222-2222-222222222222",
                "exhibition_id": "11111111-1111-1111-1111-111111111111",
                "artifact_id": "33333333-3333-3333-3333-333333333333"
            },
            "exhibition_artists": null
        }"#;

        let row: ExhibitionData = serde_json::from_str(json).unwrap();
        assert_eq!(row.exhibitions.name, "Letters from Farmville");
        assert!(row.exhibitions.current);
        assert!(!row.exhibitions.past);
        assert!(row.exhibition_artists.is_none());
        assert_eq!(row.id(), row.exhibitions.id);
    }
}
