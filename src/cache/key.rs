//! Cache keys and derived filenames.
//!
//! A [`CacheKey`] addresses both the disk slot and the memory slot of one
//! cached blob. Keys are plain filenames inside a namespace directory, so
//! they must be a single path component. The dot prefix is reserved for
//! writes still in progress.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::CacheError;

/// Derived cache filename
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    /// Validate a filename as a cache key
    pub fn new(name: impl Into<String>) -> Result<Self, CacheError> {
        let name = name.into();

        if name.is_empty()
            || name.starts_with('.')
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(CacheError::InvalidKey(name));
        }

        Ok(Self(name))
    }

    /// Derive `{item_id}-{variant}.{ext}` for one size variant of an item
    pub fn derive(
        item_id: impl fmt::Display,
        variant: Variant,
        ext: &str,
    ) -> Result<Self, CacheError> {
        Self::new(format!("{}-{}.{}", item_id, variant, ext))
    }

    /// Derive a key from a media URL.
    ///
    /// Uses the last path segment when it is a usable filename with an
    /// extension, otherwise SHA256(url)[0:16] with the kind's extension.
    pub fn from_url(url: &str, kind: MediaKind) -> Self {
        let last_segment = reqwest::Url::parse(url).ok().and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        });

        if let Some(segment) = last_segment.filter(|s| s.contains('.')) {
            if let Ok(key) = Self::new(segment) {
                return key;
            }
        }

        Self::hashed(url, kind.default_extension())
    }

    /// Key from SHA256(source)[0:16] plus an extension
    pub fn hashed(source: &str, ext: &str) -> Self {
        let digest = Sha256::digest(source.as_bytes());
        Self(format!("{}.{}", hex::encode(&digest[..8]), ext))
    }

    /// Get the raw filename
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CacheKey {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Logical size variant of one source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Grid thumbnail
    Grid,

    /// List thumbnail
    List,

    /// Exhibition thumbnail
    Thumb,

    /// Full-size source
    Original,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Grid => "grid",
            Variant::List => "list",
            Variant::Thumb => "thumb",
            Variant::Original => "original",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "grid" => Ok(Variant::Grid),
            "list" => Ok(Variant::List),
            "thumb" | "thumbnail" => Ok(Variant::Thumb),
            "original" | "full" => Ok(Variant::Original),
            _ => anyhow::bail!("Unknown variant: {}", s),
        }
    }
}

/// Cache namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// All namespaces, in a stable order
    pub const ALL: [MediaKind; 3] = [MediaKind::Image, MediaKind::Video, MediaKind::Audio];

    /// Subdirectory under the cache root
    pub fn dir_name(&self) -> &'static str {
        match self {
            MediaKind::Image => "image_cache",
            MediaKind::Video => "video_cache",
            MediaKind::Audio => "audio_cache",
        }
    }

    /// Extension used when a key cannot be taken from the source
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "m4a",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "image" | "img" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            _ => anyhow::bail!("Unknown media kind: {}", s),
        }
    }
}
