//! Media kind and locator types.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of media blob, selecting the storage namespace it is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Post images
    Image,
    /// Audio comments
    Audio,
}

impl MediaKind {
    /// Storage namespace (key prefix) for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }

    /// Content type uploaded alongside the payload.
    pub const fn content_type(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Audio => "audio/mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque reference (URL) to a stored media blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MediaLocator(pub String);

impl MediaLocator {
    /// Create from an existing URL string.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Get the inner URL string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MediaLocator {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MediaLocator {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
