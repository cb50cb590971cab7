//! Author identity attached to posts and comments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The author of a post or comment.
///
/// Immutable once created; captured from the active session at
/// post/comment-creation time. Serializes with the wire field names used by
/// the mobile clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Author {
    /// Stable user ID from the identity provider
    pub id: String,

    /// Human-readable display name
    #[serde(rename = "displayName")]
    pub display_name: String,
}

impl Author {
    /// Create a new author.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}
