//! Post aggregate model.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::author::Author;
use crate::comment::Comment;
use crate::media::MediaLocator;

/// Store-assigned key of a persisted post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Current instant truncated to millisecond precision, the precision the wire
/// timestamps carry. Stamping at wire precision keeps persisted records equal
/// to their in-memory originals.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// A post with its embedded comment sequence.
///
/// `id` is absent until the first successful persistence assigns one; after
/// that it never changes. The whole aggregate (post fields plus comments) is
/// persisted as a single document.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Store-assigned key; `None` until first persisted
    pub id: Option<PostId>,

    /// Post title
    pub title: String,

    /// Locator of the uploaded media blob
    pub media_locator: MediaLocator,

    /// Optional display aspect ratio
    pub ratio: Option<f64>,

    pub author: Author,

    /// Creation instant
    pub timestamp: DateTime<Utc>,

    /// Embedded comments, append-only, in attachment order
    pub comments: Vec<Comment>,
}

impl Post {
    /// Create a new unpersisted post stamped now, with no comments.
    pub fn new(
        title: impl Into<String>,
        media_locator: MediaLocator,
        ratio: Option<f64>,
        author: Author,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            media_locator,
            ratio,
            author,
            timestamp: now_millis(),
            comments: Vec::new(),
        }
    }

    /// Whether this post has been persisted at least once.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Sort posts by descending timestamp (newest first), the display order of
/// the timeline.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
