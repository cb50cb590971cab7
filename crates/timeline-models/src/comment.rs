//! Comment model.

use chrono::{DateTime, Utc};

use crate::author::Author;
use crate::media::MediaLocator;
use crate::post::now_millis;

/// Body of a comment: textual or audio, never both, never neither.
#[derive(Debug, Clone, PartialEq)]
pub enum CommentBody {
    /// Plain text comment
    Text(String),
    /// Audio comment, referencing an uploaded blob
    Audio(MediaLocator),
}

/// A comment embedded in a post's comment sequence.
///
/// Comments are not separately addressable: they are persisted as part of the
/// owning post aggregate and are append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub body: CommentBody,
    pub author: Author,
    /// Creation instant
    pub timestamp: DateTime<Utc>,
}

impl Comment {
    /// Create a text comment stamped now.
    pub fn text(text: impl Into<String>, author: Author) -> Self {
        Self {
            body: CommentBody::Text(text.into()),
            author,
            timestamp: now_millis(),
        }
    }

    /// Create an audio comment stamped now.
    pub fn audio(locator: MediaLocator, author: Author) -> Self {
        Self {
            body: CommentBody::Audio(locator),
            author,
            timestamp: now_millis(),
        }
    }

    /// Text body, if this is a text comment.
    pub fn text_body(&self) -> Option<&str> {
        match &self.body {
            CommentBody::Text(t) => Some(t),
            CommentBody::Audio(_) => None,
        }
    }

    /// Audio locator, if this is an audio comment.
    pub fn audio_locator(&self) -> Option<&MediaLocator> {
        match &self.body {
            CommentBody::Text(_) => None,
            CommentBody::Audio(l) => Some(l),
        }
    }
}
