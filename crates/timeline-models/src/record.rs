//! Wire record shapes for realtime database documents.
//!
//! A post document is a flat mapping keyed by the store-assigned post id.
//! Field names (`mediaURL`, `audioURL`, `displayName`) and the numeric epoch
//! timestamps are the wire contract shared with the mobile clients.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::author::Author;
use crate::comment::{Comment, CommentBody};
use crate::media::MediaLocator;
use crate::post::{Post, PostId};

/// Errors converting wire records to domain types.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Comment must have exactly one of text or audioURL")]
    InvalidComment,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wire shape of an embedded comment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(rename = "audioURL", default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    pub author: Author,

    /// Epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schemars(with = "i64")]
    pub timestamp: DateTime<Utc>,
}

impl CommentRecord {
    /// Convert to a domain comment, enforcing the exactly-one-body invariant.
    pub fn into_comment(self) -> Result<Comment, RecordError> {
        let body = match (self.text, self.audio_url) {
            (Some(text), None) => CommentBody::Text(text),
            (None, Some(url)) => CommentBody::Audio(MediaLocator::new(url)),
            _ => return Err(RecordError::InvalidComment),
        };

        Ok(Comment {
            body,
            author: self.author,
            timestamp: self.timestamp,
        })
    }
}

impl From<&Comment> for CommentRecord {
    fn from(comment: &Comment) -> Self {
        let (text, audio_url) = match &comment.body {
            CommentBody::Text(t) => (Some(t.clone()), None),
            CommentBody::Audio(l) => (None, Some(l.as_str().to_string())),
        };

        Self {
            text,
            audio_url,
            author: comment.author.clone(),
            timestamp: comment.timestamp,
        }
    }
}

/// Wire shape of a post document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostRecord {
    /// Present once the store has assigned a key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub title: String,

    #[serde(rename = "mediaURL")]
    pub media_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,

    /// Epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schemars(with = "i64")]
    pub timestamp: DateTime<Utc>,

    pub author: Author,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<CommentRecord>,
}

impl PostRecord {
    /// Convert to a domain post under the given store key.
    ///
    /// The mapping key is authoritative for the id; any `id` field inside the
    /// document body is ignored.
    pub fn into_post(self, key: PostId) -> Result<Post, RecordError> {
        let comments = self
            .comments
            .into_iter()
            .map(CommentRecord::into_comment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Post {
            id: Some(key),
            title: self.title,
            media_locator: MediaLocator::new(self.media_url),
            ratio: self.ratio,
            author: self.author,
            timestamp: self.timestamp,
            comments,
        })
    }
}

impl From<&Post> for PostRecord {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.as_ref().map(|id| id.as_str().to_string()),
            title: post.title.clone(),
            media_url: post.media_locator.as_str().to_string(),
            ratio: post.ratio,
            timestamp: post.timestamp,
            author: post.author.clone(),
            comments: post.comments.iter().map(CommentRecord::from).collect(),
        }
    }
}

/// Deserialize one snapshot document into a domain post.
pub fn post_from_json(key: PostId, value: serde_json::Value) -> Result<Post, RecordError> {
    let record: PostRecord = serde_json::from_value(value)?;
    record.into_post(key)
}
