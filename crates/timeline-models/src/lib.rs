//! Shared data models for the timeline backend.
//!
//! This crate provides:
//! - Author, Post and Comment domain types
//! - Media kind and locator newtypes
//! - Wire record shapes for the realtime database documents
//! - Snapshot ordering helpers

pub mod author;
pub mod comment;
pub mod media;
pub mod post;
pub mod record;

// Re-export common types
pub use author::Author;
pub use comment::{Comment, CommentBody};
pub use media::{MediaKind, MediaLocator};
pub use post::{now_millis, sort_newest_first, Post, PostId};
pub use record::{post_from_json, CommentRecord, PostRecord, RecordError};
