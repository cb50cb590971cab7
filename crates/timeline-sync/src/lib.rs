//! Post/comment synchronization engine.
//!
//! This crate provides:
//! - `SyncEngine`: the two write paths (create post, attach comment) with
//!   upload-before-persist sequencing, plus the read-side subscription
//! - `CommentAttacher`: comment attachment over the whole post aggregate
//! - `SyncError`: the unified error surface of both paths

pub mod attach;
pub mod engine;
pub mod error;

#[cfg(test)]
pub(crate) mod testutil;

pub use attach::{CommentAttacher, CommentInput};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
