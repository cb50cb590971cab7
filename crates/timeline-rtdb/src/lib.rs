//! Realtime Database REST client and post repository.
//!
//! This crate provides:
//! - `RtdbClient`: REST access to database nodes (get, push, put) plus the
//!   server-sent-event change stream
//! - Service account authentication via gcp_auth, with token caching
//! - `PostRepository`: the authoritative cached post collection, snapshot
//!   application and the change-stream watcher
//! - The `PostStore` seam for exercising the repository against an in-memory
//!   backend

pub mod auth;
pub mod client;
pub mod error;
pub mod metrics;
pub mod repository;
pub mod sse;
pub mod store;


pub use client::{AuthMode, RtdbClient, RtdbConfig};
pub use error::{RtdbError, RtdbResult};
pub use repository::PostRepository;
pub use sse::ChangeEvent;
pub use store::{PostStore, RtdbPostStore, POSTS_NODE};
