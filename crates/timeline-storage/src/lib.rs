//! Media blob storage for the timeline backend.
//!
//! This crate provides:
//! - The `MediaStore` seam: upload opaque payloads, get back a locator
//! - `BlobStore`: S3-compatible object storage implementation
//! - Media-kind key namespacing

pub mod blob;
pub mod error;
pub mod store;

pub use blob::{BlobConfig, BlobStore};
pub use error::{StorageError, StorageResult};
pub use store::MediaStore;
