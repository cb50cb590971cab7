//! The media store seam.

use async_trait::async_trait;

use timeline_models::{MediaKind, MediaLocator};

use crate::error::StorageResult;

/// Uploads opaque media payloads and returns stable retrieval locators.
///
/// One call uploads one blob under a namespace keyed by `kind` and completes
/// exactly once; there is no cancellation handle. Callers must not persist a
/// record referencing a locator until `store` has returned it.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn store(&self, payload: Vec<u8>, kind: MediaKind) -> StorageResult<MediaLocator>;
}
