//! Synchronization error types.

use thiserror::Error;

use timeline_rtdb::RtdbError;
use timeline_storage::StorageError;

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the synchronization engine.
///
/// A failed operation leaves no partial record behind, with one documented
/// exception: `Persist` after a successful media upload means the blob exists
/// but no record references it.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No active identity; sign in before writing")]
    IdentityMissing,

    #[error("Comment must carry text or audio")]
    EmptyComment,

    #[error("Media upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Persistence failed: {0}")]
    Persist(#[source] RtdbError),

    #[error("Change observation failed: {0}")]
    Observe(#[source] RtdbError),
}
