//! The synchronization engine.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use timeline_identity::IdentityProvider;
use timeline_models::{MediaKind, Post};
use timeline_rtdb::{PostRepository, PostStore};
use timeline_storage::MediaStore;

use crate::attach::{CommentAttacher, CommentInput};
use crate::error::{SyncError, SyncResult};

/// Wires identity, media upload and repository persistence into the two write
/// paths, and owns the read-side subscription.
pub struct SyncEngine<I, M, S> {
    identity: Arc<I>,
    media: Arc<M>,
    repository: PostRepository<S>,
    attacher: CommentAttacher<I, M, S>,
}

impl<I, M, S> SyncEngine<I, M, S>
where
    I: IdentityProvider,
    M: MediaStore,
    S: PostStore + 'static,
{
    pub fn new(identity: Arc<I>, media: Arc<M>, repository: PostRepository<S>) -> Self {
        let attacher = CommentAttacher::new(
            Arc::clone(&identity),
            Arc::clone(&media),
            repository.clone(),
        );

        Self {
            identity,
            media,
            repository,
            attacher,
        }
    }

    /// Create a post: upload the image, then persist the record.
    ///
    /// Write-then-link ordering: the upload completes strictly before the
    /// persist that references its locator is issued. An upload failure
    /// leaves nothing persisted.
    pub async fn create_post(
        &self,
        title: impl Into<String>,
        image_bytes: Vec<u8>,
        ratio: Option<f64>,
    ) -> SyncResult<Post> {
        let author = self
            .identity
            .current_author()
            .ok_or(SyncError::IdentityMissing)?;

        let locator = self.media.store(image_bytes, MediaKind::Image).await?;

        let post = self.repository.create(title, locator, ratio, author);
        let persisted = self
            .repository
            .persist(&post)
            .await
            .map_err(SyncError::Persist)?;

        info!("Created post {:?}", persisted.id);
        Ok(persisted)
    }

    /// Attach a comment to a post.
    pub async fn attach_comment(&self, input: CommentInput, post: &Post) -> SyncResult<Post> {
        self.attacher.attach(input, post).await
    }

    /// Spawn the single read-side subscription.
    ///
    /// `on_change` fires after every applied snapshot, or with `Observe` when
    /// a change notification could not be turned into a fresh view.
    pub fn observe<F>(&self, on_change: F) -> JoinHandle<()>
    where
        F: Fn(SyncResult<()>) + Send + Sync + 'static,
    {
        self.repository
            .subscribe(move |result| on_change(result.map_err(SyncError::Observe)))
    }

    /// Current cached view, newest first.
    pub async fn posts(&self) -> Vec<Post> {
        self.repository.posts().await
    }
}
