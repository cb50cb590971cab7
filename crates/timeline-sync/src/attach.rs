//! Comment attachment.

use std::sync::Arc;

use tracing::debug;

use timeline_identity::IdentityProvider;
use timeline_models::{Comment, MediaKind, Post};
use timeline_rtdb::{PostRepository, PostStore};
use timeline_storage::MediaStore;

use crate::error::{SyncError, SyncResult};

/// A comment to attach: text, or raw audio bytes to upload first.
#[derive(Debug, Clone, Default)]
pub struct CommentInput {
    pub text: Option<String>,
    pub audio: Option<Vec<u8>>,
}

impl CommentInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            audio: None,
        }
    }

    pub fn audio(bytes: Vec<u8>) -> Self {
        Self {
            text: None,
            audio: Some(bytes),
        }
    }
}

/// Attaches comments to posts: resolve identity, upload audio when present,
/// append, persist the whole aggregate.
pub struct CommentAttacher<I, M, S> {
    identity: Arc<I>,
    media: Arc<M>,
    repository: PostRepository<S>,
}

impl<I, M, S> CommentAttacher<I, M, S>
where
    I: IdentityProvider,
    M: MediaStore,
    S: PostStore + 'static,
{
    pub fn new(identity: Arc<I>, media: Arc<M>, repository: PostRepository<S>) -> Self {
        Self {
            identity,
            media,
            repository,
        }
    }

    /// Attach a comment to a post and persist the updated aggregate.
    ///
    /// Fails fast on a missing identity or an empty input, before any network
    /// call. Audio bytes are uploaded strictly before the persist that
    /// references the resulting locator. Comments are append-only; the base
    /// post is not mutated, the updated post is returned.
    pub async fn attach(&self, input: CommentInput, post: &Post) -> SyncResult<Post> {
        let author = self
            .identity
            .current_author()
            .ok_or(SyncError::IdentityMissing)?;

        let comment = match (input.text, input.audio) {
            (Some(text), _) => Comment::text(text, author),
            (None, Some(bytes)) => {
                let locator = self.media.store(bytes, MediaKind::Audio).await?;
                Comment::audio(locator, author)
            }
            (None, None) => return Err(SyncError::EmptyComment),
        };

        let mut updated = post.clone();
        updated.comments.push(comment);

        let persisted = self
            .repository
            .persist(&updated)
            .await
            .map_err(SyncError::Persist)?;

        debug!(
            "Attached comment to post {:?} ({} total)",
            persisted.id,
            persisted.comments.len()
        );
        Ok(persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{author, EventLog, MemoryPostStore, RecordingMediaStore};

    use timeline_identity::StaticIdentity;
    use timeline_models::MediaLocator;

    struct Fixture {
        attacher: CommentAttacher<StaticIdentity, RecordingMediaStore, MemoryPostStore>,
        repository: PostRepository<MemoryPostStore>,
        media: Arc<RecordingMediaStore>,
        store: MemoryPostStore,
        log: EventLog,
    }

    fn fixture(identity: StaticIdentity) -> Fixture {
        let log = EventLog::default();
        let media = Arc::new(RecordingMediaStore::new(log.clone()));
        let store = MemoryPostStore::new(log.clone());
        let repository = PostRepository::new(store.clone());
        let attacher = CommentAttacher::new(
            Arc::new(identity),
            Arc::clone(&media),
            repository.clone(),
        );
        Fixture {
            attacher,
            repository,
            media,
            store,
            log,
        }
    }

    async fn persisted_post(repository: &PostRepository<MemoryPostStore>) -> Post {
        let post = repository.create(
            "Sunset",
            MediaLocator::new("https://cdn.test/image/base"),
            None,
            author(),
        );
        repository.persist(&post).await.unwrap()
    }

    #[tokio::test]
    async fn test_text_comment_never_touches_media_store() {
        let fx = fixture(StaticIdentity::signed_in(author()));
        let post = persisted_post(&fx.repository).await;
        fx.log.clear();

        let updated = fx
            .attacher
            .attach(CommentInput::text("Nice!"), &post)
            .await
            .unwrap();

        assert_eq!(updated.comments.len(), 1);
        assert_eq!(updated.comments[0].text_body(), Some("Nice!"));
        assert!(fx.media.calls().is_empty());
        assert_eq!(fx.log.events(), vec!["persist"]);
    }

    #[tokio::test]
    async fn test_audio_comment_uploads_once_before_persist() {
        let fx = fixture(StaticIdentity::signed_in(author()));
        let post = persisted_post(&fx.repository).await;
        fx.log.clear();

        let updated = fx
            .attacher
            .attach(CommentInput::audio(vec![1, 2, 3]), &post)
            .await
            .unwrap();

        assert_eq!(updated.comments.len(), 1);
        assert!(updated.comments[0].audio_locator().is_some());
        assert_eq!(fx.media.calls(), vec![MediaKind::Audio]);
        assert_eq!(fx.log.events(), vec!["upload", "persist"]);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_before_any_call() {
        let fx = fixture(StaticIdentity::signed_in(author()));
        let post = persisted_post(&fx.repository).await;
        fx.log.clear();

        let err = fx
            .attacher
            .attach(CommentInput::default(), &post)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::EmptyComment));
        assert!(fx.log.events().is_empty());
        assert_eq!(
            fx.repository.refresh().await.unwrap()[0].comments.len(),
            0
        );
    }

    #[tokio::test]
    async fn test_missing_identity_short_circuits() {
        let fx = fixture(StaticIdentity::signed_out());
        let post = persisted_post(&fx.repository).await;
        fx.log.clear();

        let err = fx
            .attacher
            .attach(CommentInput::text("hi"), &post)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::IdentityMissing));
        assert!(fx.log.events().is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_aborts_without_persisting() {
        let fx = fixture(StaticIdentity::signed_in(author()));
        let post = persisted_post(&fx.repository).await;
        fx.log.clear();
        fx.media.fail_next();

        let err = fx
            .attacher
            .attach(CommentInput::audio(vec![1]), &post)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Upload(_)));
        assert!(fx.log.events().is_empty());
        assert_eq!(
            fx.repository.refresh().await.unwrap()[0].comments.len(),
            0
        );
    }

    #[tokio::test]
    async fn test_persist_failure_after_upload_is_surfaced() {
        let fx = fixture(StaticIdentity::signed_in(author()));
        let post = persisted_post(&fx.repository).await;
        fx.log.clear();
        fx.store.fail_next_write();

        let err = fx
            .attacher
            .attach(CommentInput::audio(vec![1]), &post)
            .await
            .unwrap_err();

        // The blob was uploaded; the record referencing it was not written
        assert!(matches!(err, SyncError::Persist(_)));
        assert_eq!(fx.log.events(), vec!["upload"]);
        assert_eq!(
            fx.repository.refresh().await.unwrap()[0].comments.len(),
            0
        );
    }
}
