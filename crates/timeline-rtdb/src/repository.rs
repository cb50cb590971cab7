//! The post repository: authoritative cached view of the timeline.
//!
//! Writes go through `persist` (push for new posts, full overwrite for
//! existing ones). Reads come from a cached view that is only ever replaced
//! wholesale by `apply_snapshot`, either from an explicit `refresh` or from
//! the change-stream watcher spawned by `subscribe`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use timeline_models::{post_from_json, sort_newest_first, Author, MediaLocator, Post, PostId, PostRecord};

use crate::error::RtdbResult;
use crate::metrics::record_reconnect;
use crate::sse::ChangeEvent;
use crate::store::PostStore;

/// Delay before reopening a closed or failed change stream.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Repository over a post store, holding the cached post collection.
pub struct PostRepository<S> {
    store: Arc<S>,
    view: Arc<RwLock<Vec<Post>>>,
}

impl<S> Clone for PostRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            view: Arc::clone(&self.view),
        }
    }
}

impl<S: PostStore + 'static> PostRepository<S> {
    /// Create a repository with an empty cached view.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            view: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Build a new unpersisted post.
    pub fn create(
        &self,
        title: impl Into<String>,
        media_locator: MediaLocator,
        ratio: Option<f64>,
        author: Author,
    ) -> Post {
        Post::new(title, media_locator, ratio, author)
    }

    /// Persist a post as one whole document.
    ///
    /// A post without an id is pushed and the returned post carries the
    /// store-assigned id; a post with an id is overwritten in full (last
    /// write wins, no precondition).
    pub async fn persist(&self, post: &Post) -> RtdbResult<Post> {
        let record = PostRecord::from(post);

        match &post.id {
            None => {
                let id = self.store.push_post(&record).await?;
                debug!("Persisted new post {}", id);

                let mut persisted = post.clone();
                persisted.id = Some(id);
                Ok(persisted)
            }
            Some(id) => {
                self.store.put_post(id, &record).await?;
                debug!("Overwrote post {}", id);
                Ok(post.clone())
            }
        }
    }

    /// Replace the cached view with a full snapshot.
    ///
    /// Malformed documents are logged and skipped, never fatal. The resulting
    /// view is sorted newest first.
    pub async fn apply_snapshot(
        &self,
        snapshot: serde_json::Map<String, serde_json::Value>,
    ) -> Vec<Post> {
        let mut posts = Vec::with_capacity(snapshot.len());

        for (key, value) in snapshot {
            match post_from_json(PostId::from_string(key.clone()), value) {
                Ok(post) => posts.push(post),
                Err(e) => warn!("Skipping malformed post document {}: {}", key, e),
            }
        }

        sort_newest_first(&mut posts);

        *self.view.write().await = posts.clone();
        posts
    }

    /// Current cached view, newest first.
    pub async fn posts(&self) -> Vec<Post> {
        self.view.read().await.clone()
    }

    /// Fetch the full snapshot and apply it.
    ///
    /// On fetch failure the previously cached view stays intact.
    pub async fn refresh(&self) -> RtdbResult<Vec<Post>> {
        let snapshot = self.store.fetch_all().await?;
        Ok(self.apply_snapshot(snapshot).await)
    }

    /// Spawn the watcher task for the collection's change stream.
    ///
    /// Every data-change event triggers a full refresh followed by
    /// `on_change(Ok(()))`; a failed refresh delivers the error and leaves the
    /// cached view intact. A closed or failed stream is reopened after a fixed
    /// delay. Notifications are delivered serially by the single task.
    pub fn subscribe<F>(&self, on_change: F) -> JoinHandle<()>
    where
        F: Fn(RtdbResult<()>) + Send + Sync + 'static,
    {
        let repo = self.clone();

        tokio::spawn(async move {
            loop {
                match repo.store.changes().await {
                    Ok(mut stream) => {
                        while let Some(event) = stream.next().await {
                            match event {
                                Ok(ChangeEvent::Put) | Ok(ChangeEvent::Patch) => {
                                    match repo.refresh().await {
                                        Ok(_) => on_change(Ok(())),
                                        Err(e) => {
                                            warn!("Snapshot refresh failed: {}", e);
                                            on_change(Err(e));
                                        }
                                    }
                                }
                                Ok(ChangeEvent::KeepAlive) => {}
                                Ok(ChangeEvent::AuthRevoked) | Ok(ChangeEvent::Cancel) => {
                                    warn!("Change stream closed by server");
                                    break;
                                }
                                Err(e) => {
                                    warn!("Change stream transport error: {}", e);
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => warn!("Failed to open change stream: {}", e),
                }

                record_reconnect();
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeDelta;
    use futures_util::stream::BoxStream;
    use serde_json::json;

    use timeline_models::Comment;

    use crate::error::RtdbError;

    use super::*;

    /// In-memory post store with fault injection for fetches and a scripted
    /// change stream.
    #[derive(Default)]
    struct MemoryPostStore {
        nodes: Mutex<serde_json::Map<String, serde_json::Value>>,
        next_id: AtomicU32,
        fail_fetch: AtomicBool,
        scripted_events: Mutex<Vec<RtdbResult<ChangeEvent>>>,
    }

    impl MemoryPostStore {
        fn script_events(&self, events: Vec<RtdbResult<ChangeEvent>>) {
            *self.scripted_events.lock().unwrap() = events;
        }
    }

    #[async_trait]
    impl PostStore for MemoryPostStore {
        async fn push_post(&self, record: &PostRecord) -> RtdbResult<PostId> {
            let id = format!("-N{:04}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let value = serde_json::to_value(record)?;
            self.nodes.lock().unwrap().insert(id.clone(), value);
            Ok(PostId::from_string(id))
        }

        async fn put_post(&self, id: &PostId, record: &PostRecord) -> RtdbResult<()> {
            let value = serde_json::to_value(record)?;
            self.nodes
                .lock()
                .unwrap()
                .insert(id.as_str().to_string(), value);
            Ok(())
        }

        async fn fetch_all(&self) -> RtdbResult<serde_json::Map<String, serde_json::Value>> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(RtdbError::request_failed("injected fetch failure"));
            }
            Ok(self.nodes.lock().unwrap().clone())
        }

        async fn changes(&self) -> RtdbResult<BoxStream<'static, RtdbResult<ChangeEvent>>> {
            let scripted: Vec<_> = self.scripted_events.lock().unwrap().drain(..).collect();
            // Chain onto a pending stream so the watcher keeps listening
            // instead of treating the script end as a lost connection
            Ok(futures_util::stream::iter(scripted)
                .chain(futures_util::stream::pending())
                .boxed())
        }
    }

    /// Poll until a watcher-side condition holds, failing after a timeout.
    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn author() -> Author {
        Author::new("u1", "Spencer")
    }

    fn repo() -> PostRepository<MemoryPostStore> {
        PostRepository::new(MemoryPostStore::default())
    }

    #[tokio::test]
    async fn test_persist_assigns_id_and_round_trips() {
        let repo = repo();

        let mut post = repo.create(
            "Sunset",
            MediaLocator::new("https://cdn.example.com/image/abc"),
            Some(1.5),
            author(),
        );
        post.comments.push(Comment::text("First!", author()));

        let persisted = repo.persist(&post).await.unwrap();
        let id = persisted.id.clone().expect("push assigns an id");
        assert!(!id.as_str().is_empty());

        let view = repo.refresh().await.unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0], persisted);
    }

    #[tokio::test]
    async fn test_persist_with_id_overwrites() {
        let repo = repo();

        let post = repo.create(
            "Sunset",
            MediaLocator::new("https://cdn.example.com/image/abc"),
            None,
            author(),
        );
        let mut persisted = repo.persist(&post).await.unwrap();

        persisted.comments.push(Comment::text("Later", author()));
        let again = repo.persist(&persisted).await.unwrap();
        assert_eq!(again.id, persisted.id);

        let view = repo.refresh().await.unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].comments.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_skips_malformed_documents() {
        let repo = repo();

        let mut snapshot = serde_json::Map::new();
        snapshot.insert(
            "good".to_string(),
            json!({
                "title": "t",
                "mediaURL": "https://x/image/1",
                "timestamp": 1700000000000i64,
                "author": {"id": "u1", "displayName": "A"},
            }),
        );
        snapshot.insert("bad".to_string(), json!({"title": "no media url"}));

        let view = repo.apply_snapshot(snapshot).await;
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id.as_ref().unwrap().as_str(), "good");
        assert_eq!(repo.posts().await, view);
    }

    #[tokio::test]
    async fn test_snapshot_sorted_newest_first() {
        let repo = repo();
        let base = timeline_models::now_millis();

        let mut snapshot = serde_json::Map::new();
        for (key, offset) in [("mid", 0i64), ("old", -60), ("new", 60)] {
            let ts = (base + TimeDelta::seconds(offset)).timestamp_millis();
            snapshot.insert(
                key.to_string(),
                json!({
                    "title": key,
                    "mediaURL": "https://x/image/1",
                    "timestamp": ts,
                    "author": {"id": "u1", "displayName": "A"},
                }),
            );
        }

        let view = repo.apply_snapshot(snapshot).await;
        let titles: Vec<&str> = view.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_view_intact() {
        let repo = repo();

        let post = repo.create(
            "Kept",
            MediaLocator::new("https://x/image/1"),
            None,
            author(),
        );
        repo.persist(&post).await.unwrap();
        repo.refresh().await.unwrap();
        assert_eq!(repo.posts().await.len(), 1);

        repo.store.fail_fetch.store(true, Ordering::SeqCst);
        assert!(repo.refresh().await.is_err());
        assert_eq!(repo.posts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_yields_empty_view() {
        let repo = repo();
        assert!(repo.refresh().await.unwrap().is_empty());
        assert!(repo.posts().await.is_empty());
    }

    #[tokio::test]
    async fn test_watcher_refreshes_on_data_events() {
        let repo = repo();
        let post = repo.create(
            "Streamed",
            MediaLocator::new("https://x/image/1"),
            None,
            author(),
        );
        repo.persist(&post).await.unwrap();
        assert!(repo.posts().await.is_empty());

        repo.store.script_events(vec![
            Ok(ChangeEvent::Put),
            Ok(ChangeEvent::KeepAlive),
            Ok(ChangeEvent::Patch),
        ]);

        let outcomes: Arc<Mutex<Vec<bool>>> = Arc::default();
        let sink = Arc::clone(&outcomes);
        let watcher = repo.subscribe(move |result| sink.lock().unwrap().push(result.is_ok()));

        // Two data events notify; the keep-alive does not
        wait_until(|| outcomes.lock().unwrap().len() == 2).await;
        assert_eq!(*outcomes.lock().unwrap(), vec![true, true]);
        assert_eq!(repo.posts().await.len(), 1);

        watcher.abort();
    }

    #[tokio::test]
    async fn test_watcher_surfaces_failed_refresh_and_keeps_view() {
        let repo = repo();
        let post = repo.create(
            "Kept",
            MediaLocator::new("https://x/image/1"),
            None,
            author(),
        );
        repo.persist(&post).await.unwrap();
        repo.refresh().await.unwrap();
        assert_eq!(repo.posts().await.len(), 1);

        repo.store.fail_fetch.store(true, Ordering::SeqCst);
        repo.store.script_events(vec![Ok(ChangeEvent::Put)]);

        let outcomes: Arc<Mutex<Vec<bool>>> = Arc::default();
        let sink = Arc::clone(&outcomes);
        let watcher = repo.subscribe(move |result| sink.lock().unwrap().push(result.is_err()));

        wait_until(|| outcomes.lock().unwrap().len() == 1).await;
        assert_eq!(*outcomes.lock().unwrap(), vec![true]);
        assert_eq!(repo.posts().await.len(), 1);

        watcher.abort();
    }
}
