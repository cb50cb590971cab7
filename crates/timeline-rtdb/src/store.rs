//! Post persistence backend.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use timeline_models::{PostId, PostRecord};

use crate::client::RtdbClient;
use crate::error::{RtdbError, RtdbResult};
use crate::sse::ChangeEvent;

/// Database node holding the post collection.
pub const POSTS_NODE: &str = "posts";

/// Persistence backend for the post collection.
///
/// Documents live in a flat mapping keyed by store-assigned id. `push_post`
/// appends a new document, `put_post` overwrites a whole document, and
/// `fetch_all` returns the full mapping.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn push_post(&self, record: &PostRecord) -> RtdbResult<PostId>;

    async fn put_post(&self, id: &PostId, record: &PostRecord) -> RtdbResult<()>;

    async fn fetch_all(&self) -> RtdbResult<serde_json::Map<String, serde_json::Value>>;

    /// Open the change stream for the collection.
    async fn changes(&self) -> RtdbResult<BoxStream<'static, RtdbResult<ChangeEvent>>>;
}

/// Production post store over the Realtime Database REST API.
#[derive(Clone)]
pub struct RtdbPostStore {
    client: RtdbClient,
}

impl RtdbPostStore {
    pub fn new(client: RtdbClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PostStore for RtdbPostStore {
    async fn push_post(&self, record: &PostRecord) -> RtdbResult<PostId> {
        let value = serde_json::to_value(record)?;
        let key = self.client.push(POSTS_NODE, &value).await?;
        Ok(PostId::from_string(key))
    }

    async fn put_post(&self, id: &PostId, record: &PostRecord) -> RtdbResult<()> {
        let value = serde_json::to_value(record)?;
        let path = format!("{}/{}", POSTS_NODE, id.as_str());
        self.client.put(&path, &value).await
    }

    async fn fetch_all(&self) -> RtdbResult<serde_json::Map<String, serde_json::Value>> {
        match self.client.get_node(POSTS_NODE).await? {
            // An empty collection reads back as null
            serde_json::Value::Null => Ok(serde_json::Map::new()),
            serde_json::Value::Object(map) => Ok(map),
            other => Err(RtdbError::invalid_response(format!(
                "Expected an object at {}, got: {}",
                POSTS_NODE, other
            ))),
        }
    }

    async fn changes(&self) -> RtdbResult<BoxStream<'static, RtdbResult<ChangeEvent>>> {
        self.client.stream_changes(POSTS_NODE).await
    }
}
