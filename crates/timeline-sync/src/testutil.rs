//! Shared fakes for engine and attacher tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use timeline_models::{Author, MediaKind, MediaLocator, PostId, PostRecord};
use timeline_rtdb::{ChangeEvent, PostStore, RtdbError, RtdbResult};
use timeline_storage::{MediaStore, StorageError, StorageResult};

pub fn author() -> Author {
    Author::new("u1", "Spencer")
}

/// Ordered record of side effects across fakes, for sequencing assertions.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<&'static str>>>);

impl EventLog {
    pub fn record(&self, event: &'static str) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Media store fake recording calls, with one-shot fault injection.
pub struct RecordingMediaStore {
    log: EventLog,
    calls: Mutex<Vec<MediaKind>>,
    fail_next: AtomicBool,
    counter: AtomicU32,
}

impl RecordingMediaStore {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            calls: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
            counter: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> Vec<MediaKind> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaStore for RecordingMediaStore {
    async fn store(&self, _payload: Vec<u8>, kind: MediaKind) -> StorageResult<MediaLocator> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StorageError::upload_failed("injected upload failure"));
        }

        self.log.record("upload");
        self.calls.lock().unwrap().push(kind);

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(MediaLocator::new(format!(
            "https://cdn.test/{}/{}",
            kind.as_str(),
            n
        )))
    }
}

/// Poll until a watcher-side condition holds, failing after a timeout.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[derive(Default)]
struct MemoryStoreInner {
    nodes: Mutex<serde_json::Map<String, serde_json::Value>>,
    next_id: AtomicU32,
    fail_next_write: AtomicBool,
    fail_fetches: AtomicBool,
    scripted_events: Mutex<Vec<RtdbResult<ChangeEvent>>>,
}

/// In-memory post store; clones share state so tests can inspect it.
#[derive(Clone)]
pub struct MemoryPostStore {
    inner: Arc<MemoryStoreInner>,
    log: EventLog,
}

impl MemoryPostStore {
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: Arc::new(MemoryStoreInner::default()),
            log,
        }
    }

    pub fn fail_next_write(&self) {
        self.inner.fail_next_write.store(true, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self) {
        self.inner.fail_fetches.store(true, Ordering::SeqCst);
    }

    pub fn script_events(&self, events: Vec<RtdbResult<ChangeEvent>>) {
        *self.inner.scripted_events.lock().unwrap() = events;
    }

    pub fn documents(&self) -> serde_json::Map<String, serde_json::Value> {
        self.inner.nodes.lock().unwrap().clone()
    }

    fn check_write_fault(&self) -> RtdbResult<()> {
        if self.inner.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(RtdbError::request_failed("injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn push_post(&self, record: &PostRecord) -> RtdbResult<PostId> {
        self.check_write_fault()?;
        self.log.record("persist");

        let id = format!("-N{:04}", self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let value = serde_json::to_value(record)?;
        self.inner.nodes.lock().unwrap().insert(id.clone(), value);
        Ok(PostId::from_string(id))
    }

    async fn put_post(&self, id: &PostId, record: &PostRecord) -> RtdbResult<()> {
        self.check_write_fault()?;
        self.log.record("persist");

        let value = serde_json::to_value(record)?;
        self.inner
            .nodes
            .lock()
            .unwrap()
            .insert(id.as_str().to_string(), value);
        Ok(())
    }

    async fn fetch_all(&self) -> RtdbResult<serde_json::Map<String, serde_json::Value>> {
        if self.inner.fail_fetches.load(Ordering::SeqCst) {
            return Err(RtdbError::request_failed("injected fetch failure"));
        }
        Ok(self.documents())
    }

    async fn changes(&self) -> RtdbResult<BoxStream<'static, RtdbResult<ChangeEvent>>> {
        let scripted: Vec<_> = self.inner.scripted_events.lock().unwrap().drain(..).collect();
        // Chain onto a pending stream so the watcher keeps listening instead
        // of treating the script end as a lost connection
        Ok(futures_util::stream::iter(scripted)
            .chain(futures_util::stream::pending())
            .boxed())
    }
}
