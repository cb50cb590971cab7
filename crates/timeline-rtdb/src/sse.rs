//! Server-sent event parsing for the Realtime Database change stream.
//!
//! The streaming REST API delivers events as `event:`/`data:` line pairs
//! separated by blank lines. Chunks from the transport can split events at
//! arbitrary byte boundaries, so the parser buffers across feeds.

/// A change notification from the database stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Data at or under the watched node was overwritten.
    Put,
    /// Data at or under the watched node was partially updated.
    Patch,
    /// Periodic keep-alive, no data change.
    KeepAlive,
    /// The server revoked the stream's credentials.
    AuthRevoked,
    /// The server cancelled the stream.
    Cancel,
}

impl ChangeEvent {
    /// True when the event signals that watched data changed.
    pub fn is_data_change(&self) -> bool {
        matches!(self, Self::Put | Self::Patch)
    }
}

/// A parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    /// Map the event name to a change notification. Unknown names are dropped.
    pub fn change_event(&self) -> Option<ChangeEvent> {
        match self.event.as_str() {
            "put" => Some(ChangeEvent::Put),
            "patch" => Some(ChangeEvent::Patch),
            "keep-alive" => Some(ChangeEvent::KeepAlive),
            "auth_revoked" => Some(ChangeEvent::AuthRevoked),
            "cancel" => Some(ChangeEvent::Cancel),
            _ => None,
        }
    }
}

/// Incremental SSE parser. Feed raw transport chunks, get completed events.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
    event: Option<String>,
    data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning any events completed by it.
    ///
    /// Bytes that do not form valid UTF-8 at the chunk boundary are rare in
    /// practice (the payload is JSON text); invalid sequences are replaced.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut completed = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                // Blank line terminates the current event
                if let Some(event) = self.event.take() {
                    completed.push(SseEvent {
                        event,
                        data: std::mem::take(&mut self.data),
                    });
                }
                self.data.clear();
                continue;
            }

            if let Some(value) = line.strip_prefix("event:") {
                self.event = Some(value.trim_start().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(value.trim_start());
            }
            // Comment lines (":...") and unknown fields are ignored
        }

        completed
    }
}
