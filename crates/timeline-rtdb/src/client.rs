//! Realtime Database REST API client.
//!
//! Production-grade client with:
//! - Token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Change streaming over server-sent events
//! - Observability (tracing spans, metrics)

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{info_span, Instrument};

use crate::auth::{GcpTokenSource, TokenCache};
use crate::error::{RtdbError, RtdbResult};
use crate::metrics::record_request;
use crate::sse::{ChangeEvent, SseParser};

// =============================================================================
// Configuration
// =============================================================================

/// How the client authenticates to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Service-account OAuth via `gcp_auth`, token cached.
    ServiceAccount,
    /// No authentication (local emulator).
    Emulator,
}

/// Realtime Database client configuration.
#[derive(Debug, Clone)]
pub struct RtdbConfig {
    /// Database base URL, e.g. `https://PROJECT-default-rtdb.firebaseio.com`
    pub database_url: String,
    /// Request timeout (does not apply to the change stream)
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Authentication mode
    pub auth: AuthMode,
}

impl RtdbConfig {
    /// Create config from environment variables.
    ///
    /// `FIREBASE_DATABASE_EMULATOR_HOST` takes precedence and switches to
    /// unauthenticated emulator mode.
    pub fn from_env() -> RtdbResult<Self> {
        if let Ok(host) = std::env::var("FIREBASE_DATABASE_EMULATOR_HOST") {
            if !host.is_empty() {
                return Ok(Self::emulator(format!("http://{}", host)));
            }
        }

        let database_url = std::env::var("FIREBASE_DATABASE_URL").map_err(|_| {
            RtdbError::auth_error(
                "FIREBASE_DATABASE_URL must be set to access the Realtime Database",
            )
        })?;

        if database_url.is_empty() {
            return Err(RtdbError::auth_error(
                "FIREBASE_DATABASE_URL cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("RTDB_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            database_url,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            auth: AuthMode::ServiceAccount,
        })
    }

    /// Unauthenticated config for the emulator or a test server.
    pub fn emulator(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            auth: AuthMode::Emulator,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Store-assigned key returned by a push.
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// Realtime Database REST API client.
pub struct RtdbClient {
    http: Client,
    /// Separate client for the change stream: streaming responses stay open
    /// indefinitely, so no total request timeout.
    stream_http: Client,
    base_url: String,
    token_cache: Option<Arc<TokenCache>>,
}

impl Clone for RtdbClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            stream_http: self.stream_http.clone(),
            base_url: self.base_url.clone(),
            token_cache: self.token_cache.as_ref().map(Arc::clone),
        }
    }
}

impl RtdbClient {
    /// Create a new client.
    pub async fn new(config: RtdbConfig) -> RtdbResult<Self> {
        let token_cache = match config.auth {
            AuthMode::ServiceAccount => {
                let auth = Self::create_auth_provider()?;
                Some(Arc::new(TokenCache::new(GcpTokenSource::new(auth))))
            }
            AuthMode::Emulator => None,
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("timeline-rtdb/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RtdbError::Network)?;

        let stream_http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("timeline-rtdb/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RtdbError::Network)?;

        Ok(Self {
            http,
            stream_http,
            base_url: config.database_url.trim_end_matches('/').to_string(),
            token_cache,
        })
    }

    fn create_auth_provider() -> RtdbResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env()
            .map_err(|e| RtdbError::auth_error(format!("Failed to load service account: {}", e)))?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(RtdbError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> RtdbResult<Self> {
        let config = RtdbConfig::from_env()?;
        Self::new(config).await
    }

    /// Get a bearer token, or `None` in emulator mode.
    async fn bearer_token(&self) -> RtdbResult<Option<String>> {
        match &self.token_cache {
            Some(cache) => Ok(Some(cache.get_token().await?)),
            None => Ok(None),
        }
    }

    async fn invalidate_token(&self) {
        if let Some(cache) = &self.token_cache {
            cache.invalidate().await;
        }
    }

    fn apply_auth(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("Auth token is expired")
    }

    /// Build the REST URL for a node path.
    fn node_url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Read the raw JSON at a node. Absent nodes come back as `null`.
    pub async fn get_node(&self, path: &str) -> RtdbResult<serde_json::Value> {
        let url = self.node_url(path);

        self.execute_request("get_node", path, async {
            let mut token = self.bearer_token().await?;
            let mut response = Self::apply_auth(self.http.get(&url), token.as_deref())
                .send()
                .await?;
            let mut status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                let body = response.text().await.unwrap_or_default();
                if Self::is_access_token_expired(&body) {
                    self.invalidate_token().await;
                    token = self.bearer_token().await?;
                    response = Self::apply_auth(self.http.get(&url), token.as_deref())
                        .send()
                        .await?;
                    status = response.status();
                } else {
                    return Err(RtdbError::from_http_status(
                        status.as_u16(),
                        format!("{} failed: {}", url, body),
                    ));
                }
            }

            match status {
                StatusCode::OK => {
                    let value: serde_json::Value = response.json().await?;
                    Ok(value)
                }
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Append a document under a node; the store assigns and returns its key.
    pub async fn push(&self, path: &str, value: &serde_json::Value) -> RtdbResult<String> {
        let url = self.node_url(path);

        self.execute_request("push", path, async {
            let mut token = self.bearer_token().await?;
            let mut response = Self::apply_auth(self.http.post(&url), token.as_deref())
                .json(value)
                .send()
                .await?;
            let mut status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                let body = response.text().await.unwrap_or_default();
                if Self::is_access_token_expired(&body) {
                    self.invalidate_token().await;
                    token = self.bearer_token().await?;
                    response = Self::apply_auth(self.http.post(&url), token.as_deref())
                        .json(value)
                        .send()
                        .await?;
                    status = response.status();
                } else {
                    return Err(RtdbError::from_http_status(
                        status.as_u16(),
                        format!("{} failed: {}", url, body),
                    ));
                }
            }

            match status {
                StatusCode::OK => {
                    let push: PushResponse = response.json().await?;
                    if push.name.is_empty() {
                        return Err(RtdbError::invalid_response(
                            "Push response carried an empty key",
                        ));
                    }
                    Ok(push.name)
                }
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Overwrite a node with the given JSON (full replace, last write wins).
    pub async fn put(&self, path: &str, value: &serde_json::Value) -> RtdbResult<()> {
        let url = self.node_url(path);

        self.execute_request("put", path, async {
            let mut token = self.bearer_token().await?;
            let mut response = Self::apply_auth(self.http.put(&url), token.as_deref())
                .json(value)
                .send()
                .await?;
            let mut status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                let body = response.text().await.unwrap_or_default();
                if Self::is_access_token_expired(&body) {
                    self.invalidate_token().await;
                    token = self.bearer_token().await?;
                    response = Self::apply_auth(self.http.put(&url), token.as_deref())
                        .json(value)
                        .send()
                        .await?;
                    status = response.status();
                } else {
                    return Err(RtdbError::from_http_status(
                        status.as_u16(),
                        format!("{} failed: {}", url, body),
                    ));
                }
            }

            match status {
                StatusCode::OK => Ok(()),
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    // =========================================================================
    // Change Stream
    // =========================================================================

    /// Open the server-sent-event change stream for a node.
    ///
    /// The returned stream yields one `ChangeEvent` per server event and ends
    /// when the server closes the connection. Reconnecting is the caller's
    /// concern.
    pub async fn stream_changes(
        &self,
        path: &str,
    ) -> RtdbResult<BoxStream<'static, RtdbResult<ChangeEvent>>> {
        let url = self.node_url(path);
        let token = self.bearer_token().await?;

        let response = Self::apply_auth(self.stream_http.get(&url), token.as_deref())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RtdbError::from_http_status(
                status.as_u16(),
                format!("{} stream failed: {}", url, body),
            ));
        }

        let mut parser = SseParser::new();
        let events = response
            .bytes_stream()
            .flat_map(move |chunk| {
                let out: Vec<RtdbResult<ChangeEvent>> = match chunk {
                    Ok(bytes) => parser
                        .feed(&bytes)
                        .into_iter()
                        .filter_map(|event| event.change_event())
                        .map(Ok)
                        .collect(),
                    Err(e) => vec![Err(RtdbError::Network(e))],
                };
                futures_util::stream::iter(out)
            })
            .boxed();

        Ok(events)
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(&self, operation: &str, path: &str, fut: F) -> RtdbResult<T>
    where
        F: std::future::Future<Output = RtdbResult<T>>,
    {
        let span = info_span!("rtdb_request", operation = %operation, path = %path);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(
        status: StatusCode,
        url: &str,
        response: reqwest::Response,
    ) -> RtdbError {
        let body = response.text().await.unwrap_or_default();
        RtdbError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}
