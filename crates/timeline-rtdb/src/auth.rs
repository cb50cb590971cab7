//! Access tokens for database requests.
//!
//! `TokenCache` hands out OAuth access tokens obtained from a `TokenSource`
//! (service-account credentials in production) and keeps serving a token
//! until shortly before the issuer-reported lifetime runs out. A failed
//! reissue falls back to the previous token for as long as the server still
//! accepts it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{RtdbError, RtdbResult};

/// OAuth scopes for Realtime Database REST access.
pub const RTDB_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/firebase.database",
];

/// Stop serving a cached token this long before its lifetime ends, so
/// in-flight requests never carry a token that expires mid-request.
const REISSUE_MARGIN: Duration = Duration::from_secs(60);

/// An access token and the lifetime its issuer granted it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub ttl: Duration,
}

/// Issues fresh access tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn issue(&self) -> RtdbResult<IssuedToken>;
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn issue(&self) -> RtdbResult<IssuedToken> {
        (**self).issue().await
    }
}

/// Token source over gcp_auth service-account credentials.
pub struct GcpTokenSource {
    provider: Arc<dyn TokenProvider>,
}

impl GcpTokenSource {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TokenSource for GcpTokenSource {
    async fn issue(&self) -> RtdbResult<IssuedToken> {
        let token = self
            .provider
            .token(RTDB_SCOPES)
            .await
            .map_err(|e| RtdbError::auth_error(format!("Failed to obtain auth token: {}", e)))?;

        // A token the issuer already considers expired gets a zero ttl, which
        // makes the cache reissue on the next request.
        let ttl = (token.expires_at() - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        Ok(IssuedToken {
            access_token: token.as_str().to_string(),
            ttl,
        })
    }
}

/// Cached token state. `issued_at` is `None` until the first issue and after
/// an invalidation.
#[derive(Default)]
struct CacheSlot {
    access_token: Option<String>,
    issued_at: Option<Instant>,
    ttl: Duration,
}

impl CacheSlot {
    fn age(&self) -> Option<Duration> {
        self.issued_at.map(|at| at.elapsed())
    }

    /// Still comfortably inside the lifetime, margin included.
    fn is_fresh(&self) -> bool {
        matches!(self.age(), Some(age) if age + REISSUE_MARGIN < self.ttl)
    }

    /// Past the margin but the server still accepts it.
    fn is_usable(&self) -> bool {
        matches!(self.age(), Some(age) if age < self.ttl)
    }
}

/// Serves access tokens from a cache, reissuing ahead of expiry.
pub struct TokenCache {
    source: Box<dyn TokenSource>,
    slot: Mutex<CacheSlot>,
}

impl TokenCache {
    pub fn new(source: impl TokenSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            slot: Mutex::new(CacheSlot::default()),
        }
    }

    /// Drop the cached token; the next request gets a fresh one.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = CacheSlot::default();
    }

    /// Get an access token, reissuing when the cached one nears expiry.
    ///
    /// The slot lock is held across the reissue, so concurrent callers wait
    /// for one issue instead of stampeding the issuer. A reissue failure
    /// falls back to the previous token while it is still usable.
    pub async fn get_token(&self) -> RtdbResult<String> {
        let mut slot = self.slot.lock().await;

        if slot.is_fresh() {
            if let Some(token) = &slot.access_token {
                return Ok(token.clone());
            }
        }

        match self.source.issue().await {
            Ok(issued) => {
                debug!("Issued database access token");
                *slot = CacheSlot {
                    access_token: Some(issued.access_token.clone()),
                    issued_at: Some(Instant::now()),
                    ttl: issued.ttl,
                };
                Ok(issued.access_token)
            }
            Err(e) => {
                if slot.is_usable() {
                    if let Some(token) = &slot.access_token {
                        warn!("Token reissue failed, serving previous token: {}", e);
                        return Ok(token.clone());
                    }
                }
                Err(e)
            }
        }
    }
}
