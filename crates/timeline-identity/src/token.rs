//! Firebase ID token verification.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use timeline_models::Author;

use crate::error::{IdentityError, IdentityResult};

/// Google JWKS URL for Firebase Auth.
const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Firebase token issuer prefix.
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// JWKS cache TTL.
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Decoded Firebase ID token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseClaims {
    /// User ID
    pub sub: String,
    /// Display name (if set on the account)
    pub name: Option<String>,
    /// Email (if available)
    pub email: Option<String>,
    /// Issuer
    pub iss: String,
    /// Audience (Firebase project ID)
    pub aud: String,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

impl FirebaseClaims {
    /// Map claims to an author.
    ///
    /// A token without a display name or email cannot act as an author;
    /// author construction fails rather than falling back to a placeholder.
    pub fn into_author(self) -> IdentityResult<Author> {
        let display_name = self
            .name
            .filter(|n| !n.is_empty())
            .or(self.email)
            .ok_or(IdentityError::NoDisplayName)?;

        Ok(Author::new(self.sub, display_name))
    }
}

/// JWKS response from Google.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwkKey {
    kid: String,
    n: String,
    e: String,
}

/// Verifies Firebase ID tokens against Google's JWKS, caching the keys.
pub struct TokenVerifier {
    http: Client,
    jwks_url: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
    /// `None` until the first successful refresh
    last_refresh: RwLock<Option<Instant>>,
    project_id: String,
}

impl TokenVerifier {
    /// Create a verifier for the given Firebase project.
    pub fn new(project_id: impl Into<String>) -> IdentityResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            jwks_url: GOOGLE_JWKS_URL.to_string(),
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(None),
            project_id: project_id.into(),
        })
    }

    /// Create from `FIREBASE_PROJECT_ID` / `GCP_PROJECT_ID`.
    pub fn from_env() -> IdentityResult<Self> {
        let project_id = std::env::var("FIREBASE_PROJECT_ID")
            .or_else(|_| std::env::var("GCP_PROJECT_ID"))
            .map_err(|_| {
                IdentityError::config_error(
                    "FIREBASE_PROJECT_ID or GCP_PROJECT_ID must be set to verify tokens",
                )
            })?;
        Self::new(project_id)
    }

    /// Override the JWKS endpoint (emulator or test server).
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = url.into();
        self
    }

    /// Refresh JWKS keys from the endpoint.
    async fn refresh_keys(&self) -> IdentityResult<()> {
        debug!("Refreshing JWKS keys");

        let response = self.http.get(&self.jwks_url).send().await?;
        let jwks: JwksResponse = response.json().await?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
                .map_err(|e| IdentityError::JwksKey(e.to_string()))?;
            keys.insert(jwk.kid, key);
        }

        let key_count = keys.len();
        *self.keys.write().await = keys;
        *self.last_refresh.write().await = Some(Instant::now());

        debug!("Refreshed {} JWKS keys", key_count);
        Ok(())
    }

    /// Get decoding key for a key ID, refreshing the cache if stale.
    async fn get_key(&self, kid: &str) -> Option<DecodingKey> {
        let needs_refresh = {
            let last = self.last_refresh.read().await;
            match *last {
                Some(at) => at.elapsed() > JWKS_CACHE_TTL,
                None => true,
            }
        };

        if needs_refresh {
            if let Err(e) = self.refresh_keys().await {
                warn!("Failed to refresh JWKS keys: {}", e);
            }
        }

        self.keys.read().await.get(kid).cloned()
    }

    /// Verify a Firebase ID token and resolve its author.
    pub async fn verify(&self, token: &str) -> IdentityResult<Author> {
        let claims = self.verify_claims(token).await?;
        claims.into_author()
    }

    /// Verify a Firebase ID token and return the raw claims.
    pub async fn verify_claims(&self, token: &str) -> IdentityResult<FirebaseClaims> {
        let header = decode_header(token)
            .map_err(|e| IdentityError::invalid_token(format!("Invalid token header: {}", e)))?;

        let kid = header
            .kid
            .ok_or_else(|| IdentityError::invalid_token("Token missing key ID"))?;

        let key = self
            .get_key(&kid)
            .await
            .ok_or(IdentityError::UnknownKey(kid))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("{}{}", FIREBASE_ISSUER_PREFIX, self.project_id)]);
        validation.set_audience(&[&self.project_id]);

        let token_data = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| IdentityError::invalid_token(format!("Token validation failed: {}", e)))?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(name: Option<&str>, email: Option<&str>) -> FirebaseClaims {
        FirebaseClaims {
            sub: "u1".to_string(),
            name: name.map(String::from),
            email: email.map(String::from),
            iss: format!("{}{}", FIREBASE_ISSUER_PREFIX, "test-project"),
            aud: "test-project".to_string(),
            iat: 0,
            exp: i64::MAX,
        }
    }

    #[test]
    fn test_claims_prefer_display_name() {
        let author = claims(Some("Spencer"), Some("s@example.com"))
            .into_author()
            .unwrap();
        assert_eq!(author.display_name, "Spencer");
        assert_eq!(author.id, "u1");
    }

    #[test]
    fn test_claims_fall_back_to_email() {
        let author = claims(None, Some("s@example.com")).into_author().unwrap();
        assert_eq!(author.display_name, "s@example.com");
    }

    #[test]
    fn test_claims_without_name_or_email_fail() {
        assert!(matches!(
            claims(None, None).into_author(),
            Err(IdentityError::NoDisplayName)
        ));
    }

    #[test]
    fn test_empty_display_name_falls_back() {
        let author = claims(Some(""), Some("s@example.com")).into_author().unwrap();
        assert_eq!(author.display_name, "s@example.com");
    }
}
