//! Identity error types.

use thiserror::Error;

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors that can occur during identity resolution.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unknown signing key: {0}")]
    UnknownKey(String),

    #[error("Failed to fetch JWKS: {0}")]
    JwksFetch(#[from] reqwest::Error),

    #[error("Invalid JWKS key material: {0}")]
    JwksKey(String),

    #[error("Token claims carry no usable display name")]
    NoDisplayName,

    #[error("Identity configuration error: {0}")]
    ConfigError(String),
}

impl IdentityError {
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::InvalidToken(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
