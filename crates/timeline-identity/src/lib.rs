//! Author identity for the timeline backend.
//!
//! This crate provides:
//! - The `IdentityProvider` seam consumed by the sync engine
//! - `Session`: the signed-in author for this process
//! - Firebase ID token verification against Google's JWKS

pub mod error;
pub mod session;
pub mod token;

pub use error::{IdentityError, IdentityResult};
pub use session::{IdentityProvider, Session, StaticIdentity};
pub use token::{FirebaseClaims, TokenVerifier};
