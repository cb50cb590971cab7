//! Active session and the identity seam.

use std::sync::RwLock;

use timeline_models::Author;

/// Source of the acting author for mutating operations.
///
/// Implementations return `None` when no session is active; callers must
/// short-circuit with a precondition failure rather than proceed with a
/// placeholder author.
pub trait IdentityProvider: Send + Sync {
    fn current_author(&self) -> Option<Author>;
}

/// The signed-in author for this process.
pub struct Session {
    author: RwLock<Option<Author>>,
}

impl Session {
    /// Create a session with nobody signed in.
    pub fn new() -> Self {
        Self {
            author: RwLock::new(None),
        }
    }

    /// Record a sign-in, replacing any previous session.
    pub fn sign_in(&self, author: Author) {
        let mut guard = self.author.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(author);
    }

    /// Clear the session.
    pub fn sign_out(&self) {
        let mut guard = self.author.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for Session {
    fn current_author(&self) -> Option<Author> {
        self.author
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Fixed identity, for wiring tests and tools.
pub struct StaticIdentity(pub Option<Author>);

impl StaticIdentity {
    /// Always resolves to the given author.
    pub fn signed_in(author: Author) -> Self {
        Self(Some(author))
    }

    /// Never resolves an author.
    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_author(&self) -> Option<Author> {
        self.0.clone()
    }
}
