//! Authentication user types.

use crate::jwt::SessionClaims;

/// Authenticated user information extracted from a verified session token.
#[derive(Debug, Clone)]
pub struct SessionUser {
    /// Claims from the verified (or freshly minted) session token
    pub claims: SessionClaims,
}

impl SessionUser {
    pub fn email(&self) -> &str {
        &self.claims.identity.email
    }

    /// Public user UUID.
    pub fn user_uuid(&self) -> &str {
        &self.claims.identity.id
    }
}

/// Outcome of a successful authentication.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: SessionUser,
    /// Replacement token, set only when the presented one was refreshed
    pub refreshed: Option<String>,
}
