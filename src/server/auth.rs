//! Bearer-token verification for the completion backend.
//!
//! Real identity tokens are verified by the hosted auth provider; this crate
//! only owns the seam. The development verifier mirrors the original
//! service's dev-mode behavior of handing out a mock account.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::chat::core::ids::UserId;

/// Decoded claims of a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaims {
    /// Account identifier the token was minted for.
    pub uid: UserId,
    /// Account email, when known.
    pub email: Option<String>,
    /// Display name, when known.
    pub name: Option<String>,
}

/// Verification failures, surfaced as 401 responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No bearer token was supplied.
    #[error("Authentication token is missing")]
    MissingToken,
    /// The token did not verify.
    #[error("Invalid token. Please reauthenticate.")]
    InvalidToken,
}

/// Contract for verifying a bearer token into claims.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` and return its claims.
    ///
    /// # Errors
    /// Returns an [`AuthError`] when the token is missing or invalid.
    async fn verify(&self, token: Option<&str>) -> Result<AuthClaims, AuthError>;
}

/// Development-mode verifier: every request maps to a fixed mock account.
#[derive(Debug, Clone, Default)]
pub struct DevTokenVerifier;

/// Account handed out by the development verifier.
const DEV_UID: &str = "dev-user-123";

#[async_trait]
impl TokenVerifier for DevTokenVerifier {
    async fn verify(&self, _token: Option<&str>) -> Result<AuthClaims, AuthError> {
        let uid = UserId::new(DEV_UID).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthClaims {
            uid,
            email: Some("dev@example.com".to_string()),
            name: Some("Development User".to_string()),
        })
    }
}

/// Verifier backed by a fixed token table, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, AuthClaims>,
}

impl StaticTokenVerifier {
    /// Create an empty verifier; every token is rejected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as belonging to `claims`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, claims: AuthClaims) -> Self {
        self.tokens.insert(token.into(), claims);
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: Option<&str>) -> Result<AuthClaims, AuthError> {
        let token = token.ok_or(AuthError::MissingToken)?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
