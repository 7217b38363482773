//! Identity collaborator: current user and fresh credentials.
//!
//! The real identity provider lives outside this crate (a hosted auth
//! backend); the controller only depends on this seam. Credentials are
//! fetched freshly for every send to tolerate rotation and expiry.

use async_trait::async_trait;

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::UserId;

/// The authenticated account as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Opaque account identifier.
    pub id: UserId,
    /// Display name, when the provider exposes one.
    pub display_name: Option<String>,
}

/// Contract for the identity collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The currently signed-in user, if any.
    async fn current_user(&self) -> Option<AuthUser>;

    /// Obtain a fresh bearer credential.
    ///
    /// # Errors
    /// Returns [`ChatError::AuthTokenUnavailable`] when no credential can be
    /// produced.
    async fn fetch_token(&self) -> ChatResult<String>;
}

/// Fixed identity for embedding and tests.
///
/// Holds one optional user and one optional credential; `fetch_token` hands
/// out a copy of the credential on every call.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<AuthUser>,
    token: Option<String>,
}

impl StaticIdentity {
    /// A signed-in identity with the given user and credential.
    #[must_use]
    pub fn signed_in(user: AuthUser, token: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            token: Some(token.into()),
        }
    }

    /// A signed-out identity: no user, no credential.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// A signed-in identity whose credential fetches fail.
    #[must_use]
    pub fn without_token(user: AuthUser) -> Self {
        Self {
            user: Some(user),
            token: None,
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Option<AuthUser> {
        self.user.clone()
    }

    async fn fetch_token(&self) -> ChatResult<String> {
        self.token.clone().ok_or_else(|| {
            ChatError::AuthTokenUnavailable("no credential configured".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> AuthUser {
        AuthUser {
            id: UserId::new("u-1").unwrap(),
            display_name: Some("Dev".to_string()),
        }
    }

    #[tokio::test]
    async fn test_signed_in_identity() {
        let identity = StaticIdentity::signed_in(user(), "token-1");
        assert_eq!(identity.current_user().await, Some(user()));
        assert_eq!(identity.fetch_token().await.unwrap(), "token-1");
    }

    #[tokio::test]
    async fn test_signed_out_identity() {
        let identity = StaticIdentity::signed_out();
        assert!(identity.current_user().await.is_none());
        assert!(matches!(
            identity.fetch_token().await,
            Err(ChatError::AuthTokenUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_token_failure_with_user_present() {
        let identity = StaticIdentity::without_token(user());
        assert!(identity.current_user().await.is_some());
        assert!(identity.fetch_token().await.is_err());
    }
}
