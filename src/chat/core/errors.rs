//! Error types for the conversation subsystem.

use thiserror::Error;

/// Conversation subsystem error type.
///
/// Every variant is recoverable at the session level: none of them terminate
/// the controller or require session teardown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No authenticated identity is available.
    #[error("user not authenticated")]
    NotAuthenticated,
    /// No session is currently active on the controller.
    #[error("no active chat session")]
    NoActiveSession,
    /// A fresh auth credential could not be obtained.
    #[error("authentication token not available: {0}")]
    AuthTokenUnavailable(String),
    /// The completion backend rejected or failed the request.
    ///
    /// Carries the original message so callers can display it.
    #[error("upstream request failed: {0}")]
    UpstreamRequestFailed(String),
    /// The owning service task is gone and can no longer accept commands.
    #[error("chat service stopped")]
    ServiceStopped,
}

/// Convenience result alias for conversation operations.
pub type ChatResult<T> = Result<T, ChatError>;
