//! Conversation subsystem for the Empathy chat application.
//!
//! This module provides the client-side conversation core, organized into:
//! - `core`: Configuration, errors, IDs, messages, and session records
//! - `guard`: Per-session greeting initialization state machine
//! - `title`: Suggested-title derivation from the first user message
//! - `notify`: Update notifications emitted on every net change
//! - `controller`: The conversation reconciliation state machine
//! - `service`: Actor wrapper serializing controller commands
//! - `client`: AI completion collaborator (wire protocol + HTTP client)
//! - `identity`: Identity collaborator (current user + fresh credentials)
//! - `storage`: Persistence collaborator (SQLite session store + persister)

pub mod client;
pub mod controller;
pub mod core;
pub mod guard;
pub mod identity;
pub mod notify;
pub mod service;
pub mod storage;
pub mod title;

// Re-export commonly used types for convenience
pub use client::{AiReply, ApiMessage, CompletionClient, HttpCompletionClient, SendRequest};
pub use controller::ConversationController;
pub use self::core::{
    ApiConfig, ChatConfig, ChatError, ChatResult, DEFAULT_SESSION_TITLE, GreetingConfig, Message,
    MessageId, MessageRole, RequestId, SessionId, SessionRecord, TitleConfig, UserId,
};
pub use guard::{GreetingGuard, GreetingState};
pub use identity::{AuthUser, IdentityProvider, StaticIdentity};
pub use notify::{ConversationUpdate, UpdateReceiver, UpdateSender, update_channel};
pub use service::{ChatHandle, ChatService};
pub use storage::{SessionStore, SqliteSessionStore, StoreError, StorePersister, StoreResult};
pub use title::TitleSuggester;
