//! AI completion collaborator: wire protocol and client contract.
//!
//! The wire shapes mirror the completion backend exactly; both the front-end
//! client and the server routes deserialize the same types.

pub mod http;

pub use http::HttpCompletionClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::UserId;
use crate::chat::core::message::{Message, MessageRole};

/// Simplified message format for completion requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Author role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
    /// Optional justification carried for assistant turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl From<&Message> for ApiMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            justification: msg.justification.clone(),
        }
    }
}

/// Request body for `POST /api/v1/chat/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Authenticated account the request is made for.
    pub user_id: UserId,
    /// Prior turns only; the current turn travels in `message`.
    pub conversation_history: Vec<ApiMessage>,
    /// The new user message.
    pub message: String,
}

/// The assistant turn returned by the completion backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiReply {
    /// Author role; always [`MessageRole::Assistant`] in practice.
    #[serde(default = "assistant_role")]
    pub role: MessageRole,
    /// Response text.
    pub content: String,
    /// Optional justification for the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

const fn assistant_role() -> MessageRole {
    MessageRole::Assistant
}

/// Response body for `POST /api/v1/chat/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    /// The assistant turn.
    pub ai_response: AiReply,
}

/// Client contract for the completion backend.
///
/// A missing credential must be rejected before any network call is
/// attempted.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one turn and await the assistant's reply.
    ///
    /// # Errors
    /// Returns [`crate::chat::ChatError::AuthTokenUnavailable`] for a missing
    /// credential and [`crate::chat::ChatError::UpstreamRequestFailed`] for
    /// transport, backend, or decoding failures.
    async fn send(&self, request: SendRequest, token: &str) -> ChatResult<AiReply>;
}
