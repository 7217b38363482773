//! Message types for one conversation session.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::MessageId;

/// Author of a message. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Authored by the human user.
    User,
    /// Authored by the AI assistant.
    Assistant,
}

impl MessageRole {
    /// Borrow the lowercase wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleParseError(pub String);

impl fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown message role: {}", self.0)
    }
}

impl std::error::Error for RoleParseError {}

impl FromStr for MessageRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

/// One committed message in a session's ordered sequence.
///
/// The sequence is append-only during a session lifetime: the only mutations
/// are appending new entries or wholesale replacement during
/// (re)initialization. Structural comparison of two sequences uses the
/// derived `PartialEq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier, generated client-side at creation time.
    pub id: MessageId,
    /// Author role.
    pub role: MessageRole,
    /// Text body. Non-empty for committed messages.
    pub content: String,
    /// Optional explanatory text, attached only to assistant messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    /// Creation time (not persistence time).
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a user message stamped now.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: MessageRole::User,
            content: content.into(),
            justification: None,
            timestamp: Utc::now(),
        }
    }

    /// Build an assistant message stamped now.
    #[must_use]
    pub fn assistant(content: impl Into<String>, justification: Option<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: MessageRole::Assistant,
            content: content.into(),
            justification,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        assert_eq!("user".parse::<MessageRole>().unwrap(), MessageRole::User);
        assert_eq!(
            "assistant".parse::<MessageRole>().unwrap(),
            MessageRole::Assistant
        );
        assert!("system".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_user_message_has_no_justification() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert!(msg.justification.is_none());
    }

    #[test]
    fn test_assistant_message_keeps_justification() {
        let msg = Message::assistant("hi", Some("greeting".to_string()));
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.justification.as_deref(), Some("greeting"));
    }

    #[test]
    fn test_messages_are_structurally_distinct() {
        // Same content, different ids/timestamps: these are different entities.
        let a = Message::user("hello");
        let b = Message::user("hello");
        assert_ne!(a, b);
    }

    #[test]
    fn test_message_serde_roundtrip() {
        let msg = Message::assistant("hi", Some("why".to_string()));
        let json = serde_json::to_string(&msg).unwrap();
        let restored: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, restored);
    }
}
