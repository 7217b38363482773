//! Session metadata records.

use serde::{Deserialize, Serialize};

use crate::chat::core::ids::SessionId;

/// Sentinel title assigned to a freshly created session.
///
/// A suggested title may overwrite it exactly once, and only while the stored
/// title still equals this sentinel.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Metadata for a session displayed in the conversation list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique identifier.
    pub id: SessionId,
    /// Display title.
    pub title: String,
    /// Creation timestamp in milliseconds since Unix epoch.
    pub created_at: i64,
    /// Last persisted mutation timestamp in milliseconds since Unix epoch.
    pub last_activity: i64,
    /// Number of messages in the persisted sequence.
    pub message_count: u32,
}

impl SessionRecord {
    /// Create a record for a brand-new, empty session.
    #[must_use]
    pub fn new(id: SessionId, now_ms: i64) -> Self {
        Self {
            id,
            title: DEFAULT_SESSION_TITLE.to_string(),
            created_at: now_ms,
            last_activity: now_ms,
            message_count: 0,
        }
    }

    /// Whether the title is still the creation-time sentinel.
    #[must_use]
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_SESSION_TITLE
    }
}
