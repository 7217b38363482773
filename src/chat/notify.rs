//! Update notifications emitted by the conversation controller.

use tokio::sync::mpsc;

use crate::chat::core::ids::SessionId;
use crate::chat::core::message::Message;

/// One "messages changed" notification.
///
/// Carries the full new sequence, not a delta, and fires at most once per
/// logical state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationUpdate {
    /// Session the update belongs to.
    pub session_id: SessionId,
    /// The full message sequence after the change.
    pub messages: Vec<Message>,
    /// Populated only on the notification that first transitions the
    /// sequence from empty to non-empty through a user-initiated send.
    ///
    /// Callers apply it to the session title only while the title is still
    /// the creation-time sentinel.
    pub suggested_title: Option<String>,
}

/// Sending half of the update channel, held by the controller.
pub type UpdateSender = mpsc::UnboundedSender<ConversationUpdate>;

/// Receiving half of the update channel, held by the caller.
pub type UpdateReceiver = mpsc::UnboundedReceiver<ConversationUpdate>;

/// Create the update channel for a controller.
#[must_use]
pub fn update_channel() -> (UpdateSender, UpdateReceiver) {
    mpsc::unbounded_channel()
}
