//! Per-session greeting initialization guard.

use std::collections::HashMap;

use crate::chat::core::ids::SessionId;

/// Initialization state of a session's greeting fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GreetingState {
    /// No greeting attempt has been recorded for the session.
    #[default]
    NotStarted,
    /// A greeting request has been issued and has not resolved yet.
    ///
    /// Entered *before* the asynchronous call is awaited, so re-entrant
    /// activation of the same session cannot issue a duplicate request.
    InFlight,
    /// Initialization is satisfied; no further greeting request may run.
    Done,
}

/// Tracks, per session identifier, whether the initial-greeting fetch has
/// been attempted.
///
/// Exists only to prevent duplicate greeting requests caused by re-entrant
/// initialization triggers. The entry for a session is re-armed whenever that
/// session becomes the active one again.
#[derive(Debug, Default)]
pub struct GreetingGuard {
    states: HashMap<SessionId, GreetingState>,
}

impl GreetingGuard {
    /// Create an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a session.
    #[must_use]
    pub fn state(&self, session_id: SessionId) -> GreetingState {
        self.states.get(&session_id).copied().unwrap_or_default()
    }

    /// Record a state transition for a session.
    pub fn mark(&mut self, session_id: SessionId, state: GreetingState) {
        self.states.insert(session_id, state);
    }

    /// Re-arm a session to [`GreetingState::NotStarted`].
    pub fn reset(&mut self, session_id: SessionId) {
        self.states.remove(&session_id);
    }
}
