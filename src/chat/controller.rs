//! Conversation reconciliation state machine.
//!
//! The controller owns the in-memory message list for one active chat
//! session. It guarantees exactly one of two initialization paths runs per
//! session (greeting fetch for empty histories, adoption of known history
//! otherwise), mediates all message sends as an optimistic append followed by
//! an asynchronous resolution, and emits one update notification per net
//! change to the sequence. Notifications are deduplicated by structural
//! comparison, never by reference.
//!
//! The controller mutates its state only through `&mut self`, so operations
//! on one instance are serialized by construction; see
//! [`crate::chat::service`] for the queueing wrapper used when callers fire
//! commands without awaiting each other.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chat::client::{AiReply, ApiMessage, CompletionClient, SendRequest};
use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::SessionId;
use crate::chat::core::message::Message;
use crate::chat::guard::{GreetingGuard, GreetingState};
use crate::chat::identity::{AuthUser, IdentityProvider};
use crate::chat::notify::{ConversationUpdate, UpdateReceiver, UpdateSender, update_channel};
use crate::chat::title::TitleSuggester;

/// Fixed assistant reply appended when a send cannot be resolved upstream.
///
/// A user message must never be left without a subsequent resolution entry,
/// even if that resolution is this placeholder.
const ERROR_REPLY: &str = "Sorry, I encountered an error trying to respond. Please try again.";

/// State machine governing one active session's message sequence.
pub struct ConversationController {
    config: ChatConfig,
    client: Arc<dyn CompletionClient>,
    identity: Arc<dyn IdentityProvider>,
    updates: UpdateSender,
    titles: TitleSuggester,
    active: Option<SessionId>,
    messages: Vec<Message>,
    pending: bool,
    guard: GreetingGuard,
}

impl ConversationController {
    /// Create a controller and the receiving half of its update channel.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: ChatConfig,
        client: Arc<dyn CompletionClient>,
        identity: Arc<dyn IdentityProvider>,
    ) -> ChatResult<(Self, UpdateReceiver)> {
        config.validate()?;
        let titles = TitleSuggester::new(&config.title)?;
        let (updates, receiver) = update_channel();

        Ok((
            Self {
                config,
                client,
                identity,
                updates,
                titles,
                active: None,
                messages: Vec::new(),
                pending: false,
                guard: GreetingGuard::new(),
            },
            receiver,
        ))
    }

    /// The currently active session, if any.
    #[must_use]
    pub const fn active_session(&self) -> Option<SessionId> {
        self.active
    }

    /// The in-memory message sequence.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether an upstream request is currently in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Make `session_id` the active session and reconcile with the caller's
    /// known message sequence.
    ///
    /// For a session with an empty known history this issues at most one
    /// greeting request; re-entrant activation cannot duplicate it. An update
    /// notification fires only if the resulting sequence differs structurally
    /// from `known_messages` as supplied.
    ///
    /// # Errors
    /// Returns [`ChatError::NotAuthenticated`] or
    /// [`ChatError::AuthTokenUnavailable`] when the greeting fetch cannot be
    /// issued (the guard is re-armed and no fallback is synthesized), and
    /// [`ChatError::UpstreamRequestFailed`] when the greeting request itself
    /// fails (the fixed fallback greeting is applied and the guard re-armed).
    pub async fn activate(
        &mut self,
        session_id: SessionId,
        known_messages: Vec<Message>,
    ) -> ChatResult<()> {
        if self.active != Some(session_id) {
            debug!("Activating session {}", session_id);
            self.guard.reset(session_id);
            self.active = Some(session_id);
            self.messages = known_messages.clone();
            self.pending = false;
        }

        if known_messages.is_empty()
            && self.guard.state(session_id) == GreetingState::NotStarted
        {
            return self.fetch_greeting(session_id).await;
        }

        if !known_messages.is_empty() && self.guard.state(session_id) != GreetingState::Done {
            // Initialization is satisfied by history; no network call.
            self.guard.mark(session_id, GreetingState::Done);
        }

        if self.messages != known_messages {
            let current = self.messages.clone();
            self.apply_and_notify(current, None);
        }

        Ok(())
    }

    /// Append the user's message optimistically, resolve the turn upstream,
    /// and append exactly one assistant-role resolution.
    ///
    /// Whitespace-only input is ignored. The first notification carries a
    /// suggested title iff the sequence was empty before the append.
    ///
    /// # Errors
    /// Returns [`ChatError::NotAuthenticated`] or
    /// [`ChatError::NoActiveSession`] before any state change. After the
    /// optimistic append, credential or upstream failures append the fixed
    /// error placeholder, notify, and surface
    /// [`ChatError::AuthTokenUnavailable`] or
    /// [`ChatError::UpstreamRequestFailed`]; the session remains usable.
    pub async fn send_user_message(&mut self, text: &str) -> ChatResult<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            debug!("Ignoring whitespace-only send");
            return Ok(());
        }

        let Some(user) = self.identity.current_user().await else {
            return Err(ChatError::NotAuthenticated);
        };
        let Some(session_id) = self.active else {
            return Err(ChatError::NoActiveSession);
        };

        // Phase 1 (synchronous): optimistic append, notified before any
        // network traffic so the caller sees the user's own message at once.
        let prior = self.messages.clone();
        let suggested_title = prior.is_empty().then(|| self.titles.suggest(trimmed));
        let mut with_user = prior.clone();
        with_user.push(Message::user(trimmed));
        self.apply_and_notify(with_user, suggested_title);

        // Phase 2 (asynchronous): resolve the turn against the backend. The
        // outbound history is the sequence as it stood before the append.
        self.pending = true;
        let resolution = self.resolve_turn(&user, &prior, trimmed).await;
        self.pending = false;

        if self.active != Some(session_id) {
            debug!(
                "Discarding send resolution for superseded session {}",
                session_id
            );
            return Ok(());
        }

        match resolution {
            Ok(reply) => {
                let mut messages = self.messages.clone();
                messages.push(Message::assistant(reply.content, reply.justification));
                self.apply_and_notify(messages, None);
                Ok(())
            }
            Err(err) => {
                warn!("Send for session {} failed: {}", session_id, err);
                let mut messages = self.messages.clone();
                messages.push(Message::assistant(ERROR_REPLY, None));
                self.apply_and_notify(messages, None);
                Err(err)
            }
        }
    }

    /// Build and send the outbound request for one user turn.
    ///
    /// The credential is fetched freshly for every send, never cached.
    async fn resolve_turn(
        &self,
        user: &AuthUser,
        prior: &[Message],
        text: &str,
    ) -> ChatResult<AiReply> {
        let token = self.identity.fetch_token().await?;
        let request = SendRequest {
            user_id: user.id.clone(),
            conversation_history: prior.iter().map(ApiMessage::from).collect(),
            message: text.to_string(),
        };
        self.client.send(request, &token).await
    }

    /// Issue the one-time greeting request for an empty session.
    async fn fetch_greeting(&mut self, session_id: SessionId) -> ChatResult<()> {
        // Marked before the await so re-entrant activation is idempotent.
        self.guard.mark(session_id, GreetingState::InFlight);

        let Some(user) = self.identity.current_user().await else {
            self.guard.reset(session_id);
            return Err(ChatError::NotAuthenticated);
        };

        let token = match self.identity.fetch_token().await {
            Ok(token) => token,
            Err(err) => {
                self.guard.reset(session_id);
                return Err(err);
            }
        };

        let request = SendRequest {
            user_id: user.id,
            conversation_history: Vec::new(),
            message: self.config.greeting.prompt.clone(),
        };

        self.pending = true;
        let result = self.client.send(request, &token).await;
        self.pending = false;

        if self.active != Some(session_id) {
            debug!(
                "Discarding greeting resolution for superseded session {}",
                session_id
            );
            return Ok(());
        }

        match result {
            Ok(reply) => {
                self.guard.mark(session_id, GreetingState::Done);
                let greeting = Message::assistant(reply.content, reply.justification);
                self.apply_and_notify(vec![greeting], None);
                info!("Initialized session {} with fetched greeting", session_id);
                Ok(())
            }
            Err(err) => {
                // Re-arm so the next activation of this session retries.
                self.guard.reset(session_id);
                warn!("Greeting fetch for session {} failed: {}", session_id, err);
                let fallback = Message::assistant(self.config.greeting.fallback.clone(), None);
                self.apply_and_notify(vec![fallback], None);
                Err(err)
            }
        }
    }

    /// Shared primitive behind every state transition: install the new
    /// sequence, then notify the caller with the full sequence.
    fn apply_and_notify(&mut self, messages: Vec<Message>, suggested_title: Option<String>) {
        let Some(session_id) = self.active else {
            return;
        };
        let update = ConversationUpdate {
            session_id,
            messages: messages.clone(),
            suggested_title,
        };
        self.messages = messages;
        if self.updates.send(update).is_err() {
            debug!("Update receiver dropped; notification skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::ids::UserId;
    use crate::chat::core::message::MessageRole;
    use crate::chat::identity::StaticIdentity;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    /// Identity whose signed-in state can change between calls.
    struct ToggleIdentity {
        user: Mutex<Option<AuthUser>>,
        token: String,
    }

    impl ToggleIdentity {
        fn signed_out() -> Arc<Self> {
            Arc::new(Self {
                user: Mutex::new(None),
                token: "token-1".to_string(),
            })
        }

        fn sign_in(&self, user: AuthUser) {
            *self.user.lock().unwrap() = Some(user);
        }
    }

    #[async_trait]
    impl IdentityProvider for ToggleIdentity {
        async fn current_user(&self) -> Option<AuthUser> {
            self.user.lock().unwrap().clone()
        }

        async fn fetch_token(&self) -> ChatResult<String> {
            Ok(self.token.clone())
        }
    }

    /// Completion client with a scripted sequence of outcomes.
    #[derive(Default)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<ChatResult<AiReply>>>,
        calls: AtomicUsize,
        last_request: Mutex<Option<SendRequest>>,
    }

    impl ScriptedClient {
        fn with(replies: Vec<ChatResult<AiReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> Option<SendRequest> {
            self.last_request.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn send(&self, request: SendRequest, _token: &str) -> ChatResult<AiReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChatError::UpstreamRequestFailed("unscripted".to_string())))
        }
    }

    fn reply(content: &str, justification: Option<&str>) -> ChatResult<AiReply> {
        Ok(AiReply {
            role: MessageRole::Assistant,
            content: content.to_string(),
            justification: justification.map(str::to_string),
        })
    }

    fn upstream_error() -> ChatResult<AiReply> {
        Err(ChatError::UpstreamRequestFailed("offline".to_string()))
    }

    fn identity() -> Arc<StaticIdentity> {
        Arc::new(StaticIdentity::signed_in(
            AuthUser {
                id: UserId::new("u-1").unwrap(),
                display_name: None,
            },
            "token-1",
        ))
    }

    fn controller(
        client: Arc<ScriptedClient>,
        identity: Arc<dyn IdentityProvider>,
    ) -> (ConversationController, UpdateReceiver) {
        ConversationController::new(ChatConfig::default(), client, identity).unwrap()
    }

    fn drain(rx: &mut UpdateReceiver) -> Vec<ConversationUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn test_empty_history_triggers_exactly_one_greeting() {
        let client = ScriptedClient::with(vec![reply("Hi there!", Some("greeting"))]);
        let (mut ctrl, mut rx) = controller(client.clone(), identity());
        let session = SessionId::new();

        ctrl.activate(session, Vec::new()).await.unwrap();
        assert_eq!(client.calls(), 1);
        assert_eq!(ctrl.messages().len(), 1);
        assert_eq!(ctrl.messages()[0].content, "Hi there!");
        assert_eq!(ctrl.messages()[0].justification.as_deref(), Some("greeting"));

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].suggested_title.is_none());

        // Re-activation with a still-empty caller-side cache: no new request.
        ctrl.activate(session, Vec::new()).await.unwrap();
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_greeting_request_carries_empty_history_and_fixed_prompt() {
        let client = ScriptedClient::with(vec![reply("Hello!", None)]);
        let (mut ctrl, _rx) = controller(client.clone(), identity());

        ctrl.activate(SessionId::new(), Vec::new()).await.unwrap();

        let request = client.last_request().unwrap();
        assert!(request.conversation_history.is_empty());
        assert_eq!(request.message, "User has started a new chat session.");
        assert_eq!(request.user_id.as_str(), "u-1");
    }

    #[tokio::test]
    async fn test_non_empty_history_triggers_no_greeting() {
        let client = ScriptedClient::with(Vec::new());
        let (mut ctrl, mut rx) = controller(client.clone(), identity());

        let known = vec![Message::assistant("welcome back", None)];
        ctrl.activate(SessionId::new(), known.clone()).await.unwrap();

        assert_eq!(client.calls(), 0);
        assert_eq!(ctrl.messages(), known.as_slice());
        // Adopting the supplied sequence is not a net change.
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_greeting_failure_applies_fallback_and_rearms() {
        let client = ScriptedClient::with(vec![upstream_error(), reply("Hi there!", None)]);
        let (mut ctrl, mut rx) = controller(client.clone(), identity());
        let session = SessionId::new();

        let err = ctrl.activate(session, Vec::new()).await.unwrap_err();
        assert!(matches!(err, ChatError::UpstreamRequestFailed(_)));
        assert_eq!(
            ctrl.messages()[0].content,
            "Hello! I'm Empathy.AI. How can I help you today?"
        );
        assert_eq!(drain(&mut rx).len(), 1);

        // The guard was re-armed: the next activation with an empty cache
        // retries and succeeds.
        ctrl.activate(session, Vec::new()).await.unwrap();
        assert_eq!(client.calls(), 2);
        assert_eq!(ctrl.messages()[0].content, "Hi there!");
    }

    #[tokio::test]
    async fn test_signed_out_activation_skips_greeting_without_fallback() {
        let client = ScriptedClient::with(vec![reply("Hi there!", None)]);
        let signed_out = Arc::new(StaticIdentity::signed_out());
        let (mut ctrl, mut rx) = controller(client.clone(), signed_out);
        let session = SessionId::new();

        let err = ctrl.activate(session, Vec::new()).await.unwrap_err();
        assert_eq!(err, ChatError::NotAuthenticated);
        assert!(ctrl.messages().is_empty());
        assert_eq!(client.calls(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_activate_with_equal_sequence_is_silent() {
        let client = ScriptedClient::with(vec![reply("Hi!", None)]);
        let (mut ctrl, mut rx) = controller(client, identity());
        let session = SessionId::new();

        ctrl.activate(session, Vec::new()).await.unwrap();
        let current = ctrl.messages().to_vec();
        drain(&mut rx);

        ctrl.activate(session, current).await.unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_activate_with_stale_sequence_resyncs_caller() {
        let client = ScriptedClient::with(vec![reply("Hi!", None)]);
        let (mut ctrl, mut rx) = controller(client.clone(), identity());
        let session = SessionId::new();

        ctrl.activate(session, Vec::new()).await.unwrap();
        let current = ctrl.messages().to_vec();
        drain(&mut rx);

        // Caller re-supplies an empty cache after the greeting resolved: no
        // new request, but one notification carrying the real sequence.
        ctrl.activate(session, Vec::new()).await.unwrap();
        assert_eq!(client.calls(), 1);
        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].messages, current);
    }

    #[tokio::test]
    async fn test_send_appends_user_then_assistant() {
        let client = ScriptedClient::with(vec![reply("I'm well, thanks!", Some("courtesy"))]);
        let (mut ctrl, mut rx) = controller(client.clone(), identity());
        let session = SessionId::new();
        let known = vec![Message::assistant("Hello!", None)];

        ctrl.activate(session, known).await.unwrap();
        ctrl.send_user_message("  How are you?  ").await.unwrap();

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 2);
        // First notification: the optimistic user message, trimmed.
        assert_eq!(updates[0].messages.len(), 2);
        assert_eq!(updates[0].messages[1].content, "How are you?");
        assert_eq!(updates[0].messages[1].role, MessageRole::User);
        // Second notification: the assistant resolution.
        assert_eq!(updates[1].messages.len(), 3);
        assert_eq!(updates[1].messages[2].content, "I'm well, thanks!");
        assert_eq!(updates[1].messages[2].role, MessageRole::Assistant);

        // The outbound history holds prior turns only.
        let request = client.last_request().unwrap();
        assert_eq!(request.conversation_history.len(), 1);
        assert_eq!(request.message, "How are you?");
    }

    #[tokio::test]
    async fn test_send_failure_appends_error_placeholder() {
        let client = ScriptedClient::with(vec![upstream_error()]);
        let (mut ctrl, mut rx) = controller(client, identity());
        let session = SessionId::new();
        let known = vec![
            Message::user("Hi"),
            Message::assistant("Hello! How can I help?", None),
        ];

        ctrl.activate(session, known).await.unwrap();
        let err = ctrl.send_user_message("How are you?").await.unwrap_err();
        assert!(matches!(err, ChatError::UpstreamRequestFailed(_)));

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].messages[2].content, "How are you?");
        let last = updates[1].messages.last().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert_eq!(last.content, ERROR_REPLY);
        // The session remains usable.
        assert!(!ctrl.is_pending());
        assert_eq!(ctrl.active_session(), Some(session));
    }

    #[tokio::test]
    async fn test_token_failure_still_resolves_the_turn() {
        let client = ScriptedClient::with(Vec::new());
        let no_token = Arc::new(StaticIdentity::without_token(AuthUser {
            id: UserId::new("u-1").unwrap(),
            display_name: None,
        }));
        let (mut ctrl, mut rx) = controller(client.clone(), no_token);
        let session = SessionId::new();

        ctrl.activate(session, vec![Message::assistant("Hello!", None)])
            .await
            .unwrap();
        let err = ctrl.send_user_message("Hi").await.unwrap_err();
        assert!(matches!(err, ChatError::AuthTokenUnavailable(_)));
        assert_eq!(client.calls(), 0);

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].messages.last().unwrap().content, ERROR_REPLY);
    }

    #[tokio::test]
    async fn test_send_without_identity_is_rejected() {
        let client = ScriptedClient::with(Vec::new());
        let (mut ctrl, mut rx) =
            controller(client, Arc::new(StaticIdentity::signed_out()));

        let err = ctrl.send_user_message("Hi").await.unwrap_err();
        assert_eq!(err, ChatError::NotAuthenticated);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_send_without_session_is_rejected() {
        let client = ScriptedClient::with(Vec::new());
        let (mut ctrl, mut rx) = controller(client, identity());

        let err = ctrl.send_user_message("Hi").await.unwrap_err();
        assert_eq!(err, ChatError::NoActiveSession);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_only_send_is_a_no_op() {
        let client = ScriptedClient::with(Vec::new());
        let (mut ctrl, mut rx) = controller(client.clone(), identity());

        ctrl.send_user_message("   \n  ").await.unwrap();
        assert_eq!(client.calls(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_no_title_after_greeting_populated_the_sequence() {
        let client = ScriptedClient::with(vec![
            reply("Hello! How can I help?", None),
            reply("Of course.", None),
        ]);
        let (mut ctrl, mut rx) = controller(client, identity());

        ctrl.activate(SessionId::new(), Vec::new()).await.unwrap();
        drain(&mut rx);

        // The greeting already made the sequence non-empty, so the send is
        // not the empty-to-non-empty transition.
        ctrl.send_user_message("Can you help me budget?").await.unwrap();
        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|u| u.suggested_title.is_none()));
    }

    #[tokio::test]
    async fn test_title_rides_on_empty_to_non_empty_send() {
        let client = ScriptedClient::with(vec![reply("Gladly.", None), reply("Sure.", None)]);
        let toggle = ToggleIdentity::signed_out();
        let (mut ctrl, mut rx) = controller(client, toggle.clone());
        let session = SessionId::new();

        // Signed out at activation: the greeting is skipped and the sequence
        // stays empty, but the session is active.
        let err = ctrl.activate(session, Vec::new()).await.unwrap_err();
        assert_eq!(err, ChatError::NotAuthenticated);
        drain(&mut rx);

        toggle.sign_in(AuthUser {
            id: UserId::new("u-1").unwrap(),
            display_name: None,
        });

        ctrl.send_user_message("I need advice about a difficult conversation with my boss")
            .await
            .unwrap();
        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 2);
        let title = updates[0].suggested_title.as_deref().unwrap();
        assert!(title.starts_with("I need advice"));
        assert!(title.chars().count() <= 41);
        // Never suggested again for that session.
        assert!(updates[1].suggested_title.is_none());

        ctrl.send_user_message("Thanks").await.unwrap();
        let later = drain(&mut rx);
        assert!(later.iter().all(|u| u.suggested_title.is_none()));
    }
}
