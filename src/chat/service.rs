//! Actor wrapper serializing controller commands.
//!
//! The controller guarantees ordering through `&mut self`, but callers that
//! fire operations without awaiting each other still need a queue so that
//! resolutions land in call order even when network completions arrive out of
//! order. The service owns the controller on one task and fully awaits each
//! command before dequeuing the next.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::chat::controller::ConversationController;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::SessionId;
use crate::chat::core::message::Message;

/// Capacity of the command queue; senders beyond it wait their turn.
const COMMAND_QUEUE_CAPACITY: usize = 32;

/// Commands accepted by the service task.
enum Command {
    Activate {
        session_id: SessionId,
        known_messages: Vec<Message>,
        reply: oneshot::Sender<ChatResult<()>>,
    },
    Send {
        text: String,
        reply: oneshot::Sender<ChatResult<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Message>>,
    },
}

/// Owner of a controller task.
pub struct ChatService;

impl ChatService {
    /// Move `controller` onto its own task and return a cloneable handle.
    #[must_use]
    pub fn spawn(controller: ConversationController) -> ChatHandle {
        let (tx, mut rx) = mpsc::channel::<Command>(COMMAND_QUEUE_CAPACITY);

        drop(tokio::spawn(async move {
            let mut controller = controller;
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Activate {
                        session_id,
                        known_messages,
                        reply,
                    } => {
                        let result = controller.activate(session_id, known_messages).await;
                        if reply.send(result).is_err() {
                            debug!("Activate caller went away before the reply");
                        }
                    }
                    Command::Send { text, reply } => {
                        let result = controller.send_user_message(&text).await;
                        if reply.send(result).is_err() {
                            debug!("Send caller went away before the reply");
                        }
                    }
                    Command::Snapshot { reply } => {
                        if reply.send(controller.messages().to_vec()).is_err() {
                            debug!("Snapshot caller went away before the reply");
                        }
                    }
                }
            }
            debug!("Chat service stopped: all handles dropped");
        }));

        ChatHandle { tx }
    }
}

/// Handle for submitting commands to a running chat service.
#[derive(Clone)]
pub struct ChatHandle {
    tx: mpsc::Sender<Command>,
}

impl ChatHandle {
    /// Queue an activation and await its outcome.
    ///
    /// # Errors
    /// Returns the controller's error, or [`ChatError::ServiceStopped`] if
    /// the service task is gone.
    pub async fn activate(
        &self,
        session_id: SessionId,
        known_messages: Vec<Message>,
    ) -> ChatResult<()> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Activate {
                session_id,
                known_messages,
                reply,
            })
            .await
            .map_err(|_| ChatError::ServiceStopped)?;
        response.await.map_err(|_| ChatError::ServiceStopped)?
    }

    /// Queue a user send and await its resolution.
    ///
    /// Commands are processed strictly in submission order, so concurrent
    /// sends resolve in call order.
    ///
    /// # Errors
    /// Returns the controller's error, or [`ChatError::ServiceStopped`] if
    /// the service task is gone.
    pub async fn send_user_message(&self, text: impl Into<String>) -> ChatResult<()> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Send {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| ChatError::ServiceStopped)?;
        response.await.map_err(|_| ChatError::ServiceStopped)?
    }

    /// Fetch a copy of the current in-memory sequence.
    ///
    /// # Errors
    /// Returns [`ChatError::ServiceStopped`] if the service task is gone.
    pub async fn messages(&self) -> ChatResult<Vec<Message>> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| ChatError::ServiceStopped)?;
        response.await.map_err(|_| ChatError::ServiceStopped)
    }
}
