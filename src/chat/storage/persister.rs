//! Bridge from controller update notifications to the session store.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::chat::notify::UpdateReceiver;

use super::session_store::SessionStore;

/// Applies every update notification to the store as one upsert.
///
/// The controller already deduplicates notifications by structural
/// inequality, so the store is written at most once per net content change.
/// Store failures are logged and non-fatal: the conversation keeps flowing
/// and the next net change retries the write implicitly.
pub struct StorePersister {
    store: Arc<dyn SessionStore>,
}

impl StorePersister {
    /// Create a persister writing through `store`.
    #[must_use]
    pub const fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Drain `updates` until the channel closes, persisting each one.
    pub async fn run(self, mut updates: UpdateReceiver) {
        while let Some(update) = updates.recv().await {
            let now_ms = Utc::now().timestamp_millis();
            if let Err(err) = self
                .store
                .replace_messages(
                    update.session_id,
                    update.messages,
                    update.suggested_title,
                    now_ms,
                )
                .await
            {
                warn!(
                    "Could not save message updates for session {}: {}",
                    update.session_id, err
                );
            }
        }
        debug!("Update channel closed; persister stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::ids::SessionId;
    use crate::chat::core::message::Message;
    use crate::chat::core::session::DEFAULT_SESSION_TITLE;
    use crate::chat::notify::{ConversationUpdate, update_channel};
    use crate::chat::storage::session_store::SqliteSessionStore;

    use tokio_rusqlite::Connection;

    async fn store() -> Arc<SqliteSessionStore> {
        let conn = Arc::new(Connection::open_in_memory().await.unwrap());
        Arc::new(SqliteSessionStore::new(conn).await.unwrap())
    }

    #[tokio::test]
    async fn test_updates_are_persisted_in_order() {
        let store = store().await;
        let (tx, rx) = update_channel();
        let session_id = SessionId::new();

        let first = vec![Message::user("Hi")];
        let mut second = first.clone();
        second.push(Message::assistant("Hello!", None));

        tx.send(ConversationUpdate {
            session_id,
            messages: first,
            suggested_title: Some("Hi".to_string()),
        })
        .unwrap();
        tx.send(ConversationUpdate {
            session_id,
            messages: second.clone(),
            suggested_title: None,
        })
        .unwrap();
        drop(tx);

        StorePersister::new(store.clone()).run(rx).await;

        let loaded = store.load_messages(session_id).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].content, "Hello!");

        let record = store.get_by_id(session_id).await.unwrap().unwrap();
        assert_eq!(record.title, "Hi");
        assert_eq!(record.message_count, 2);
    }

    #[tokio::test]
    async fn test_title_suggestion_does_not_overwrite_existing() {
        let store = store().await;
        let session_id = SessionId::new();
        store.create(session_id, 1_000).await.unwrap();
        store.rename(session_id, "Kept", 1_500).await.unwrap();

        let (tx, rx) = update_channel();
        tx.send(ConversationUpdate {
            session_id,
            messages: vec![Message::user("Hello")],
            suggested_title: Some("Hello".to_string()),
        })
        .unwrap();
        drop(tx);

        StorePersister::new(store.clone()).run(rx).await;

        let record = store.get_by_id(session_id).await.unwrap().unwrap();
        assert_eq!(record.title, "Kept");
        assert_ne!(record.title, DEFAULT_SESSION_TITLE);
    }
}
