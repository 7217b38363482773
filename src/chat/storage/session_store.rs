//! SQLite-backed session store.
//!
//! The store is the sole writer of durable conversation state. It accepts a
//! full replacement of a session's message sequence keyed by session id,
//! updates the last-activity marker, and applies a suggested title only while
//! the stored title still equals the creation-time sentinel.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rusqlite::OptionalExtension;
use thiserror::Error;
use tokio_rusqlite::Connection;

use crate::chat::core::ids::SessionId;
use crate::chat::core::message::Message;
use crate::chat::core::session::{DEFAULT_SESSION_TITLE, SessionRecord};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error type for session store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// A stored row could not be mapped back to a domain value.
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Result type for session store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for durable session storage.
pub trait SessionStore: Send + Sync {
    /// Create a new, empty session record with the sentinel title.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn create(&self, id: SessionId, now_ms: i64) -> StoreFuture<'_, StoreResult<SessionRecord>>;

    /// List all non-archived sessions ordered by last activity, newest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_all(&self) -> StoreFuture<'_, StoreResult<Vec<SessionRecord>>>;

    /// Get a session record by id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_by_id(&self, id: SessionId) -> StoreFuture<'_, StoreResult<Option<SessionRecord>>>;

    /// Load a session's persisted message sequence in order.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn load_messages(&self, id: SessionId) -> StoreFuture<'_, StoreResult<Vec<Message>>>;

    /// Replace a session's message sequence wholesale.
    ///
    /// Upserts the session row if missing, touches the last-activity marker,
    /// and applies `suggested_title` only while the stored title is still the
    /// sentinel.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn replace_messages(
        &self,
        id: SessionId,
        messages: Vec<Message>,
        suggested_title: Option<String>,
        now_ms: i64,
    ) -> StoreFuture<'_, StoreResult<()>>;

    /// Update the title of a session unconditionally (user-driven rename).
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn rename(&self, id: SessionId, title: &str, now_ms: i64) -> StoreFuture<'_, StoreResult<()>>;

    /// Archive a session (soft delete).
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn archive(&self, id: SessionId) -> StoreFuture<'_, StoreResult<()>>;

    /// Permanently delete a session and its messages.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn delete_permanent(&self, id: SessionId) -> StoreFuture<'_, StoreResult<()>>;

    /// Check if a non-archived session exists.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn exists(&self, id: SessionId) -> StoreFuture<'_, StoreResult<bool>>;
}

/// `SQLite` implementation of the session store.
pub struct SqliteSessionStore {
    conn: Arc<Connection>,
    sessions: String,
    messages: String,
}

impl SqliteSessionStore {
    /// Table name for session records.
    pub const SESSIONS_TABLE: &'static str = "chat_sessions";
    /// Table name for message rows.
    pub const MESSAGES_TABLE: &'static str = "chat_messages";

    /// Initialize the store and create the tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if database operations fail.
    pub async fn new(conn: Arc<Connection>) -> StoreResult<Self> {
        let sessions = Self::SESSIONS_TABLE.to_string();
        let messages = Self::MESSAGES_TABLE.to_string();
        let sessions_table = sessions.clone();
        let messages_table = messages.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {sessions_table} (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    last_activity INTEGER NOT NULL,
                    message_count INTEGER NOT NULL DEFAULT 0,
                    is_archived INTEGER NOT NULL DEFAULT 0
                );
                CREATE INDEX IF NOT EXISTS idx_{sessions_table}_activity
                    ON {sessions_table} (is_archived, last_activity DESC);
                CREATE TABLE IF NOT EXISTS {messages_table} (
                    session_id TEXT NOT NULL,
                    seq INTEGER NOT NULL,
                    message_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    justification TEXT,
                    ts INTEGER NOT NULL,
                    PRIMARY KEY (session_id, seq)
                );"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            sessions,
            messages,
        })
    }

    fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, i64, i64, u32)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    fn into_record(raw: (String, String, i64, i64, u32)) -> StoreResult<SessionRecord> {
        let (id, title, created_at, last_activity, message_count) = raw;
        let id = SessionId::from_str(&id)
            .map_err(|err| StoreError::InvalidRecord(format!("invalid session id: {err}")))?;
        Ok(SessionRecord {
            id,
            title,
            created_at,
            last_activity,
            message_count,
        })
    }
}

impl SessionStore for SqliteSessionStore {
    fn create(&self, id: SessionId, now_ms: i64) -> StoreFuture<'_, StoreResult<SessionRecord>> {
        Box::pin(async move {
            let table = self.sessions.clone();
            let id_str = id.to_string();
            let record = SessionRecord::new(id, now_ms);

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (id, title, created_at, last_activity, message_count)
                             VALUES (?1, ?2, ?3, ?4, ?5)"
                        ),
                        rusqlite::params![id_str, DEFAULT_SESSION_TITLE, now_ms, now_ms, 0],
                    )?;
                    Ok(())
                })
                .await?;

            Ok(record)
        })
    }

    fn list_all(&self) -> StoreFuture<'_, StoreResult<Vec<SessionRecord>>> {
        Box::pin(async move {
            let table = self.sessions.clone();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, title, created_at, last_activity, message_count
                         FROM {table}
                         WHERE is_archived = 0
                         ORDER BY last_activity DESC
                         LIMIT 100"
                    ))?;
                    let rows = stmt
                        .query_map([], Self::map_record)?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(Self::into_record).collect()
        })
    }

    fn get_by_id(&self, id: SessionId) -> StoreFuture<'_, StoreResult<Option<SessionRecord>>> {
        Box::pin(async move {
            let table = self.sessions.clone();
            let id_str = id.to_string();
            let row = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, title, created_at, last_activity, message_count
                         FROM {table}
                         WHERE id = ?1 AND is_archived = 0"
                    ))?;
                    let row = stmt.query_row([&id_str], Self::map_record).optional()?;
                    Ok(row)
                })
                .await?;

            row.map(Self::into_record).transpose()
        })
    }

    fn load_messages(&self, id: SessionId) -> StoreFuture<'_, StoreResult<Vec<Message>>> {
        Box::pin(async move {
            let table = self.messages.clone();
            let id_str = id.to_string();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT message_id, role, content, justification, ts
                         FROM {table}
                         WHERE session_id = ?1
                         ORDER BY seq"
                    ))?;
                    let rows = stmt
                        .query_map([&id_str], |row| {
                            let message_id: String = row.get(0)?;
                            let role: String = row.get(1)?;
                            let content: String = row.get(2)?;
                            let justification: Option<String> = row.get(3)?;
                            let ts: i64 = row.get(4)?;
                            Ok((message_id, role, content, justification, ts))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            let mut messages = Vec::with_capacity(rows.len());
            for (message_id, role, content, justification, ts) in rows {
                let timestamp = Utc.timestamp_millis_opt(ts).single().ok_or_else(|| {
                    StoreError::InvalidRecord("invalid timestamp".to_string())
                })?;
                messages.push(Message {
                    id: message_id.parse().map_err(|err| {
                        StoreError::InvalidRecord(format!("invalid message id: {err}"))
                    })?,
                    role: role.parse().map_err(|err| {
                        StoreError::InvalidRecord(format!("invalid role: {err}"))
                    })?,
                    content,
                    justification,
                    timestamp,
                });
            }

            Ok(messages)
        })
    }

    fn replace_messages(
        &self,
        id: SessionId,
        messages: Vec<Message>,
        suggested_title: Option<String>,
        now_ms: i64,
    ) -> StoreFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let sessions = self.sessions.clone();
            let messages_table = self.messages.clone();
            let id_str = id.to_string();
            let count = u32::try_from(messages.len())
                .map_err(|_| StoreError::InvalidRecord("sequence too long".to_string()))?;

            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    {
                        tx.execute(
                            &format!(
                                "INSERT INTO {sessions}
                                     (id, title, created_at, last_activity, message_count)
                                 VALUES (?1, ?2, ?3, ?3, 0)
                                 ON CONFLICT(id) DO NOTHING"
                            ),
                            rusqlite::params![id_str, DEFAULT_SESSION_TITLE, now_ms],
                        )?;

                        tx.execute(
                            &format!("DELETE FROM {messages_table} WHERE session_id = ?1"),
                            rusqlite::params![id_str],
                        )?;

                        let mut stmt = tx.prepare(&format!(
                            "INSERT INTO {messages_table}
                                 (session_id, seq, message_id, role, content, justification, ts)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                        ))?;
                        for (seq, message) in messages.iter().enumerate() {
                            let seq = i64::try_from(seq).map_err(|err| {
                                tokio_rusqlite::Error::Other(Box::new(err))
                            })?;
                            stmt.execute(rusqlite::params![
                                id_str,
                                seq,
                                message.id.to_string(),
                                message.role.to_string(),
                                message.content,
                                message.justification,
                                message.timestamp.timestamp_millis(),
                            ])?;
                        }

                        tx.execute(
                            &format!(
                                "UPDATE {sessions}
                                 SET last_activity = ?1, message_count = ?2
                                 WHERE id = ?3"
                            ),
                            rusqlite::params![now_ms, count, id_str],
                        )?;

                        if let Some(title) = suggested_title {
                            let title = title.trim().to_string();
                            if !title.is_empty() {
                                tx.execute(
                                    &format!(
                                        "UPDATE {sessions} SET title = ?1
                                         WHERE id = ?2 AND title = ?3"
                                    ),
                                    rusqlite::params![title, id_str, DEFAULT_SESSION_TITLE],
                                )?;
                            }
                        }
                    }

                    tx.commit()?;
                    Ok(())
                })
                .await?;

            Ok(())
        })
    }

    fn rename(&self, id: SessionId, title: &str, now_ms: i64) -> StoreFuture<'_, StoreResult<()>> {
        let title = title.to_string();
        Box::pin(async move {
            let table = self.sessions.clone();
            let id_str = id.to_string();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "UPDATE {table} SET title = ?1, last_activity = ?2 WHERE id = ?3"
                        ),
                        rusqlite::params![title, now_ms, id_str],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn archive(&self, id: SessionId) -> StoreFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let table = self.sessions.clone();
            let id_str = id.to_string();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!("UPDATE {table} SET is_archived = 1 WHERE id = ?1"),
                        rusqlite::params![id_str],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn delete_permanent(&self, id: SessionId) -> StoreFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let sessions = self.sessions.clone();
            let messages = self.messages.clone();
            let id_str = id.to_string();
            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute(
                        &format!("DELETE FROM {messages} WHERE session_id = ?1"),
                        rusqlite::params![id_str],
                    )?;
                    tx.execute(
                        &format!("DELETE FROM {sessions} WHERE id = ?1"),
                        rusqlite::params![id_str],
                    )?;
                    tx.commit()?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn exists(&self, id: SessionId) -> StoreFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            let table = self.sessions.clone();
            let id_str = id.to_string();
            let exists = self
                .conn
                .call(move |conn| {
                    let count: i64 = conn.query_row(
                        &format!(
                            "SELECT COUNT(*) FROM {table} WHERE id = ?1 AND is_archived = 0"
                        ),
                        rusqlite::params![id_str],
                        |row| row.get(0),
                    )?;
                    Ok(count > 0)
                })
                .await?;
            Ok(exists)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteSessionStore {
        let conn = Arc::new(Connection::open_in_memory().await.unwrap());
        SqliteSessionStore::new(conn).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store().await;
        let id = SessionId::new();

        let record = store.create(id, 1_000).await.unwrap();
        assert_eq!(record.title, DEFAULT_SESSION_TITLE);

        let loaded = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.exists(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_orders_by_last_activity() {
        let store = store().await;
        let older = SessionId::new();
        let newer = SessionId::new();
        store.create(older, 1_000).await.unwrap();
        store.create(newer, 2_000).await.unwrap();

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer);
        assert_eq!(listed[1].id, older);
    }

    #[tokio::test]
    async fn test_replace_messages_roundtrip() {
        let store = store().await;
        let id = SessionId::new();
        store.create(id, 1_000).await.unwrap();

        let messages = vec![
            Message::user("Hi"),
            Message::assistant("Hello! How can I help?", Some("greeting".to_string())),
        ];
        store
            .replace_messages(id, messages.clone(), None, 2_000)
            .await
            .unwrap();

        let loaded = store.load_messages(id).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, messages[0].id);
        assert_eq!(loaded[0].content, "Hi");
        assert_eq!(loaded[1].justification.as_deref(), Some("greeting"));
        assert_eq!(
            loaded[1].timestamp.timestamp_millis(),
            messages[1].timestamp.timestamp_millis()
        );

        let record = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.message_count, 2);
        assert_eq!(record.last_activity, 2_000);
    }

    #[tokio::test]
    async fn test_replace_is_a_full_replacement() {
        let store = store().await;
        let id = SessionId::new();
        store.create(id, 1_000).await.unwrap();

        store
            .replace_messages(id, vec![Message::user("first")], None, 2_000)
            .await
            .unwrap();
        let replacement = vec![Message::user("second"), Message::assistant("ok", None)];
        store
            .replace_messages(id, replacement, None, 3_000)
            .await
            .unwrap();

        let loaded = store.load_messages(id).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "second");
    }

    #[tokio::test]
    async fn test_suggested_title_applies_only_to_sentinel() {
        let store = store().await;
        let id = SessionId::new();
        store.create(id, 1_000).await.unwrap();

        store
            .replace_messages(
                id,
                vec![Message::user("I need help")],
                Some("I need help".to_string()),
                2_000,
            )
            .await
            .unwrap();
        assert_eq!(
            store.get_by_id(id).await.unwrap().unwrap().title,
            "I need help"
        );

        // A later suggestion never overwrites an already-set title.
        store
            .replace_messages(
                id,
                vec![Message::user("Something else")],
                Some("Something else".to_string()),
                3_000,
            )
            .await
            .unwrap();
        assert_eq!(
            store.get_by_id(id).await.unwrap().unwrap().title,
            "I need help"
        );
    }

    #[tokio::test]
    async fn test_suggested_title_respects_manual_rename() {
        let store = store().await;
        let id = SessionId::new();
        store.create(id, 1_000).await.unwrap();
        store.rename(id, "My chat", 1_500).await.unwrap();

        store
            .replace_messages(
                id,
                vec![Message::user("Hello")],
                Some("Hello".to_string()),
                2_000,
            )
            .await
            .unwrap();
        assert_eq!(store.get_by_id(id).await.unwrap().unwrap().title, "My chat");
    }

    #[tokio::test]
    async fn test_replace_upserts_missing_session() {
        let store = store().await;
        let id = SessionId::new();

        store
            .replace_messages(id, vec![Message::user("Hi")], None, 2_000)
            .await
            .unwrap();

        let record = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.created_at, 2_000);
        assert_eq!(record.message_count, 1);
    }

    #[tokio::test]
    async fn test_archive_hides_from_list_and_exists() {
        let store = store().await;
        let id = SessionId::new();
        store.create(id, 1_000).await.unwrap();

        store.archive(id).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(!store.exists(id).await.unwrap());
        assert!(store.get_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_permanent_removes_messages() {
        let store = store().await;
        let id = SessionId::new();
        store.create(id, 1_000).await.unwrap();
        store
            .replace_messages(id, vec![Message::user("Hi")], None, 2_000)
            .await
            .unwrap();

        store.delete_permanent(id).await.unwrap();
        assert!(store.get_by_id(id).await.unwrap().is_none());
        assert!(store.load_messages(id).await.unwrap().is_empty());
    }
}
