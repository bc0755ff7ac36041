//! SQLite-backed [`SessionStore`] and [`MessageStore`] implementations.
//!
//! Grounded on the teacher's workspace store: a `rusqlite::Connection` behind
//! an `Arc<Mutex<_>>`, with blocking calls wrapped in
//! `tokio::task::block_in_place` since `rusqlite` has no async driver.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragflow_core::model::{AgentStep, MessageRole, SearchResult};
use ragflow_core::persistence::{MessageStore, PersistenceError, SessionStore};
use ragflow_core::{Message, Session};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage: {0}")]
    Storage(String),
}

impl From<StoreError> for PersistenceError {
    fn from(e: StoreError) -> Self {
        PersistenceError::Other(e.to_string())
    }
}

fn role_to_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

fn role_from_str(s: &str) -> MessageRole {
    match s {
        "assistant" => MessageRole::Assistant,
        _ => MessageRole::User,
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

/// Shared SQLite connection implementing both persistence contracts.
/// `Clone` is shallow (shares the same connection) so callers can hand one
/// `Arc<dyn SessionStore>` and one `Arc<dyn MessageStore>` to the facade from
/// a single opened database.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteStore {
    /// Opens or creates the database and tables.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(path.as_ref()).map_err(|e| StoreError::Storage(e.to_string()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                title TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                request_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                is_completed INTEGER NOT NULL,
                knowledge_references TEXT NOT NULL,
                agent_steps TEXT NOT NULL,
                mentioned_items TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages(session_id);
            "#,
        )
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(Self { db: Arc::new(Mutex::new(conn)) })
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create(&self, session: &Session) -> Result<(), PersistenceError> {
        let db = self.db.clone();
        let session = session.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("lock".into()))?;
            conn.execute(
                "INSERT INTO sessions (id, tenant_id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    session.id,
                    session.tenant_id,
                    session.title,
                    session.created_at.to_rfc3339(),
                    session.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok::<_, StoreError>(())
        })
        .map_err(Into::into)
    }

    async fn get(&self, session_id: &str) -> Result<Session, PersistenceError> {
        let db = self.db.clone();
        let session_id = session_id.to_string();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("lock".into()))?;
            conn.query_row(
                "SELECT id, tenant_id, title, created_at, updated_at FROM sessions WHERE id = ?1",
                rusqlite::params![session_id],
                |row| {
                    Ok(Session {
                        id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        title: row.get(2)?,
                        created_at: parse_time(&row.get::<_, String>(3)?),
                        updated_at: parse_time(&row.get::<_, String>(4)?),
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::Storage(format!("session not found: {session_id}")),
                other => StoreError::Storage(other.to_string()),
            })
        })
        .map_err(|e| PersistenceError::NotFound(e.to_string()))
    }

    async fn set_title(&self, session_id: &str, title: &str) -> Result<(), PersistenceError> {
        let db = self.db.clone();
        let session_id = session_id.to_string();
        let title = title.to_string();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("lock".into()))?;
            conn.execute(
                "UPDATE sessions SET title = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![title, Utc::now().to_rfc3339(), session_id],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok::<_, StoreError>(())
        })
        .map_err(Into::into)
    }
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let knowledge_references: String = row.get(6)?;
    let agent_steps: String = row.get(7)?;
    let mentioned_items: String = row.get(8)?;
    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        request_id: row.get(2)?,
        role: role_from_str(&row.get::<_, String>(3)?),
        content: row.get(4)?,
        is_completed: row.get::<_, i64>(5)? != 0,
        knowledge_references: serde_json::from_str::<Vec<SearchResult>>(&knowledge_references).unwrap_or_default(),
        agent_steps: serde_json::from_str::<Vec<AgentStep>>(&agent_steps).unwrap_or_default(),
        mentioned_items: serde_json::from_str::<Vec<String>>(&mentioned_items).unwrap_or_default(),
        created_at: parse_time(&row.get::<_, String>(9)?),
        updated_at: parse_time(&row.get::<_, String>(10)?),
    })
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn create(&self, message: &Message) -> Result<(), PersistenceError> {
        let db = self.db.clone();
        let message = message.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("lock".into()))?;
            conn.execute(
                "INSERT INTO messages (id, session_id, request_id, role, content, is_completed, knowledge_references, agent_steps, mentioned_items, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    message.id,
                    message.session_id,
                    message.request_id,
                    role_to_str(message.role),
                    message.content,
                    message.is_completed as i64,
                    serde_json::to_string(&message.knowledge_references).unwrap_or_default(),
                    serde_json::to_string(&message.agent_steps).unwrap_or_default(),
                    serde_json::to_string(&message.mentioned_items).unwrap_or_default(),
                    message.created_at.to_rfc3339(),
                    message.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok::<_, StoreError>(())
        })
        .map_err(Into::into)
    }

    async fn update(&self, message: &Message) -> Result<(), PersistenceError> {
        let db = self.db.clone();
        let message = message.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("lock".into()))?;
            conn.execute(
                "UPDATE messages SET content = ?1, is_completed = ?2, knowledge_references = ?3, agent_steps = ?4, mentioned_items = ?5, updated_at = ?6 WHERE id = ?7",
                rusqlite::params![
                    message.content,
                    message.is_completed as i64,
                    serde_json::to_string(&message.knowledge_references).unwrap_or_default(),
                    serde_json::to_string(&message.agent_steps).unwrap_or_default(),
                    serde_json::to_string(&message.mentioned_items).unwrap_or_default(),
                    Utc::now().to_rfc3339(),
                    message.id,
                ],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok::<_, StoreError>(())
        })
        .map_err(Into::into)
    }

    async fn get(&self, message_id: &str) -> Result<Message, PersistenceError> {
        let db = self.db.clone();
        let message_id = message_id.to_string();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("lock".into()))?;
            conn.query_row(
                "SELECT id, session_id, request_id, role, content, is_completed, knowledge_references, agent_steps, mentioned_items, created_at, updated_at
                 FROM messages WHERE id = ?1",
                rusqlite::params![message_id],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::Storage(format!("message not found: {message_id}")),
                other => StoreError::Storage(other.to_string()),
            })
        })
        .map_err(|e| PersistenceError::NotFound(e.to_string()))
    }

    async fn list_by_session(&self, session_id: &str, limit: Option<u32>) -> Result<Vec<Message>, PersistenceError> {
        let db = self.db.clone();
        let session_id = session_id.to_string();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("lock".into()))?;
            let sql = "SELECT id, session_id, request_id, role, content, is_completed, knowledge_references, agent_steps, mentioned_items, created_at, updated_at
                       FROM messages WHERE session_id = ?1 ORDER BY created_at ASC";
            let mut stmt = conn.prepare(sql).map_err(|e| StoreError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![session_id], row_to_message)
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            let mut messages = rows.collect::<Result<Vec<_>, _>>().map_err(|e| StoreError::Storage(e.to_string()))?;
            if let Some(limit) = limit {
                messages.truncate(limit as usize);
            }
            Ok::<_, StoreError>(messages)
        })
        .map_err(Into::into)
    }
}
