//! Session and message persistence contracts.
//!
//! Grounded on the teacher's `UserMessageStore` trait shape (append/list,
//! `NoOp` default) generalized to two stores: sessions (tenant ownership,
//! title) and messages (ordered turns within a session). Concrete SQLite
//! implementations live in the store crate; this crate only drives the
//! contract and ships a `NoOp` pair for tests and examples.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Message, Session};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("persistence error: {0}")]
    Other(String),
}

/// Stores [`Session`] rows and resolves tenant ownership for request
/// validation (SPEC_FULL §4.8 step 1).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &Session) -> Result<(), PersistenceError>;
    async fn get(&self, session_id: &str) -> Result<Session, PersistenceError>;
    async fn set_title(&self, session_id: &str, title: &str) -> Result<(), PersistenceError>;

    /// Returns `Ok(())` only if `session_id` belongs to `tenant_id`.
    async fn assert_owned_by(&self, session_id: &str, tenant_id: &str) -> Result<(), PersistenceError> {
        let session = self.get(session_id).await?;
        if session.tenant_id != tenant_id {
            return Err(PersistenceError::NotFound(session_id.to_string()));
        }
        Ok(())
    }
}

/// Stores [`Message`] rows: the user turn and the (initially incomplete)
/// assistant turn created at the start of a chat turn, later updated in
/// place as content streams in.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(&self, message: &Message) -> Result<(), PersistenceError>;
    async fn update(&self, message: &Message) -> Result<(), PersistenceError>;
    async fn get(&self, message_id: &str) -> Result<Message, PersistenceError>;
    async fn list_by_session(&self, session_id: &str, limit: Option<u32>) -> Result<Vec<Message>, PersistenceError>;
}

/// Title, filename, and source for one knowledge base, looked up in bulk
/// after search/merge rather than per-result (SPEC_FULL §4.4 step 4).
#[derive(Debug, Clone, Default)]
pub struct KnowledgeMetadata {
    pub title: Option<String>,
    pub filename: Option<String>,
    pub source: Option<String>,
}

/// Resolves display metadata for knowledge bases. A single `get_many` call
/// covers every distinct `knowledge_id` a merged result set touches, instead
/// of one lookup per `SearchResult`.
#[async_trait]
pub trait KnowledgeMetadataStore: Send + Sync {
    async fn get_many(&self, knowledge_ids: &[String]) -> Result<HashMap<String, KnowledgeMetadata>, PersistenceError>;
}

/// No-op knowledge metadata store: reports no metadata for any id. Used for
/// examples and tests that do not exercise a knowledge base registry.
#[derive(Debug, Default)]
pub struct NoOpKnowledgeMetadataStore;

#[async_trait]
impl KnowledgeMetadataStore for NoOpKnowledgeMetadataStore {
    async fn get_many(&self, _knowledge_ids: &[String]) -> Result<HashMap<String, KnowledgeMetadata>, PersistenceError> {
        Ok(HashMap::new())
    }
}

/// No-op session store: every write succeeds, `get` always reports an empty
/// tenant-owned session. Used for examples and tests that do not exercise
/// persistence.
#[derive(Debug, Default)]
pub struct NoOpSessionStore;

#[async_trait]
impl SessionStore for NoOpSessionStore {
    async fn create(&self, _session: &Session) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Session, PersistenceError> {
        let now = chrono::Utc::now();
        Ok(Session {
            id: session_id.to_string(),
            tenant_id: String::new(),
            title: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn set_title(&self, _session_id: &str, _title: &str) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn assert_owned_by(&self, _session_id: &str, _tenant_id: &str) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// No-op message store: `create`/`update` succeed without storing anything;
/// `get`/`list_by_session` report empty.
#[derive(Debug, Default)]
pub struct NoOpMessageStore;

#[async_trait]
impl MessageStore for NoOpMessageStore {
    async fn create(&self, _message: &Message) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn update(&self, _message: &Message) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn get(&self, message_id: &str) -> Result<Message, PersistenceError> {
        Err(PersistenceError::NotFound(message_id.to_string()))
    }

    async fn list_by_session(&self, _session_id: &str, _limit: Option<u32>) -> Result<Vec<Message>, PersistenceError> {
        Ok(vec![])
    }
}
