//! Stream Manager (C2): append-only, offset-indexed event log per
//! `(session_id, message_id)`, backing the SSE wire protocol in §6.
//!
//! Two implementations share the [`StreamManager`] trait: [`InMemoryStreamManager`]
//! (process-local, used with a single replica) and an external log/cache
//! backend (e.g. Redis-backed) implemented outside this crate and selected
//! at deploy time via `STREAM_MANAGER_TYPE`.

mod in_memory;

pub use in_memory::InMemoryStreamManager;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::SearchResult;

/// Wire-level kind of a [`StreamEvent`]; `response_type` on the SSE wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Answer,
    Thinking,
    ToolCall,
    ToolResult,
    References,
    Reflection,
    SessionTitle,
    AgentQuery,
    Complete,
    Error,
    Stop,
}

/// One entry in a stream slot's append-only log. Once an event with
/// `response_type = complete` and `done = true` is appended, no further
/// non-`session_title` events may be appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: String,
    pub response_type: ResponseType,
    pub content: Option<String>,
    pub done: bool,
    pub session_id: Option<String>,
    pub assistant_message_id: Option<String>,
    pub knowledge_references: Option<Vec<SearchResult>>,
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    pub fn new(id: impl Into<String>, response_type: ResponseType) -> Self {
        Self {
            id: id.into(),
            response_type,
            content: None,
            done: false,
            session_id: None,
            assistant_message_id: None,
            knowledge_references: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    /// Renders the SSE wire line: `event: message\ndata: <json>\n\n`.
    pub fn to_sse_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("event: message\ndata: {}\n\n", json))
    }
}

/// Append-only event log keyed by `(session_id, message_id)`. Implementations
/// must uphold: dense zero-based offsets, total order within a slot, and
/// `complete` as terminal (save for a late `session_title`).
#[async_trait]
pub trait StreamManager: Send + Sync {
    async fn append_event(
        &self,
        session_id: &str,
        message_id: &str,
        event: StreamEvent,
    ) -> Result<(), CoreError>;

    /// Returns events strictly after `from_offset` plus the new high-water
    /// offset. Never blocks; returns an empty slice (and the same offset) if
    /// nothing new has been appended.
    async fn get_events(
        &self,
        session_id: &str,
        message_id: &str,
        from_offset: u64,
    ) -> Result<(Vec<StreamEvent>, u64), CoreError>;
}
