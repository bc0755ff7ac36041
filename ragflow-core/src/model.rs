//! Domain data model shared across the pipeline, agent loop, and facade.
//!
//! These are the entities the core reasons about; surrounding entities
//! (tenant, user, knowledge-base, chunk, model) stay opaque string ids owned
//! by the repository layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable identifier of a multi-turn dialog. Belongs to exactly one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub tenant_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One turn (user or assistant) in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub request_id: String,
    pub role: MessageRole,
    pub content: String,
    pub is_completed: bool,
    pub knowledge_references: Vec<SearchResult>,
    pub agent_steps: Vec<AgentStep>,
    pub mentioned_items: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new_user(id: impl Into<String>, session_id: impl Into<String>, request_id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            session_id: session_id.into(),
            request_id: request_id.into(),
            role: MessageRole::User,
            content: content.into(),
            is_completed: true,
            knowledge_references: Vec::new(),
            agent_steps: Vec::new(),
            mentioned_items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Assistant messages always start incomplete; exactly one transition to
    /// `is_completed = true` is expected over the message's lifetime.
    pub fn new_assistant(id: impl Into<String>, session_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            session_id: session_id.into(),
            request_id: request_id.into(),
            role: MessageRole::Assistant,
            content: String::new(),
            is_completed: false,
            knowledge_references: Vec::new(),
            agent_steps: Vec::new(),
            mentioned_items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Vector,
    Keyword,
    Graph,
    Web,
    Parent,
    Relation,
    History,
    DirectLoad,
    DataAnalysis,
}

/// A single retrieved unit of content. Score is comparable only within the
/// same `match_type` unless normalized by the merge stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub content: String,
    pub knowledge_id: String,
    pub knowledge_title: Option<String>,
    pub chunk_index: u32,
    pub start_offset: u32,
    pub end_offset: u32,
    pub score: f32,
    pub match_type: MatchType,
    pub chunk_type: Option<String>,
    pub parent_chunk_id: Option<String>,
    pub image_info: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub knowledge_filename: Option<String>,
    pub knowledge_source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Chunk,
    Passage,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeBaseType {
    Document,
    Faq,
}

/// Write side of retrieval: what gets indexed into a retriever engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub id: String,
    pub content: String,
    pub source_type: SourceType,
    pub chunk_id: String,
    pub knowledge_id: String,
    pub knowledge_base_id: String,
    pub knowledge_base_type: KnowledgeBaseType,
    pub tag_id: Option<String>,
    pub is_enabled: bool,
}

/// Kind of [`AgentStep`], mirroring the ReAct transitions in the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStepKind {
    Thought,
    ToolCall,
    ToolResult,
    Reflection,
    Answer,
}

/// One recorded transition of the agent loop. Steps are appended in strictly
/// increasing `index` within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub index: u32,
    pub kind: AgentStepKind,
    pub content: String,
    pub tool_name: Option<String>,
    pub tool_args: Option<serde_json::Value>,
    pub tool_output: Option<String>,
    pub duration_ms: Option<u64>,
    pub success: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Pending,
    Running,
    Success,
    Failed,
}

/// Snapshot of one evaluation run, used by the testing/evaluation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationTask {
    pub id: String,
    pub tenant_id: String,
    pub dataset_id: String,
    pub status: EvaluationStatus,
    pub total: u32,
    pub finished: u32,
    pub err_msg: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationDetail {
    pub task_id: String,
    pub metric_name: String,
    pub metric_value: f64,
}
