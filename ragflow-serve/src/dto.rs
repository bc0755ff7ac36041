//! Request/response bodies for the §6 HTTP contract. Field names mirror
//! spec.md §6's wire vocabulary directly (`query`, `knowledge_base_ids`,
//! `agent_enabled`, ...).

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ChatTurnBody {
    pub query: String,
    #[serde(default)]
    pub knowledge_base_ids: Vec<String>,
    #[serde(default)]
    pub knowledge_ids: Vec<String>,
    #[serde(default)]
    pub agent_enabled: bool,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub web_search_enabled: bool,
    #[serde(default)]
    pub mentioned_items: Vec<String>,
    #[serde(default)]
    pub summary_model_id: Option<String>,
    #[serde(default = "default_true")]
    pub disable_title: bool,
}

#[derive(Debug, Deserialize)]
pub struct ContinueStreamQuery {
    pub message_id: String,
    #[serde(default)]
    pub from_offset: u64,
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeSearchBody {
    pub query: String,
    #[serde(default)]
    pub knowledge_base_ids: Vec<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    #[serde(default)]
    pub vector_threshold: Option<f32>,
    #[serde(default)]
    pub keyword_threshold: Option<f32>,
    #[serde(default)]
    pub match_count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct KnowledgeSearchResponse {
    pub results: Vec<ragflow_core::model::SearchResult>,
}
