//! Knowledge-base tools: `grep_chunks`, `knowledge_search`, `list_knowledge_chunks`,
//! `query_knowledge_graph`.
//!
//! All four share the hybrid search & merge pipeline (C3/C4); each one just
//! pins `SearchParams` to a single retriever type and a fixed failure mode.
//! Grounded on [`crate::search::hybrid_search`] and the retriever registry's
//! `active_engines` filtering.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::retriever::{FailureMode, RetrieverRegistry, RetrieverType, SearchParams};
use crate::search::{hybrid_search, PriorityTagConfig};
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

fn string_array(args: &serde_json::Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn query_text(args: &serde_json::Value) -> Result<String, ToolSourceError> {
    args.get("query")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| ToolSourceError::InvalidInput("missing 'query'".to_string()))
}

fn top_n(args: &serde_json::Value, default: usize) -> usize {
    args.get("top_n")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(default)
}

fn render_results(results: &[crate::model::SearchResult]) -> String {
    if results.is_empty() {
        return "no matching chunks".to_string();
    }
    results
        .iter()
        .map(|r| format!("[{}] {} (score={:.3})", r.chunk_id, r.content, r.score))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn run_search(
    registry: &RetrieverRegistry,
    enabled: RetrieverType,
    params: SearchParams,
) -> Result<Vec<crate::model::SearchResult>, ToolSourceError> {
    let mut enabled_set = HashSet::new();
    enabled_set.insert(enabled);
    hybrid_search(
        registry,
        &params,
        &enabled_set,
        &PriorityTagConfig::default(),
        FailureMode::BestEffort,
        None,
    )
    .await
    .map_err(|e| ToolSourceError::Transport(e.to_string()))
}

/// Keyword ("grep") search over enabled knowledge bases.
pub const TOOL_GREP_CHUNKS: &str = "grep_chunks";

pub struct GrepChunksTool {
    registry: Arc<RetrieverRegistry>,
}

impl GrepChunksTool {
    pub fn new(registry: Arc<RetrieverRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for GrepChunksTool {
    fn name(&self) -> &str {
        TOOL_GREP_CHUNKS
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_GREP_CHUNKS.to_string(),
            description: Some("Keyword search over chunks in the given knowledge bases.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "knowledge_base_ids": { "type": "array", "items": { "type": "string" } },
                    "top_n": { "type": "integer" }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let params = SearchParams {
            query_text: query_text(&args)?,
            knowledge_ids: string_array(&args, "knowledge_base_ids"),
            match_count: top_n(&args, 10),
            disable_vector_match: true,
            disable_graph_match: true,
            disable_web_match: true,
            ..Default::default()
        };
        let results = run_search(&self.registry, RetrieverType::Keywords, params).await?;
        Ok(ToolCallContent { text: render_results(&results) })
    }
}

/// Semantic (vector) search over enabled knowledge bases.
pub const TOOL_KNOWLEDGE_SEARCH: &str = "knowledge_search";

pub struct KnowledgeSearchTool {
    registry: Arc<RetrieverRegistry>,
}

impl KnowledgeSearchTool {
    pub fn new(registry: Arc<RetrieverRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        TOOL_KNOWLEDGE_SEARCH
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_KNOWLEDGE_SEARCH.to_string(),
            description: Some("Semantic search over chunks in the given knowledge bases.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "knowledge_base_ids": { "type": "array", "items": { "type": "string" } },
                    "top_n": { "type": "integer" }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let params = SearchParams {
            query_text: query_text(&args)?,
            knowledge_ids: string_array(&args, "knowledge_base_ids"),
            match_count: top_n(&args, 10),
            disable_keyword_match: true,
            disable_graph_match: true,
            disable_web_match: true,
            ..Default::default()
        };
        let results = run_search(&self.registry, RetrieverType::Vector, params).await?;
        Ok(ToolCallContent { text: render_results(&results) })
    }
}

/// Deep-read: fetch the full content of specific chunks by id.
///
/// There is no dedicated by-id lookup on [`crate::retriever::RetrieveEngine`];
/// this runs a broad retrieve scoped to the knowledge base and filters down
/// to the requested chunk ids client-side.
pub const TOOL_LIST_KNOWLEDGE_CHUNKS: &str = "list_knowledge_chunks";

pub struct ListKnowledgeChunksTool {
    registry: Arc<RetrieverRegistry>,
}

impl ListKnowledgeChunksTool {
    pub fn new(registry: Arc<RetrieverRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ListKnowledgeChunksTool {
    fn name(&self) -> &str {
        TOOL_LIST_KNOWLEDGE_CHUNKS
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_LIST_KNOWLEDGE_CHUNKS.to_string(),
            description: Some("Fetch full chunk content for a set of chunk ids.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "knowledge_base_ids": { "type": "array", "items": { "type": "string" } },
                    "chunk_ids": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["chunk_ids"]
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let chunk_ids: HashSet<String> = string_array(&args, "chunk_ids").into_iter().collect();
        if chunk_ids.is_empty() {
            return Err(ToolSourceError::InvalidInput("missing 'chunk_ids'".to_string()));
        }
        let params = SearchParams {
            knowledge_ids: string_array(&args, "knowledge_base_ids"),
            match_count: 0,
            disable_graph_match: true,
            disable_web_match: true,
            ..Default::default()
        };
        let mut enabled = HashSet::new();
        enabled.insert(RetrieverType::Vector);
        enabled.insert(RetrieverType::Keywords);
        let results = hybrid_search(
            &self.registry,
            &params,
            &enabled,
            &PriorityTagConfig::default(),
            FailureMode::BestEffort,
            None,
        )
        .await
        .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let matched: Vec<_> = results.into_iter().filter(|r| chunk_ids.contains(&r.chunk_id)).collect();
        Ok(ToolCallContent { text: render_results(&matched) })
    }
}

/// Graph-relation search over a knowledge graph index.
pub const TOOL_QUERY_KNOWLEDGE_GRAPH: &str = "query_knowledge_graph";

pub struct QueryKnowledgeGraphTool {
    registry: Arc<RetrieverRegistry>,
}

impl QueryKnowledgeGraphTool {
    pub fn new(registry: Arc<RetrieverRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for QueryKnowledgeGraphTool {
    fn name(&self) -> &str {
        TOOL_QUERY_KNOWLEDGE_GRAPH
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_QUERY_KNOWLEDGE_GRAPH.to_string(),
            description: Some("Query the knowledge graph for entities and relations related to the query.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "knowledge_base_ids": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let params = SearchParams {
            query_text: query_text(&args)?,
            knowledge_ids: string_array(&args, "knowledge_base_ids"),
            match_count: top_n(&args, 10),
            disable_vector_match: true,
            disable_keyword_match: true,
            disable_web_match: true,
            ..Default::default()
        };
        let results = run_search(&self.registry, RetrieverType::Graph, params).await?;
        Ok(ToolCallContent { text: render_results(&results) })
    }
}
