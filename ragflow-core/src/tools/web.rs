//! Web tools: `web_fetch` (HTTP GET via `reqwest`) and `web_search` (delegates
//! to a consumed [`WebSearchProvider`] collaborator, same shape as
//! [`crate::embedder::Embedder`] and [`crate::llm::ChatModel`]: the concrete
//! search backend lives outside this crate).

use async_trait::async_trait;
use serde_json::json;

use crate::error::CoreError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

const MAX_FETCH_BODY_BYTES: usize = 64 * 1024;

pub const TOOL_WEB_FETCH: &str = "web_fetch";

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WebFetchTool {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        TOOL_WEB_FETCH
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_WEB_FETCH.to_string(),
            description: Some("Fetch the content at a URL over HTTP GET.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": { "url": { "type": "string" } },
                "required": ["url"]
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'url'".to_string()))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("fetch {} failed: {}", url, e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("reading body from {} failed: {}", url, e)))?;
        let truncated: String = body.chars().take(MAX_FETCH_BODY_BYTES).collect();
        if !status.is_success() {
            return Err(ToolSourceError::Transport(format!("{} returned {}", url, status)));
        }
        Ok(ToolCallContent { text: truncated })
    }
}

/// One hit returned by a web search backend.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WebSearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Consumed interface for web search backends (e.g. a hosted search API).
/// Concrete implementations live outside this crate.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<WebSearchHit>, CoreError>;
}

pub const TOOL_WEB_SEARCH: &str = "web_search";

pub struct WebSearchTool {
    provider: std::sync::Arc<dyn WebSearchProvider>,
}

impl WebSearchTool {
    pub fn new(provider: std::sync::Arc<dyn WebSearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        TOOL_WEB_SEARCH
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_WEB_SEARCH.to_string(),
            description: Some("Search the web and return titled snippets with source URLs.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "top_k": { "type": "integer" }
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
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'query'".to_string()))?;
        let top_k = args.get("top_k").and_then(|v| v.as_u64()).unwrap_or(5) as usize;
        let hits = self
            .provider
            .search(query, top_k)
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        if hits.is_empty() {
            return Ok(ToolCallContent { text: "no results".to_string() });
        }
        let text = hits
            .iter()
            .map(|h| format!("{} — {}\n{}", h.title, h.url, h.snippet))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(ToolCallContent { text })
    }
}
