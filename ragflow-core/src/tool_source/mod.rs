//! Tool source registry: the contract the agent loop (C7) dispatches tool
//! calls through.
//!
//! Grounded on the `ToolSource`/`AggregateToolSource` shape used elsewhere in
//! this codebase (`list_tools`, `call_tool`, `call_tool_with_context`,
//! `set_call_context`, backed by an aggregate that registers individual
//! [`crate::tools::Tool`] implementations).

mod aggregate;
mod context;

pub use aggregate::AggregateToolSource;
pub use context::ToolCallContext;

use async_trait::async_trait;
use thiserror::Error;

/// Tool description surfaced to the chat model's tool-calling API.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Result of a successful tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallContent {
    pub text: String,
}

#[derive(Debug, Error)]
pub enum ToolSourceError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid tool input: {0}")]
    InvalidInput(String),
    #[error("tool transport error: {0}")]
    Transport(String),
}

/// A set of callable tools available to the agent loop for one run.
#[async_trait]
pub trait ToolSource: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallContent, ToolSourceError>;

    async fn call_tool_with_context(
        &self,
        name: &str,
        arguments: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError>;

    /// Stores per-step context (recent messages, tenant/session ids) so
    /// context-aware tools can read it in `call_tool`. No-op by default.
    fn set_call_context(&self, _ctx: Option<ToolCallContext>) {}
}
