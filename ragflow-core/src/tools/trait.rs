use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};

/// Represents a single tool that can be called by the LLM.
///
/// Each tool has a unique name, a specification (description and JSON schema),
/// and implements the call logic. Tools are registered with an
/// [`crate::tool_source::AggregateToolSource`] and dispatched by the agent loop.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use ragflow_core::tools::Tool;
/// use ragflow_core::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
///
/// struct MyTool;
///
/// #[async_trait]
/// impl Tool for MyTool {
///     fn name(&self) -> &str {
///         "my_tool"
///     }
///
///     fn spec(&self) -> ToolSpec {
///         ToolSpec {
///             name: "my_tool".to_string(),
///             description: Some("A sample tool".to_string()),
///             input_schema: serde_json::json!({}),
///         }
///     }
///
///     async fn call(
///         &self,
///         args: Value,
///         _ctx: Option<&ToolCallContext>,
///     ) -> Result<ToolCallContent, ToolSourceError> {
///         Ok(ToolCallContent {
///             text: "tool executed".to_string(),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of this tool.
    ///
    /// Must be unique across all tools registered in one source.
    fn name(&self) -> &str;

    /// Returns the specification for this tool: name, description (for the
    /// LLM), and JSON schema for arguments.
    fn spec(&self) -> ToolSpec;

    /// Executes the tool with the given arguments and optional per-call
    /// context (recent messages, tenant/session ids).
    async fn call(
        &self,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError>;
}
