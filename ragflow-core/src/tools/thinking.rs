//! Scratchpad tool: lets the agent record an intermediate thought as an
//! explicit tool call rather than free text, so it shows up as a distinct
//! `agent_tool_call`/`agent_tool_result` pair in the event stream.
//!
//! Pure; has no side effects and never fails on well-formed input.

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

pub const TOOL_THINKING: &str = "thinking";

#[derive(Default)]
pub struct ThinkingTool;

impl ThinkingTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ThinkingTool {
    fn name(&self) -> &str {
        TOOL_THINKING
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_THINKING.to_string(),
            description: Some(
                "Record a reasoning step without taking any action. Does not affect retrieval state."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": { "thought": { "type": "string" } },
                "required": ["thought"]
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let thought = args
            .get("thought")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'thought'".to_string()))?;
        Ok(ToolCallContent { text: thought.to_string() })
    }
}
