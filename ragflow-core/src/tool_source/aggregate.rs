//! Aggregates individually-registered [`crate::tools::Tool`] implementations
//! behind one [`ToolSource`].

use dashmap::DashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
use crate::tools::Tool;

#[derive(Default)]
pub struct AggregateToolSource {
    tools: DashMap<String, Arc<dyn Tool>>,
    call_context: RwLock<Option<ToolCallContext>>,
}

impl AggregateToolSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolSourceError> {
        self.tools
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ToolSourceError::NotFound(name.to_string()))
    }
}

#[async_trait]
impl ToolSource for AggregateToolSource {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        Ok(self.tools.iter().map(|entry| entry.value().spec()).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let ctx = self.call_context.read().unwrap().clone();
        self.get(name)?.call(arguments, ctx.as_ref()).await
    }

    async fn call_tool_with_context(
        &self,
        name: &str,
        arguments: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        self.get(name)?.call(arguments, ctx).await
    }

    fn set_call_context(&self, ctx: Option<ToolCallContext>) {
        *self.call_context.write().unwrap() = ctx;
    }
}
