//! `ChatModel` consumed interface: the chat-completion model the pipeline
//! and agent loop call into. Concrete provider adapters (OpenAI-compatible,
//! DashScope, etc.) are out of scope; this module defines the contract and a
//! scripted mock for tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::message::ChatMessage;

/// One requested tool call from the model.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Token usage for one call, when the provider reports it.
#[derive(Debug, Clone, Default)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of one chat-completion call.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<ChatUsage>,
}

/// Whether tool use is optional, disabled, or mandatory for this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    #[default]
    Auto,
    None,
    Required,
}

/// A declared tool the model may call.
#[derive(Debug, Clone)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub tools: Vec<ToolDeclaration>,
    pub tool_choice: ToolChoiceMode,
    pub temperature: f32,
}

/// One incremental token chunk during streaming.
#[derive(Debug, Clone)]
pub struct ChatChunk {
    pub content: String,
}

/// `ChatModel.Chat(ctx, messages, options) -> (ChatResponse, err)` and its
/// streaming variant yielding deltas.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse, CoreError>;

    /// Streaming variant. Default implementation calls [`ChatModel::chat`]
    /// and sends the full content as a single chunk when streaming is
    /// requested, mirroring non-streaming providers.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        chunk_tx: Option<mpsc::Sender<ChatChunk>>,
    ) -> Result<ChatResponse, CoreError> {
        let response = self.chat(messages, options).await?;
        if let Some(tx) = chunk_tx {
            if !response.content.is_empty() {
                let _ = tx.send(ChatChunk { content: response.content.clone() }).await;
            }
        }
        Ok(response)
    }
}

/// Fixed-response mock for tests and examples.
pub struct MockChatModel {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl MockChatModel {
    pub fn with_content(content: impl Into<String>) -> Self {
        Self { content: content.into(), tool_calls: Vec::new() }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn chat(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse, CoreError> {
        Ok(ChatResponse {
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            usage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_chat_stream_sends_single_chunk() {
        let model = MockChatModel::with_content("hello");
        let (tx, mut rx) = mpsc::channel(2);
        let resp = model.chat_stream(&[], &ChatOptions::default(), Some(tx)).await.unwrap();
        assert_eq!(resp.content, "hello");
        let chunk = rx.recv().await.unwrap();
        assert_eq!(chunk.content, "hello");
    }

    #[tokio::test]
    async fn default_chat_stream_skips_empty_content() {
        let model = MockChatModel::with_content("");
        let (tx, mut rx) = mpsc::channel(2);
        model.chat_stream(&[], &ChatOptions::default(), Some(tx)).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
