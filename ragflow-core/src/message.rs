//! Chat message types passed to [`crate::llm::ChatModel`].
//!
//! Roles: system prompt (first in the list), user input, assistant reply,
//! and tool result (fed back to the model after a tool call completes).

use serde::{Deserialize, Serialize};

/// One entry in the message history sent to a chat model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    /// Result of a tool call, keyed by the call id the model produced.
    Tool { call_id: String, content: String },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: content.into() }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool { call_id: call_id.into(), content: content.into() }
    }

    /// Text content regardless of role, used when rendering compacted history.
    pub fn content(&self) -> &str {
        match self {
            ChatMessage::System { content }
            | ChatMessage::User { content }
            | ChatMessage::Assistant { content }
            | ChatMessage::Tool { content, .. } => content,
        }
    }
}
