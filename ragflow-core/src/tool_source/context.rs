//! Per-step context passed into tool calls.
//!
//! Set by the agent loop before executing a tool call; tools that need the
//! current conversation or tenant/session scoping read it (e.g. a
//! short-term-memory tool reading recent messages).

use crate::message::ChatMessage;

#[derive(Debug, Clone, Default)]
pub struct ToolCallContext {
    pub recent_messages: Vec<ChatMessage>,
    pub tenant_id: Option<String>,
    pub session_id: Option<String>,
}

impl ToolCallContext {
    pub fn new(recent_messages: Vec<ChatMessage>) -> Self {
        Self {
            recent_messages,
            tenant_id: None,
            session_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
