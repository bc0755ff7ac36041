//! Per-request typed event bus (C1).
//!
//! A bus is a mapping from event type to an ordered list of handlers. One
//! bus per request avoids cross-tenant fan-in and obviates session-id
//! filtering on every handler — the rationale the rest of this codebase
//! applies to its per-run stream writers.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex;

use crate::model::{AgentStep, SearchResult};

/// Event kinds the core emits. `response_type` on the wire (§6) uses the
/// same names, snake_cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    QueryReceived,
    QueryRewrite,
    QueryRewritten,
    RetrievalStart,
    RetrievalComplete,
    RerankStart,
    RerankComplete,
    ChatStart,
    ChatComplete,
    AgentThought,
    AgentToolCall,
    AgentToolResult,
    AgentReferences,
    AgentFinalAnswer,
    AgentReflection,
    AgentComplete,
    AgentQuery,
    SessionTitle,
    Stop,
    Error,
}

/// Payload carried by a bus event. Free-form `data` covers fields specific
/// to one event type without growing this enum unboundedly.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub event_type: EventType,
    pub request_id: String,
    pub content: Option<String>,
    pub done: bool,
    pub references: Option<Vec<SearchResult>>,
    pub agent_step: Option<AgentStep>,
    pub data: Option<serde_json::Value>,
}

impl BusEvent {
    pub fn new(event_type: EventType, request_id: impl Into<String>) -> Self {
        Self {
            event_type,
            request_id: request_id.into(),
            content: None,
            done: false,
            references: None,
            agent_step: None,
            data: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }
}

type Handler = Arc<dyn Fn(&BusEvent) -> Result<(), String> + Send + Sync>;

/// Per-request pub/sub. Delivery to handlers for one event type is
/// synchronous and in registration order; a handler's error (or panic) is
/// logged and does not stop delivery to siblings.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<HashMap<EventType, Vec<Handler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `event_type`, appended after existing ones.
    pub async fn on(
        &self,
        event_type: EventType,
        handler: impl Fn(&BusEvent) -> Result<(), String> + Send + Sync + 'static,
    ) {
        self.handlers
            .lock()
            .await
            .entry(event_type)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Removes all handlers registered for `event_type`.
    pub async fn off(&self, event_type: EventType) {
        self.handlers.lock().await.remove(&event_type);
    }

    /// Delivers `event` to every handler registered for its type, in
    /// registration order. A handler panic is caught and converted into a
    /// logged error rather than propagated.
    pub async fn emit(&self, event: BusEvent) {
        let handlers = {
            let guard = self.handlers.lock().await;
            guard.get(&event.event_type).cloned().unwrap_or_default()
        };
        for handler in handlers {
            let event_ref = &event;
            let result = AssertUnwindSafe(async { handler(event_ref) })
                .catch_unwind()
                .await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(request_id = %event.request_id, error = %err, "event bus handler failed");
                }
                Err(_) => {
                    tracing::error!(request_id = %event.request_id, "event bus handler panicked");
                }
            }
        }
    }

    /// Identical semantics to [`EventBus::emit`] for this synchronous bus;
    /// kept as a distinct name to match the contract in the design notes
    /// (an async fan-out variant could interleave across handlers).
    pub async fn emit_and_wait(&self, event: BusEvent) {
        self.emit(event).await;
    }
}
