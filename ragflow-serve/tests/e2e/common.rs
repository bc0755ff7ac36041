//! Shared helpers for e2e tests: bind a random port, spawn the server with a
//! fixed mock chat model, and hand back its base URL — mirroring the
//! teacher's `spawn_server_once` helper, minus the WebSocket transport.

use std::sync::Arc;
use std::time::Duration;

use ragflow_core::llm::{ChatModel, ChatOptions, ChatResponse};
use ragflow_core::message::ChatMessage;
use ragflow_core::error::CoreError;
use ragflow_serve::{noop_state, AppState};
use tokio::net::TcpListener;

pub struct FixedChatModel(pub &'static str);

#[async_trait::async_trait]
impl ChatModel for FixedChatModel {
    async fn chat(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse, CoreError> {
        Ok(ChatResponse { content: self.0.to_string(), tool_calls: vec![], usage: None })
    }
}

/// Binds to a random port, spawns the server, and returns its base URL plus
/// the background join handle.
pub async fn spawn_server() -> (String, tokio::task::JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{}", addr);
    let state: AppState = noop_state(Arc::new(FixedChatModel("a canned answer")));
    let handle = tokio::spawn(ragflow_serve::run_serve_on_listener(listener, state));
    // Give the listener a moment to start accepting before the first request.
    tokio::time::sleep(Duration::from_millis(20)).await;
    (url, handle)
}
