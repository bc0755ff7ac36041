//! axum HTTP server exposing the SPEC_FULL §6 chat-turn and search contract
//! over SSE.
//!
//! Listens on `BIND_ADDR` (default `127.0.0.1:8080`). `RAGFLOW_DB_PATH`
//! selects a SQLite-backed [`ragflow_store::SqliteStore`]; unset, the server
//! runs against the in-process `NoOp*` stores.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod app;
mod dto;
mod error;
mod routes;
mod sse;
mod state;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

pub use state::{build_state, noop_state, AppState};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Runs the server on an existing listener (tests bind to `127.0.0.1:0` and
/// pass the listener in, mirroring the teacher's `run_serve_on_listener`).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("ragflow-serve listening on http://{}", addr);

    let app = app::router(Arc::new(state));
    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs the server, building [`AppState`] from the environment via
/// [`build_state`]. `chat_model`/`retriever_registry`/`reranker`/
/// `tool_source` are supplied by the binary composing this library, since
/// they are external collaborators this crate only consumes.
pub async fn run_serve(
    addr: Option<&str>,
    chat_model: Arc<dyn ragflow_core::llm::ChatModel>,
    retriever_registry: Arc<ragflow_core::retriever::RetrieverRegistry>,
    reranker: Option<Arc<dyn ragflow_core::rerank::Reranker>>,
    tool_source: Arc<dyn ragflow_core::tool_source::ToolSource>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_BIND_ADDR);
    let listener = TcpListener::bind(addr).await?;
    let state = build_state(chat_model, retriever_registry, reranker, tool_source)?;
    run_serve_on_listener(listener, state).await
}
