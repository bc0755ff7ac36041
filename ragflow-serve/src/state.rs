//! Shared application state: one struct holding every collaborator as an
//! `Arc<dyn Trait>`, cloned cheaply per request — the same shape as the
//! teacher's `serve/src/lib.rs` `AppState`, generalized from a single
//! workspace/user-message store pair to the full facade collaborator set.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use ragflow_core::{
    AggregateToolSource, GlobalDefaults, InMemoryStreamManager, MessageStore, Reranker,
    RetrieverRegistry, SessionQaFacade, SessionStore,
};
use ragflow_core::llm::ChatModel;
use ragflow_core::tool_source::ToolSource;

/// Tracks the currently-running turn per session so `POST .../stop` can
/// cancel it; `ragflow-core`'s facade only hands back a `ChatTurnHandle` for
/// the caller that started the turn, so this registry is the HTTP layer's
/// own bookkeeping, not a core concern. `dashmap` is the teacher's own
/// concurrent-map dependency, reused here for a sharded lock-free map
/// instead of a `Mutex<HashMap<_>>`.
pub type ActiveTurns = Arc<DashMap<String, CancellationToken>>;

#[derive(Clone)]
pub struct AppState {
    pub facade: SessionQaFacade,
    pub global_defaults: Arc<GlobalDefaults>,
    pub active_turns: ActiveTurns,
}

/// Builds the facade from environment variables, mirroring the teacher's
/// `run_serve_on_listener`: `RAGFLOW_DB_PATH` selects the SQLite store the
/// way `WORKSPACE_DB`/`USER_MESSAGE_DB` did, falling back to the in-process
/// `NoOp*` stores when unset (useful for smoke-testing the server without a
/// database).
pub fn build_state(
    chat_model: Arc<dyn ChatModel>,
    retriever_registry: Arc<RetrieverRegistry>,
    reranker: Option<Arc<dyn Reranker>>,
    tool_source: Arc<dyn ToolSource>,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    let (session_store, message_store) = match std::env::var("RAGFLOW_DB_PATH").ok() {
        Some(path) => {
            let store = Arc::new(ragflow_store::SqliteStore::new(&path)?);
            (
                store.clone() as Arc<dyn SessionStore>,
                store as Arc<dyn MessageStore>,
            )
        }
        None => (
            Arc::new(ragflow_core::persistence::NoOpSessionStore) as Arc<dyn SessionStore>,
            Arc::new(ragflow_core::persistence::NoOpMessageStore) as Arc<dyn MessageStore>,
        ),
    };

    let stream_manager = Arc::new(InMemoryStreamManager::new(Duration::from_secs(3600)));

    let global_defaults = ragflow_config::load_global_defaults("ragflow").unwrap_or_default();

    let facade = SessionQaFacade::new(
        session_store,
        message_store,
        stream_manager,
        retriever_registry,
        reranker,
        chat_model,
        tool_source,
    );

    Ok(AppState {
        facade,
        global_defaults: Arc::new(global_defaults),
        active_turns: Arc::new(DashMap::new()),
    })
}

/// An [`AppState`] with no retrieval engines, no reranker, and an empty tool
/// source — useful for wiring the router in tests and in `ragflow-examples`
/// without a real model or database.
pub fn noop_state(chat_model: Arc<dyn ChatModel>) -> AppState {
    AppState {
        facade: SessionQaFacade::new(
            Arc::new(ragflow_core::persistence::NoOpSessionStore),
            Arc::new(ragflow_core::persistence::NoOpMessageStore),
            Arc::new(InMemoryStreamManager::new(Duration::from_secs(3600))),
            Arc::new(RetrieverRegistry::new()),
            None,
            chat_model,
            Arc::new(AggregateToolSource::new()),
        ),
        global_defaults: Arc::new(GlobalDefaults::default()),
        active_turns: Arc::new(DashMap::new()),
    }
}
