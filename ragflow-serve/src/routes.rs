//! The five routes SPEC_FULL §6 requires, plus `/healthz`.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use ragflow_core::facade::{ChatTurnRequest, TurnMode};
use ragflow_core::retriever::{FailureMode, RetrieverType, SearchParams};
use ragflow_core::search::{hybrid_search, PriorityTagConfig};
use ragflow_core::tenant_config::{CustomAgentConfig, SessionOverrides};

use crate::dto::{ChatTurnBody, ContinueStreamQuery, KnowledgeSearchBody, KnowledgeSearchResponse};
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_TENANT_HEADER: &str = "x-tenant-id";
const DEFAULT_TENANT: &str = "default";

/// Claim extraction is out of scope for the core (SPEC_FULL §1 Non-goals);
/// this reads a pre-authenticated tenant id off a header the way an
/// upstream gateway or sidecar would set it.
fn tenant_id(headers: &HeaderMap) -> String {
    headers
        .get(DEFAULT_TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_TENANT)
        .to_string()
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn start_chat_turn(
    state: &AppState,
    headers: &HeaderMap,
    session_id: String,
    body: ChatTurnBody,
    mode: TurnMode,
) -> Result<(String, String), ApiError> {
    let custom_agent = CustomAgentConfig::default();
    let session = SessionOverrides {
        knowledge_base_ids: body.knowledge_base_ids.clone(),
        temperature: None,
        web_search_enabled: body.web_search_enabled,
    };
    let effective = ragflow_core::tenant_config::resolve(
        state.global_defaults.as_ref(),
        &Default::default(),
        &session,
        &custom_agent,
    )
    .map_err(ApiError::from)?;

    let mut search_params = effective.search_params.clone();
    search_params.knowledge_ids = body.knowledge_base_ids.clone();
    if !body.knowledge_ids.is_empty() {
        search_params.tag_ids = body.knowledge_ids.clone();
    }
    if !body.web_search_enabled {
        search_params.disable_web_match = true;
    }

    let request_id = format!("req-{}", Uuid::new_v4());
    let user_message_id = format!("msg-{}", Uuid::new_v4());
    let assistant_message_id = format!("msg-{}", Uuid::new_v4());

    let req = ChatTurnRequest {
        tenant_id: tenant_id(headers),
        session_id: session_id.clone(),
        request_id,
        query: body.query,
        mode,
        agent_config: effective.agent,
        compaction_config: effective.compaction_config,
        rerank_config: effective.rerank_config,
        fallback: effective.fallback,
        knowledge_base_ids: body.knowledge_base_ids,
        search_params,
    };

    let handle = state
        .facade
        .start_turn(req, user_message_id, assistant_message_id.clone())
        .await
        .map_err(ApiError::from)?;

    state.active_turns.insert(session_id, handle.cancellation);

    Ok((assistant_message_id, "0".to_string()))
}

pub async fn knowledge_qa(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(body): Json<ChatTurnBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (assistant_message_id, _) =
        start_chat_turn(&state, &headers, session_id.clone(), body, TurnMode::Pipeline).await?;
    Ok(crate::sse::poll_to_sse(state.facade.clone(), session_id, assistant_message_id, 0))
}

pub async fn agent_qa(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(body): Json<ChatTurnBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (assistant_message_id, _) =
        start_chat_turn(&state, &headers, session_id.clone(), body, TurnMode::Agent).await?;
    Ok(crate::sse::poll_to_sse(state.facade.clone(), session_id, assistant_message_id, 0))
}

pub async fn stop(State(state): State<Arc<AppState>>, Path(session_id): Path<String>) -> impl IntoResponse {
    if let Some((_, cancellation)) = state.active_turns.remove(&session_id) {
        cancellation.cancel();
        tracing::info!(session_id, "stop requested");
    }
    StatusCode::OK
}

pub async fn continue_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<ContinueStreamQuery>,
) -> impl IntoResponse {
    crate::sse::poll_to_sse(state.facade.clone(), session_id, query.message_id, query.from_offset)
}

pub async fn knowledge_search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<KnowledgeSearchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut params = SearchParams {
        query_text: body.query,
        knowledge_ids: body.knowledge_base_ids,
        tag_ids: body.tag_ids,
        ..Default::default()
    };
    if let Some(t) = body.vector_threshold {
        params.vector_threshold = t;
    }
    if let Some(t) = body.keyword_threshold {
        params.keyword_threshold = t;
    }
    if let Some(c) = body.match_count {
        params.match_count = c;
    }

    let enabled: HashSet<RetrieverType> = [RetrieverType::Vector, RetrieverType::Keywords].into_iter().collect();
    let results = hybrid_search(
        state.facade.retriever_registry.as_ref(),
        &params,
        &enabled,
        &PriorityTagConfig::default(),
        FailureMode::BestEffort,
        state.facade.knowledge_metadata.as_ref(),
    )
    .await
    .map_err(ApiError::from)?;

    Ok(Json(KnowledgeSearchResponse { results }))
}
