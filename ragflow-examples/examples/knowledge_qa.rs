//! Wires a pipeline-mode chat turn end to end: an in-memory retriever
//! engine, a canned chat model, no-op stores, and the in-process stream
//! log, all driven through `SessionQaFacade`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ragflow_core::facade::{ChatTurnRequest, SessionQaFacade, TurnMode};
use ragflow_core::model::{IndexInfo, MatchType, SearchResult};
use ragflow_core::pipeline::FallbackStrategy;
use ragflow_core::retriever::{RetrieveEngine, RetrieverEngineType, RetrieverRegistry, RetrieverType, SearchParams};
use ragflow_core::{
    AgentConfig, AggregateToolSource, CoreError, InMemoryStreamManager, MockChatModel, NoOpMessageStore,
    NoOpSessionStore, RerankConfig,
};

/// Returns a single canned chunk for any query, standing in for a real
/// pgvector/Elasticsearch backend.
struct InMemoryVectorEngine;

#[async_trait]
impl RetrieveEngine for InMemoryVectorEngine {
    fn engine_type(&self) -> RetrieverEngineType {
        RetrieverEngineType::VectorPg
    }

    fn support(&self) -> HashSet<RetrieverType> {
        [RetrieverType::Vector].into_iter().collect()
    }

    async fn retrieve(&self, params: &SearchParams) -> Result<Vec<SearchResult>, CoreError> {
        Ok(vec![SearchResult {
            chunk_id: "chunk-1".to_string(),
            content: format!("ragflow is a multi-tenant RAG orchestration core (matched on: {})", params.query_text),
            knowledge_id: "kb-1".to_string(),
            knowledge_title: Some("overview.md".to_string()),
            chunk_index: 0,
            start_offset: 0,
            end_offset: 80,
            score: 0.92,
            match_type: MatchType::Vector,
            chunk_type: None,
            parent_chunk_id: None,
            image_info: None,
            metadata: Default::default(),
            knowledge_filename: Some("overview.md".to_string()),
            knowledge_source: None,
        }])
    }

    async fn save(&self, _index_info: &IndexInfo) -> Result<(), CoreError> {
        Ok(())
    }

    async fn batch_save(&self, _index_infos: &[IndexInfo]) -> Result<(), CoreError> {
        Ok(())
    }

    async fn delete_by_chunk_ids(&self, _chunk_ids: &[String], _dim: usize) -> Result<(), CoreError> {
        Ok(())
    }

    async fn delete_by_knowledge_ids(&self, _knowledge_ids: &[String], _dim: usize) -> Result<(), CoreError> {
        Ok(())
    }

    async fn estimate_storage_size(&self, _index_infos: &[IndexInfo]) -> Result<i64, CoreError> {
        Ok(0)
    }

    async fn copy_indices(
        &self,
        _src_knowledge_base_id: &str,
        _chunk_id_map: &[(String, String)],
        _target_knowledge_base_id: &str,
        _dim: usize,
    ) -> Result<(), CoreError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(RetrieverRegistry::new());
    registry.register(Arc::new(InMemoryVectorEngine)).await;

    let facade = SessionQaFacade::new(
        Arc::new(NoOpSessionStore),
        Arc::new(NoOpMessageStore),
        Arc::new(InMemoryStreamManager::new(Duration::from_secs(60))),
        registry,
        None,
        Arc::new(MockChatModel::with_content("RAGFlow orchestrates retrieval and chat over your knowledge bases.")),
        Arc::new(AggregateToolSource::new()),
    );

    let req = ChatTurnRequest {
        tenant_id: "tenant-a".to_string(),
        session_id: "s1".to_string(),
        request_id: "req-1".to_string(),
        query: "what is ragflow?".to_string(),
        mode: TurnMode::Pipeline,
        agent_config: AgentConfig {
            allowed_tools: vec![],
            max_iterations: 1,
            temperature: 0.2,
            reflection_enabled: false,
            system_prompt: String::new(),
        },
        compaction_config: Default::default(),
        rerank_config: RerankConfig { top_k: 5, threshold: 0.0 },
        fallback: FallbackStrategy::Fixed("I don't have an answer for that yet.".to_string()),
        knowledge_base_ids: vec!["kb-1".to_string()],
        search_params: SearchParams { query_text: "what is ragflow?".to_string(), match_count: 5, ..Default::default() },
    };

    let handle = facade.start_turn(req, "msg-user-1", "msg-assistant-1").await?;

    facade
        .poll("s1", &handle.assistant_message_id, 0, |event| {
            println!("{:?}: {:?}", event.response_type, event.content);
        })
        .await?;

    Ok(())
}
