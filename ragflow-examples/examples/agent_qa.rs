//! Wires an agent-mode chat turn: a `ThinkingTool` registered on an
//! `AggregateToolSource`, a canned chat model that answers directly (no
//! tool calls), and the same facade used for pipeline-mode turns in
//! `knowledge_qa.rs`.

use std::sync::Arc;
use std::time::Duration;

use ragflow_core::facade::{ChatTurnRequest, SessionQaFacade, TurnMode};
use ragflow_core::pipeline::FallbackStrategy;
use ragflow_core::retriever::SearchParams;
use ragflow_core::tools::ThinkingTool;
use ragflow_core::{
    AgentConfig, AggregateToolSource, InMemoryStreamManager, MockChatModel, NoOpMessageStore, NoOpSessionStore,
    RerankConfig, RetrieverRegistry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let tool_source = Arc::new(AggregateToolSource::new());
    tool_source.register(Arc::new(ThinkingTool::new())).await;

    let facade = SessionQaFacade::new(
        Arc::new(NoOpSessionStore),
        Arc::new(NoOpMessageStore),
        Arc::new(InMemoryStreamManager::new(Duration::from_secs(60))),
        Arc::new(RetrieverRegistry::new()),
        None,
        Arc::new(MockChatModel::with_content("Here's a plan-free direct answer to your question.")),
        tool_source,
    );

    let req = ChatTurnRequest {
        tenant_id: "tenant-a".to_string(),
        session_id: "s2".to_string(),
        request_id: "req-2".to_string(),
        query: "summarize the agent loop".to_string(),
        mode: TurnMode::Agent,
        agent_config: AgentConfig {
            allowed_tools: vec!["thinking".to_string()],
            max_iterations: 5,
            temperature: 0.3,
            reflection_enabled: true,
            system_prompt: "You are a helpful assistant.".to_string(),
        },
        compaction_config: Default::default(),
        rerank_config: RerankConfig { top_k: 5, threshold: 0.0 },
        fallback: FallbackStrategy::Fixed("I don't have an answer for that yet.".to_string()),
        knowledge_base_ids: vec![],
        search_params: SearchParams::default(),
    };

    let handle = facade.start_turn(req, "msg-user-2", "msg-assistant-2").await?;

    facade
        .poll("s2", &handle.assistant_message_id, 0, |event| {
            println!("{:?}: {:?}", event.response_type, event.content);
        })
        .await?;

    Ok(())
}
