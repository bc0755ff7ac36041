//! Chat Pipeline Engine (C6): an ordered chain of plugins driving the
//! standard "rag" flow — `preprocess_query -> rewrite_query -> hybrid_search
//! -> merge -> rerank -> context_compress -> chat_completion`.
//!
//! The teacher's generic state-graph/middleware engine (arbitrary node
//! topology, checkpointing, interrupts) is replaced by a direct ordered
//! `Vec<Arc<dyn ChatPlugin>>`: the `OnEvent(ctx, event_type, chat_manage,
//! next)` continuation-passing shape collapses to a plain return value
//! (`PluginFlow::Continue` / `ShortCircuit`) since Rust async closures make a
//! literal `next()` callback awkward without extra allocation for no benefit
//! here — every plugin in the standard chain either proceeds or stops.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::{BusEvent, EventBus, EventType};
use crate::compact::{compact, CompactionConfig};
use crate::error::{CoreError, PluginError};
use crate::llm::{ChatModel, ChatOptions};
use crate::message::ChatMessage;
use crate::model::SearchResult;
use crate::persistence::KnowledgeMetadataStore;
use crate::rerank::{rerank_stage, RerankConfig, Reranker};
use crate::retriever::{FailureMode, RetrieverRegistry, RetrieverType, SearchParams};
use crate::search::{hybrid_search, PriorityTagConfig};

/// How a miss (zero search results) is turned into a response.
#[derive(Debug, Clone)]
pub enum FallbackStrategy {
    /// Respond with a fixed string, no further LLM call.
    Fixed(String),
    /// Call the chat model with a prefix warning that nothing matched.
    Model { no_match_prefix: String },
}

/// Per-request mutable state threaded through the pipeline. Never shared
/// across requests; clone it when re-dispatching to a sub-pipeline.
#[derive(Debug, Clone)]
pub struct ChatManage {
    pub request_id: String,
    pub message_id: String,
    pub query: String,
    pub rewritten_query: Option<String>,
    pub knowledge_base_ids: Vec<String>,
    pub search_targets: HashSet<RetrieverType>,
    pub search_result: Vec<SearchResult>,
    pub merge_result: Vec<SearchResult>,
    pub rerank_result: Vec<SearchResult>,
    pub rerank_degraded: bool,
    pub chat_response: String,
    pub search_params: SearchParams,
    pub rerank_config: RerankConfig,
    pub priority: PriorityTagConfig,
    pub fallback: FallbackStrategy,
    pub history: Vec<ChatMessage>,
}

impl ChatManage {
    pub fn new(request_id: impl Into<String>, message_id: impl Into<String>, query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            request_id: request_id.into(),
            message_id: message_id.into(),
            rewritten_query: None,
            knowledge_base_ids: Vec::new(),
            search_targets: [RetrieverType::Vector, RetrieverType::Keywords].into_iter().collect(),
            search_result: Vec::new(),
            merge_result: Vec::new(),
            rerank_result: Vec::new(),
            rerank_degraded: false,
            chat_response: String::new(),
            search_params: SearchParams { query_text: query.clone(), ..Default::default() },
            rerank_config: RerankConfig { top_k: 10, threshold: 0.0 },
            priority: PriorityTagConfig::default(),
            fallback: FallbackStrategy::Fixed("I don't know yet.".to_string()),
            history: Vec::new(),
            query,
        }
    }

    /// Query actually used downstream: rewritten if present, else original.
    pub fn effective_query(&self) -> &str {
        self.rewritten_query.as_deref().unwrap_or(&self.query)
    }
}

/// Whether a plugin lets the chain continue or stops it here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginFlow {
    Continue,
    ShortCircuit,
}

/// Collaborators a plugin may need; held by the engine and passed by
/// reference so plugins stay cheap to construct.
pub struct PipelineContext {
    pub retriever_registry: Arc<RetrieverRegistry>,
    pub reranker: Option<Arc<dyn Reranker>>,
    pub chat_model: Arc<dyn ChatModel>,
    pub compaction_config: CompactionConfig,
    pub knowledge_metadata: Option<Arc<dyn KnowledgeMetadataStore>>,
}

#[async_trait]
pub trait ChatPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: &PipelineContext, chat_manage: &mut ChatManage) -> Result<PluginFlow, PluginError>;
}

/// Drives an ordered plugin chain, emitting start/complete/error events at
/// each stage boundary.
pub struct PipelineEngine {
    plugins: Vec<Arc<dyn ChatPlugin>>,
    bus: EventBus,
}

impl PipelineEngine {
    pub fn new(plugins: Vec<Arc<dyn ChatPlugin>>, bus: EventBus) -> Self {
        Self { plugins, bus }
    }

    pub async fn run(&self, ctx: &PipelineContext, chat_manage: &mut ChatManage) -> Result<(), CoreError> {
        for plugin in &self.plugins {
            self.bus
                .emit(BusEvent::new(EventType::ChatStart, &chat_manage.request_id).with_content(plugin.name()))
                .await;

            match plugin.run(ctx, chat_manage).await {
                Ok(PluginFlow::Continue) => {
                    self.bus
                        .emit(BusEvent::new(EventType::ChatComplete, &chat_manage.request_id).with_content(plugin.name()))
                        .await;
                }
                Ok(PluginFlow::ShortCircuit) => {
                    self.bus
                        .emit(
                            BusEvent::new(EventType::ChatComplete, &chat_manage.request_id)
                                .with_content(plugin.name())
                                .with_done(true),
                        )
                        .await;
                    // Skip remaining plugins but still reach the terminal
                    // AgentFinalAnswer/AgentComplete emit below, otherwise a
                    // short-circuited turn (e.g. empty search results) never
                    // signals completion to anything watching the bus.
                    break;
                }
                Err(err) => {
                    self.bus
                        .emit(
                            BusEvent::new(EventType::Error, &chat_manage.request_id)
                                .with_content(format!("{}: {}", plugin.name(), err)),
                        )
                        .await;
                    return Err(err.into());
                }
            }
        }

        self.bus
            .emit(
                BusEvent::new(EventType::AgentFinalAnswer, &chat_manage.request_id)
                    .with_content(chat_manage.chat_response.clone())
                    .with_done(true),
            )
            .await;
        self.bus.emit(BusEvent::new(EventType::AgentComplete, &chat_manage.request_id).with_done(true)).await;
        Ok(())
    }
}

/// `preprocess_query`: trims whitespace; no-op placeholder for future
/// normalization (e.g. stripping control characters).
pub struct PreprocessQueryPlugin;

#[async_trait]
impl ChatPlugin for PreprocessQueryPlugin {
    fn name(&self) -> &'static str {
        "preprocess_query"
    }

    async fn run(&self, _ctx: &PipelineContext, chat_manage: &mut ChatManage) -> Result<PluginFlow, PluginError> {
        chat_manage.query = chat_manage.query.trim().to_string();
        Ok(PluginFlow::Continue)
    }
}

/// `rewrite_query`: asks the chat model to rewrite the query standalone
/// given history. Failure falls back to the original query and a warning
/// event rather than aborting the pipeline.
pub struct RewriteQueryPlugin;

#[async_trait]
impl ChatPlugin for RewriteQueryPlugin {
    fn name(&self) -> &'static str {
        "rewrite_query"
    }

    async fn run(&self, ctx: &PipelineContext, chat_manage: &mut ChatManage) -> Result<PluginFlow, PluginError> {
        if chat_manage.history.is_empty() {
            return Ok(PluginFlow::Continue);
        }
        let mut prompt = chat_manage.history.clone();
        prompt.push(ChatMessage::system(
            "Rewrite the user's last message as a standalone query, given the conversation above. Reply with only the rewritten query.",
        ));
        match ctx.chat_model.chat(&prompt, &ChatOptions::default()).await {
            Ok(response) if !response.content.trim().is_empty() => {
                chat_manage.rewritten_query = Some(response.content.trim().to_string());
            }
            _ => {
                tracing::warn!(request_id = %chat_manage.request_id, "query rewrite failed, using original query");
            }
        }
        Ok(PluginFlow::Continue)
    }
}

/// `hybrid_search`: fans out to active retriever engines. All-engines-failed
/// is surfaced via `ErrSearch` only in strict mode; best-effort mode yields
/// an empty result set instead.
pub struct HybridSearchPlugin;

#[async_trait]
impl ChatPlugin for HybridSearchPlugin {
    fn name(&self) -> &'static str {
        "hybrid_search"
    }

    async fn run(&self, ctx: &PipelineContext, chat_manage: &mut ChatManage) -> Result<PluginFlow, PluginError> {
        let mut params = chat_manage.search_params.clone();
        params.query_text = chat_manage.effective_query().to_string();
        params.knowledge_ids = chat_manage.knowledge_base_ids.clone();

        let results = hybrid_search(
            &ctx.retriever_registry,
            &params,
            &chat_manage.search_targets,
            &chat_manage.priority,
            FailureMode::BestEffort,
            ctx.knowledge_metadata.as_ref(),
        )
        .await
        .map_err(|e| PluginError::new("ErrSearch", e.to_string()))?;

        chat_manage.search_result = results;
        Ok(PluginFlow::Continue)
    }
}

/// `merge`: re-merges `search_result` (already merged by `hybrid_search`
/// internally, but kept as its own stage per the standard chain so a custom
/// pipeline can substitute a different merge policy between search and
/// rerank). Always continues, even on an empty result — [`FallbackPlugin`]
/// is the stage responsible for short-circuiting on a miss, so it gets a
/// chance to apply the configured fallback strategy first.
pub struct MergePlugin;

#[async_trait]
impl ChatPlugin for MergePlugin {
    fn name(&self) -> &'static str {
        "merge"
    }

    async fn run(&self, _ctx: &PipelineContext, chat_manage: &mut ChatManage) -> Result<PluginFlow, PluginError> {
        chat_manage.merge_result = chat_manage.search_result.clone();
        Ok(PluginFlow::Continue)
    }
}

/// `rerank`: always best-effort; failures degrade rather than abort.
pub struct RerankPlugin;

#[async_trait]
impl ChatPlugin for RerankPlugin {
    fn name(&self) -> &'static str {
        "rerank"
    }

    async fn run(&self, ctx: &PipelineContext, chat_manage: &mut ChatManage) -> Result<PluginFlow, PluginError> {
        let reranker = ctx.reranker.as_deref();
        let (reranked, degraded) = rerank_stage(
            reranker,
            chat_manage.effective_query(),
            chat_manage.merge_result.clone(),
            &chat_manage.rerank_config,
        )
        .await;
        chat_manage.rerank_result = reranked;
        chat_manage.rerank_degraded = degraded;
        Ok(PluginFlow::Continue)
    }
}

/// `context_compress`: compacts `history` per the tenant's compaction
/// config before the final LLM call.
pub struct ContextCompressPlugin;

#[async_trait]
impl ChatPlugin for ContextCompressPlugin {
    fn name(&self) -> &'static str {
        "context_compress"
    }

    async fn run(&self, ctx: &PipelineContext, chat_manage: &mut ChatManage) -> Result<PluginFlow, PluginError> {
        chat_manage.history = compact(&chat_manage.history, &ctx.compaction_config, Some(ctx.chat_model.as_ref()))
            .await
            .map_err(|e| PluginError::new("ErrModelCall", e.to_string()))?;
        Ok(PluginFlow::Continue)
    }
}

/// `chat_completion`: final LLM call over history + retrieved contexts.
/// Failure here aborts the pipeline (`ErrModelCall`).
pub struct ChatCompletionPlugin;

fn render_contexts(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.content.as_str()).collect::<Vec<_>>().join("\n\n")
}

#[async_trait]
impl ChatPlugin for ChatCompletionPlugin {
    fn name(&self) -> &'static str {
        "chat_completion"
    }

    async fn run(&self, ctx: &PipelineContext, chat_manage: &mut ChatManage) -> Result<PluginFlow, PluginError> {
        let mut messages = chat_manage.history.clone();
        messages.push(ChatMessage::system(format!(
            "Use the following context to answer the question:\n{}",
            render_contexts(&chat_manage.rerank_result)
        )));
        messages.push(ChatMessage::user(chat_manage.effective_query()));

        let response = ctx
            .chat_model
            .chat(&messages, &ChatOptions::default())
            .await
            .map_err(|e| PluginError::new("ErrModelCall", e.to_string()))?;
        chat_manage.chat_response = response.content;
        Ok(PluginFlow::Continue)
    }
}

/// The standard "rag" pipeline (normal mode, no agent tool use).
pub fn standard_rag_pipeline() -> Vec<Arc<dyn ChatPlugin>> {
    vec![
        Arc::new(PreprocessQueryPlugin),
        Arc::new(RewriteQueryPlugin),
        Arc::new(HybridSearchPlugin),
        Arc::new(MergePlugin),
        Arc::new(FallbackPlugin),
        Arc::new(RerankPlugin),
        Arc::new(ContextCompressPlugin),
        Arc::new(ChatCompletionPlugin),
    ]
}

/// Applies `chat_manage.fallback` when search produced no results;
/// short-circuits the chain in place of the remaining stages.
pub struct FallbackPlugin;

#[async_trait]
impl ChatPlugin for FallbackPlugin {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn run(&self, ctx: &PipelineContext, chat_manage: &mut ChatManage) -> Result<PluginFlow, PluginError> {
        if !chat_manage.merge_result.is_empty() {
            return Ok(PluginFlow::Continue);
        }
        match chat_manage.fallback.clone() {
            FallbackStrategy::Fixed(text) => {
                chat_manage.chat_response = text;
            }
            FallbackStrategy::Model { no_match_prefix } => {
                let mut messages = chat_manage.history.clone();
                messages.push(ChatMessage::system(no_match_prefix));
                messages.push(ChatMessage::user(chat_manage.effective_query()));
                let response = ctx
                    .chat_model
                    .chat(&messages, &ChatOptions::default())
                    .await
                    .map_err(|e| PluginError::new("ErrModelCall", e.to_string()))?;
                chat_manage.chat_response = response.content;
            }
        }
        Ok(PluginFlow::ShortCircuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError as Err;
    use crate::llm::{ChatModel, ChatResponse};
    use crate::retriever::{RetrieveEngine, RetrieverEngineType};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct EchoChatModel;

    #[async_trait]
    impl ChatModel for EchoChatModel {
        async fn chat(&self, messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse, Err> {
            let last = messages.last().map(|m| m.content().to_string()).unwrap_or_default();
            Ok(ChatResponse { content: format!("answer to: {}", last), tool_calls: vec![], usage: None })
        }
    }

    struct StubEngine {
        results: Vec<SearchResult>,
    }

    #[async_trait]
    impl RetrieveEngine for StubEngine {
        fn engine_type(&self) -> RetrieverEngineType {
            RetrieverEngineType::VectorPg
        }
        fn support(&self) -> HashSet<RetrieverType> {
            [RetrieverType::Vector, RetrieverType::Keywords].into_iter().collect()
        }
        async fn retrieve(&self, _params: &SearchParams) -> Result<Vec<SearchResult>, Err> {
            Ok(self.results.clone())
        }
        async fn save(&self, _index_info: &crate::model::IndexInfo) -> Result<(), Err> {
            Ok(())
        }
        async fn batch_save(&self, _index_infos: &[crate::model::IndexInfo]) -> Result<(), Err> {
            Ok(())
        }
        async fn delete_by_chunk_ids(&self, _chunk_ids: &[String], _dim: usize) -> Result<(), Err> {
            Ok(())
        }
        async fn delete_by_knowledge_ids(&self, _knowledge_ids: &[String], _dim: usize) -> Result<(), Err> {
            Ok(())
        }
        async fn estimate_storage_size(&self, _index_infos: &[crate::model::IndexInfo]) -> Result<i64, Err> {
            Ok(0)
        }
        async fn copy_indices(&self, _src: &str, _map: &[(String, String)], _tgt: &str, _dim: usize) -> Result<(), Err> {
            Ok(())
        }
    }

    fn result(chunk_id: &str, content: &str) -> SearchResult {
        SearchResult {
            chunk_id: chunk_id.to_string(),
            content: content.to_string(),
            knowledge_id: "k1".to_string(),
            knowledge_title: None,
            chunk_index: 0,
            start_offset: 0,
            end_offset: 0,
            score: 0.9,
            match_type: crate::model::MatchType::Vector,
            chunk_type: None,
            parent_chunk_id: None,
            image_info: None,
            metadata: HashMap::new(),
            knowledge_filename: None,
            knowledge_source: None,
        }
    }

    async fn ctx_with_results(results: Vec<SearchResult>) -> PipelineContext {
        let registry = RetrieverRegistry::new();
        registry.register(Arc::new(StubEngine { results })).await;
        PipelineContext {
            retriever_registry: Arc::new(registry),
            reranker: None,
            chat_model: Arc::new(EchoChatModel),
            compaction_config: CompactionConfig::default(),
            knowledge_metadata: None,
        }
    }

    #[tokio::test]
    async fn full_pipeline_produces_an_answer_grounded_in_search_results() {
        let ctx = ctx_with_results(vec![result("c1", "relevant content")]).await;
        let bus = EventBus::new();
        let engine = PipelineEngine::new(standard_rag_pipeline(), bus);
        let mut chat_manage = ChatManage::new("r1", "m1", "what is this about?");
        engine.run(&ctx, &mut chat_manage).await.unwrap();
        assert!(chat_manage.chat_response.contains("what is this about?"));
        assert_eq!(chat_manage.rerank_result.len(), 1);
        assert!(!chat_manage.rerank_degraded);
    }

    #[tokio::test]
    async fn fallback_applies_on_empty_results_before_rerank_and_chat() {
        let ctx = ctx_with_results(vec![]).await;
        let bus = EventBus::new();
        let engine = PipelineEngine::new(standard_rag_pipeline(), bus);
        let mut chat_manage = ChatManage::new("r1", "m1", "anything");
        engine.run(&ctx, &mut chat_manage).await.unwrap();
        assert_eq!(chat_manage.chat_response, "I don't know yet.");
        assert!(chat_manage.rerank_result.is_empty());
    }

    #[tokio::test]
    async fn fallback_plugin_uses_fixed_text_on_empty_merge_result() {
        let ctx = ctx_with_results(vec![]).await;
        let bus = EventBus::new();
        let engine = PipelineEngine::new(
            vec![Arc::new(PreprocessQueryPlugin), Arc::new(HybridSearchPlugin), Arc::new(MergePlugin), Arc::new(FallbackPlugin)],
            bus,
        );
        let mut chat_manage = ChatManage::new("r1", "m1", "anything");
        chat_manage.fallback = FallbackStrategy::Fixed("I don't know yet.".to_string());
        engine.run(&ctx, &mut chat_manage).await.unwrap();
        assert_eq!(chat_manage.chat_response, "I don't know yet.");
    }

    #[tokio::test]
    async fn rewrite_query_failure_falls_back_to_original_query() {
        struct FailingRewriteModel;
        #[async_trait]
        impl ChatModel for FailingRewriteModel {
            async fn chat(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse, Err> {
                Err(Err::Upstream("rewrite model down".to_string()))
            }
        }
        let mut ctx = ctx_with_results(vec![]).await;
        ctx.chat_model = Arc::new(FailingRewriteModel);
        let mut chat_manage = ChatManage::new("r1", "m1", "original query");
        chat_manage.history = vec![ChatMessage::user("earlier turn")];
        let plugin = RewriteQueryPlugin;
        let flow = plugin.run(&ctx, &mut chat_manage).await.unwrap();
        assert_eq!(flow, PluginFlow::Continue);
        assert!(chat_manage.rewritten_query.is_none());
        assert_eq!(chat_manage.effective_query(), "original query");
    }
}
