//! # ragflow-core
//!
//! Multi-tenant RAG orchestration core: a per-request event bus and
//! append-only stream log (§2-3), a pluggable retriever registry with hybrid
//! search and score fusion (§4.3-4.4), an optional rerank stage (§4.5), a
//! staged chat pipeline and a ReAct agent loop sharing both (§4.6-4.7), a
//! session-scoped facade that drives one chat turn end to end (§4.8), a
//! context compactor (§4.9), and a tenant config resolver (§4.10).
//!
//! ## Main modules
//!
//! - [`bus`]: [`bus::EventBus`], [`bus::BusEvent`], [`bus::EventType`] — per-request pub/sub.
//! - [`stream`]: [`stream::StreamManager`], [`stream::InMemoryStreamManager`], [`stream::StreamEvent`] — the SSE-backing event log.
//! - [`retriever`]: [`retriever::RetrieverRegistry`], [`retriever::RetrieveEngine`], [`retriever::SearchParams`] — pluggable retrieval backends.
//! - [`search`]: [`search::hybrid_search`], [`search::merge`] — parallel fan-out and score fusion.
//! - [`rerank`]: [`rerank::Reranker`], [`rerank::rerank_stage`] — optional cross-encoder rerank.
//! - [`llm`]: [`llm::ChatModel`], [`llm::MockChatModel`] — the chat-completion contract.
//! - [`embedder`]: [`embedder::Embedder`] — the embedding contract.
//! - [`message`]: [`message::ChatMessage`] — chat history entries.
//! - [`model`]: domain types shared across the core ([`model::Session`], [`model::Message`], [`model::SearchResult`], [`model::AgentStep`]).
//! - [`tool_source`]: [`tool_source::ToolSource`], [`tool_source::AggregateToolSource`] — tool dispatch.
//! - [`tools`]: built-in tools ([`tools::GrepChunksTool`], [`tools::KnowledgeSearchTool`], [`tools::WebFetchTool`], [`tools::TodoWriteTool`], [`tools::ThinkingTool`], ...).
//! - [`agent`]: [`agent::AgentLoop`], [`agent::AgentConfig`] — the ReAct controller.
//! - [`pipeline`]: [`pipeline::PipelineEngine`], [`pipeline::ChatManage`], [`pipeline::ChatPlugin`] — the staged chat pipeline.
//! - [`compact`]: [`compact::compact`], [`compact::CompactionConfig`] — dialog history compaction.
//! - [`tenant_config`]: [`tenant_config::resolve`], [`tenant_config::EffectiveConfig`] — four-level config merge.
//! - [`facade`]: [`facade::SessionQaFacade`] — the per-turn entry point wiring everything above together.
//! - [`persistence`]: [`persistence::SessionStore`], [`persistence::MessageStore`], [`persistence::KnowledgeMetadataStore`] — storage contracts.
//! - [`error`]: [`error::CoreError`], [`error::PluginError`] — error types.

pub mod agent;
pub mod bus;
pub mod compact;
pub mod embedder;
pub mod error;
pub mod facade;
pub mod llm;
pub mod message;
pub mod model;
pub mod persistence;
pub mod pipeline;
pub mod rerank;
pub mod retriever;
pub mod search;
pub mod stream;
pub mod tenant_config;
pub mod tool_source;
pub mod tools;

pub use agent::{AgentConfig, AgentLoop, AgentOutcome};
pub use bus::{BusEvent, EventBus, EventType};
pub use compact::{compact, CompactionConfig, CompactionStrategy};
pub use embedder::{Embedder, MockEmbedder};
pub use error::{CoreError, ErrorKind, PluginError};
pub use facade::{ChatTurnHandle, ChatTurnRequest, SessionQaFacade, TurnMode};
pub use llm::{ChatModel, ChatOptions, ChatResponse, MockChatModel, ToolCallRequest, ToolDeclaration};
pub use message::ChatMessage;
pub use model::{AgentStep, AgentStepKind, MatchType, Message, MessageRole, SearchResult, Session};
pub use persistence::{
    KnowledgeMetadata, KnowledgeMetadataStore, MessageStore, NoOpKnowledgeMetadataStore, NoOpMessageStore,
    NoOpSessionStore, PersistenceError, SessionStore,
};
pub use pipeline::{ChatManage, ChatPlugin, FallbackStrategy, PipelineContext, PipelineEngine, PluginFlow};
pub use rerank::{rerank_stage, RerankConfig, Reranker};
pub use retriever::{FailureMode, RetrieveEngine, RetrieverEngineType, RetrieverRegistry, RetrieverType, SearchParams};
pub use search::{hybrid_search, merge, PriorityTagConfig};
pub use stream::{InMemoryStreamManager, ResponseType, StreamEvent, StreamManager};
pub use tenant_config::{ConversationConfig, CustomAgentConfig, EffectiveConfig, GlobalDefaults, SessionOverrides};
pub use tool_source::{AggregateToolSource, ToolCallContent, ToolCallContext, ToolSource, ToolSourceError, ToolSpec};
