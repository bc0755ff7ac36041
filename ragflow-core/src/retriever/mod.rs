//! Retriever Registry (C3): pluggable retrieval engines behind one contract.
//!
//! Grounded on the `AggregateToolSource`/`ToolSource` registration pattern
//! elsewhere in this codebase (`Box<dyn Trait>` storage, dedup by key,
//! async registration) — here keyed by `(RetrieverType, RetrieverEngineType)`
//! instead of tool name.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::model::{IndexInfo, SearchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrieverType {
    Vector,
    Keywords,
    Graph,
    Web,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrieverEngineType {
    VectorPg,
    KwPg,
    VectorEs,
    KwEs,
    VectorQdrant,
    Graph,
    Web,
}

/// Parameters for one hybrid search call (see C4).
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query_text: String,
    pub vector_threshold: f32,
    pub keyword_threshold: f32,
    pub match_count: usize,
    pub disable_vector_match: bool,
    pub disable_keyword_match: bool,
    pub disable_graph_match: bool,
    pub disable_web_match: bool,
    pub knowledge_ids: Vec<String>,
    pub tag_ids: Vec<String>,
}

/// One pluggable retrieval backend. Implementations are external
/// collaborators (concrete pgvector/Elasticsearch/Qdrant/graph/web drivers
/// live outside this crate); this crate only defines and drives the
/// contract.
#[async_trait]
pub trait RetrieveEngine: Send + Sync {
    fn engine_type(&self) -> RetrieverEngineType;
    fn support(&self) -> HashSet<RetrieverType>;

    async fn retrieve(&self, params: &SearchParams) -> Result<Vec<SearchResult>, CoreError>;

    async fn save(&self, index_info: &IndexInfo) -> Result<(), CoreError>;
    async fn batch_save(&self, index_infos: &[IndexInfo]) -> Result<(), CoreError>;

    async fn delete_by_chunk_ids(&self, chunk_ids: &[String], dim: usize) -> Result<(), CoreError>;
    async fn delete_by_knowledge_ids(&self, knowledge_ids: &[String], dim: usize) -> Result<(), CoreError>;

    async fn estimate_storage_size(&self, index_infos: &[IndexInfo]) -> Result<i64, CoreError>;

    /// Reindexes without recomputing embeddings: maps source chunk ids to
    /// target chunk ids within the same knowledge base dimension.
    async fn copy_indices(
        &self,
        src_knowledge_base_id: &str,
        chunk_id_map: &[(String, String)],
        target_knowledge_base_id: &str,
        dim: usize,
    ) -> Result<(), CoreError>;
}

/// How the registry treats per-engine failures when fanning out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Fail the whole search if any selected engine errors.
    Strict,
    /// Succeed if at least one `RetrieverType` returned results.
    BestEffort,
}

/// Enumerates `(RetrieverType, RetrieverEngineType)` pairs deduplicated by
/// `type:engine`, and dispatches retrieval across the tenant's active set.
#[derive(Default)]
pub struct RetrieverRegistry {
    engines: RwLock<Vec<Arc<dyn RetrieveEngine>>>,
}

impl RetrieverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, engine: Arc<dyn RetrieveEngine>) {
        let mut engines = self.engines.write().await;
        let key = engine.engine_type();
        if !engines.iter().any(|e| e.engine_type() == key) {
            engines.push(engine);
        }
    }

    /// Engines whose `Support()` intersects `enabled` for the tenant's
    /// configured engine list, deduplicated by engine type.
    pub async fn active_engines(&self, enabled: &HashSet<RetrieverType>) -> Vec<Arc<dyn RetrieveEngine>> {
        self.engines
            .read()
            .await
            .iter()
            .filter(|e| !e.support().is_disjoint(enabled))
            .cloned()
            .collect()
    }

    pub async fn all(&self) -> Vec<Arc<dyn RetrieveEngine>> {
        self.engines.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubEngine {
        engine_type: RetrieverEngineType,
        support: HashSet<RetrieverType>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RetrieveEngine for StubEngine {
        fn engine_type(&self) -> RetrieverEngineType {
            self.engine_type
        }
        fn support(&self) -> HashSet<RetrieverType> {
            self.support.clone()
        }
        async fn retrieve(&self, _params: &SearchParams) -> Result<Vec<SearchResult>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
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
            _src: &str,
            _map: &[(String, String)],
            _tgt: &str,
            _dim: usize,
        ) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn register_deduplicates_by_engine_type() {
        let registry = RetrieverRegistry::new();
        let mut support = HashSet::new();
        support.insert(RetrieverType::Vector);
        registry
            .register(Arc::new(StubEngine {
                engine_type: RetrieverEngineType::VectorPg,
                support: support.clone(),
                calls: AtomicUsize::new(0),
            }))
            .await;
        registry
            .register(Arc::new(StubEngine {
                engine_type: RetrieverEngineType::VectorPg,
                support,
                calls: AtomicUsize::new(0),
            }))
            .await;
        assert_eq!(registry.all().await.len(), 1);
    }

    #[tokio::test]
    async fn active_engines_filters_by_support_intersection() {
        let registry = RetrieverRegistry::new();
        let mut vector_support = HashSet::new();
        vector_support.insert(RetrieverType::Vector);
        let mut web_support = HashSet::new();
        web_support.insert(RetrieverType::Web);
        registry
            .register(Arc::new(StubEngine {
                engine_type: RetrieverEngineType::VectorPg,
                support: vector_support,
                calls: AtomicUsize::new(0),
            }))
            .await;
        registry
            .register(Arc::new(StubEngine {
                engine_type: RetrieverEngineType::Web,
                support: web_support,
                calls: AtomicUsize::new(0),
            }))
            .await;
        let mut enabled = HashSet::new();
        enabled.insert(RetrieverType::Vector);
        let active = registry.active_engines(&enabled).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].engine_type(), RetrieverEngineType::VectorPg);
    }
}
