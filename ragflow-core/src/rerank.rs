//! Rerank Stage (C5): optional cross-encoder-style reranking of the merged
//! result set.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::SearchResult;

/// Consumed interface: `Reranker.Rerank(ctx, query, docs) -> scored`.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Returns one relevance score per input document, same order as input.
    async fn rerank(&self, query: &str, docs: &[String]) -> Result<Vec<f32>, CoreError>;
}

#[derive(Debug, Clone)]
pub struct RerankConfig {
    pub top_k: usize,
    pub threshold: f32,
}

/// Applies `reranker` to `results` when configured and non-empty. Always
/// best-effort (SPEC_FULL §9 open-question resolution): any reranker error
/// is logged and the merged ordering passes through unchanged with
/// `degraded` set to `true`.
pub async fn rerank_stage(
    reranker: Option<&dyn Reranker>,
    query: &str,
    results: Vec<SearchResult>,
    cfg: &RerankConfig,
) -> (Vec<SearchResult>, bool) {
    let Some(reranker) = reranker else {
        return (results, false);
    };
    if results.is_empty() {
        return (results, false);
    }

    let docs: Vec<String> = results.iter().map(|r| r.content.clone()).collect();
    match reranker.rerank(query, &docs).await {
        Ok(scores) => {
            let mut scored: Vec<(f32, SearchResult)> = results.into_iter().zip(scores).map(|(r, s)| (s, r)).collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            let reranked = scored
                .into_iter()
                .filter(|(score, _)| *score >= cfg.threshold)
                .take(cfg.top_k)
                .map(|(_, r)| r)
                .collect();
            (reranked, false)
        }
        Err(err) => {
            tracing::warn!(error = %err, "rerank failed, passing merged ordering through");
            (results, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn result(chunk_id: &str, content: &str) -> SearchResult {
        SearchResult {
            chunk_id: chunk_id.to_string(),
            content: content.to_string(),
            knowledge_id: "k1".to_string(),
            knowledge_title: None,
            chunk_index: 0,
            start_offset: 0,
            end_offset: 0,
            score: 0.0,
            match_type: crate::model::MatchType::Vector,
            chunk_type: None,
            parent_chunk_id: None,
            image_info: None,
            metadata: HashMap::new(),
            knowledge_filename: None,
            knowledge_source: None,
        }
    }

    struct ReverseScoreReranker;

    #[async_trait]
    impl Reranker for ReverseScoreReranker {
        async fn rerank(&self, _query: &str, docs: &[String]) -> Result<Vec<f32>, CoreError> {
            Ok((0..docs.len()).rev().map(|i| i as f32).collect())
        }
    }

    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(&self, _query: &str, _docs: &[String]) -> Result<Vec<f32>, CoreError> {
            Err(CoreError::Upstream("model down".to_string()))
        }
    }

    #[tokio::test]
    async fn no_reranker_configured_passes_through() {
        let results = vec![result("c1", "a"), result("c2", "b")];
        let cfg = RerankConfig { top_k: 10, threshold: 0.0 };
        let (out, degraded) = rerank_stage(None, "q", results, &cfg).await;
        assert_eq!(out.len(), 2);
        assert!(!degraded);
    }

    #[tokio::test]
    async fn empty_input_skips_rerank() {
        let reranker = ReverseScoreReranker;
        let cfg = RerankConfig { top_k: 10, threshold: 0.0 };
        let (out, degraded) = rerank_stage(Some(&reranker), "q", vec![], &cfg).await;
        assert!(out.is_empty());
        assert!(!degraded);
    }

    #[tokio::test]
    async fn reranker_reorders_and_truncates_to_top_k() {
        let reranker = ReverseScoreReranker;
        let results = vec![result("c1", "a"), result("c2", "b"), result("c3", "c")];
        let cfg = RerankConfig { top_k: 2, threshold: 0.0 };
        let (out, degraded) = rerank_stage(Some(&reranker), "q", results, &cfg).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].chunk_id, "c1"); // doc index 0 gets the highest reversed score
        assert!(!degraded);
    }

    #[tokio::test]
    async fn reranker_failure_passes_through_with_degraded_marker() {
        let reranker = FailingReranker;
        let results = vec![result("c1", "a")];
        let cfg = RerankConfig { top_k: 10, threshold: 0.0 };
        let (out, degraded) = rerank_stage(Some(&reranker), "q", results, &cfg).await;
        assert_eq!(out.len(), 1);
        assert!(degraded);
    }
}
