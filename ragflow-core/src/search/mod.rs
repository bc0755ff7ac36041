//! Hybrid Search & Merge (C4): parallel engine fan-out, score fusion, and
//! deduplication across retrieval engines registered on [`RetrieverRegistry`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::CoreError;
use crate::model::{MatchType, SearchResult};
use crate::persistence::KnowledgeMetadataStore;
use crate::retriever::{FailureMode, RetrieverRegistry, RetrieverType, SearchParams};

/// Upper bound on concurrently in-flight engine calls: one per spare CPU,
/// at least one. Grounded on SPEC_FULL §4.4's explicit bounded-worker-count
/// requirement rather than leaving fan-out bounded only by the tokio
/// runtime's own thread pool.
fn max_concurrent_engines() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).saturating_sub(1).max(1)
}

/// FAQ two-tier priority tag configuration (see SPEC_FULL §9 open-question
/// resolution: tier bucketing happens before `match_count` truncation).
#[derive(Debug, Clone, Default)]
pub struct PriorityTagConfig {
    pub first_priority_tag_ids: HashSet<String>,
    pub second_priority_tag_ids: HashSet<String>,
}

fn priority_tier(result: &SearchResult, cfg: &PriorityTagConfig) -> u8 {
    let tag = result.metadata.get("tag_id").and_then(|v| v.as_str());
    match tag {
        Some(tag) if cfg.first_priority_tag_ids.contains(tag) => 2,
        Some(tag) if cfg.second_priority_tag_ids.contains(tag) => 1,
        _ => 0,
    }
}

/// Runs all engines whose support intersects the enabled retriever types in
/// parallel, bounded to [`max_concurrent_engines`] in-flight calls at a time
/// via a semaphore, then merges per the rules in SPEC_FULL §4.4 and enriches
/// the survivors with knowledge display metadata when `knowledge_metadata`
/// is given.
pub async fn hybrid_search(
    registry: &RetrieverRegistry,
    params: &SearchParams,
    enabled: &HashSet<RetrieverType>,
    priority: &PriorityTagConfig,
    failure_mode: FailureMode,
    knowledge_metadata: Option<&Arc<dyn KnowledgeMetadataStore>>,
) -> Result<Vec<SearchResult>, CoreError> {
    let engines = registry.active_engines(enabled).await;
    let permits = Arc::new(Semaphore::new(max_concurrent_engines()));
    let mut join_set = JoinSet::new();
    for engine in engines {
        let params = params.clone();
        let permits = permits.clone();
        join_set.spawn(async move {
            let _permit = permits.acquire_owned().await.expect("semaphore is never closed");
            engine.retrieve(&params).await
        });
    }

    let mut all_results = Vec::new();
    let mut any_success = false;
    let mut last_error = None;
    while let Some(res) = join_set.join_next().await {
        match res {
            Ok(Ok(results)) => {
                any_success = true;
                all_results.extend(results);
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "retriever engine failed");
                last_error = Some(err);
            }
            Err(join_err) => {
                tracing::warn!(error = %join_err, "retriever engine task panicked");
                last_error = Some(CoreError::Internal(join_err.to_string()));
            }
        }
    }

    if !any_success {
        if let Some(err) = last_error {
            if failure_mode == FailureMode::Strict {
                return Err(err);
            }
        }
    }

    let merged = merge(all_results, params, priority);
    match knowledge_metadata {
        Some(store) => enrich(merged, store.as_ref()).await,
        None => Ok(merged),
    }
}

/// Fills `knowledge_title`/`knowledge_filename`/`knowledge_source` on every
/// result via one batched lookup over the distinct `knowledge_id`s present,
/// rather than a lookup per result.
async fn enrich(
    mut results: Vec<SearchResult>,
    store: &dyn KnowledgeMetadataStore,
) -> Result<Vec<SearchResult>, CoreError> {
    let distinct_ids: Vec<String> = results
        .iter()
        .map(|r| r.knowledge_id.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    if distinct_ids.is_empty() {
        return Ok(results);
    }
    let metadata = store
        .get_many(&distinct_ids)
        .await
        .map_err(|e| CoreError::Internal(e.to_string()))?;
    for result in &mut results {
        if let Some(meta) = metadata.get(&result.knowledge_id) {
            result.knowledge_title = meta.title.clone();
            result.knowledge_filename = meta.filename.clone();
            result.knowledge_source = meta.source.clone();
        }
    }
    Ok(results)
}

/// Step 1: dedup by chunk_id keeping max score. Step 2: tier by FAQ priority
/// tags. Step 3: per-type thresholds, then global `match_count`. Step 4:
/// stable sort by `(tier desc, score desc, seq asc)`.
pub fn merge(
    results: Vec<SearchResult>,
    params: &SearchParams,
    priority: &PriorityTagConfig,
) -> Vec<SearchResult> {
    let mut best: HashMap<String, (usize, SearchResult)> = HashMap::new();
    for (seq, result) in results.into_iter().enumerate() {
        best.entry(result.chunk_id.clone())
            .and_modify(|(existing_seq, existing)| {
                if result.score > existing.score {
                    *existing = result.clone();
                    *existing_seq = seq;
                }
            })
            .or_insert((seq, result));
    }

    let threshold_for = |match_type: MatchType| match match_type {
        MatchType::Vector => params.vector_threshold,
        MatchType::Keyword => params.keyword_threshold,
        _ => 0.0,
    };

    let mut ranked: Vec<(u8, usize, SearchResult)> = best
        .into_values()
        .filter(|(_, r)| r.score >= threshold_for(r.match_type))
        .map(|(seq, r)| {
            let tier = priority_tier(&r, priority);
            (tier, seq, r)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then(b.2.score.partial_cmp(&a.2.score).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.1.cmp(&b.1))
    });

    let match_count = if params.match_count == 0 { usize::MAX } else { params.match_count };
    ranked.into_iter().take(match_count).map(|(_, _, r)| r).collect()
}
