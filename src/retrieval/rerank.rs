//! Cross-encoder reranking (spec §4.3). Grounded in
//! `original_source/backend/app/services/reranking_service.py`. The
//! cross-encoder model itself is an external collaborator reached
//! through the [`CrossEncoder`] trait — loading, batching, and
//! accelerator selection are that collaborator's concern, not this
//! crate's.

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::RerankSettings;

/// A query/document pair to be scored together.
pub struct RerankPair {
    pub id: Uuid,
    pub text: String,
}

/// External cross-encoder model collaborator. A real implementation
/// wraps a loaded model (or a call to an inference service); this
/// crate only defines the contract and its failure handling.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    async fn score(&self, query: &str, pairs: &[RerankPair]) -> Result<Vec<f32>, String>;
}

/// Builds `(id, title + first max_doc_chars of description)` pairs for
/// `candidate_ids`, skipping candidates with no text content.
pub fn build_pairs<'a>(
    candidates: impl IntoIterator<Item = (Uuid, &'a str, &'a str)>,
    max_doc_chars: usize,
) -> Vec<RerankPair> {
    candidates
        .into_iter()
        .filter_map(|(id, title, description)| {
            let truncated_desc = truncate_chars(description, max_doc_chars);
            let text = [title, truncated_desc.as_str()]
                .iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            (!text.trim().is_empty()).then_some(RerankPair { id, text })
        })
        .collect()
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Resolves the effective `top_k`: the caller's `limit`, capped at
/// `rerank_top_k_cap` (an Open Question in spec §4.3, resolved here as
/// `min(limit, cap)`).
pub fn resolve_top_k(limit: usize, settings: &RerankSettings) -> usize {
    limit.min(settings.top_k_cap)
}

/// Outcome of a single scoring attempt.
enum Attempt {
    Scores(Vec<f32>),
    Failed(String),
    TimedOut,
}

async fn score_once(
    model: &dyn CrossEncoder,
    query: &str,
    pairs: &[RerankPair],
    timeout: Option<Duration>,
) -> Attempt {
    let scoring = model.score(query, pairs);
    match timeout {
        Some(d) => match tokio::time::timeout(d, scoring).await {
            Ok(Ok(scores)) => Attempt::Scores(scores),
            Ok(Err(e)) => Attempt::Failed(e),
            Err(_) => Attempt::TimedOut,
        },
        None => match scoring.await {
            Ok(scores) => Attempt::Scores(scores),
            Err(e) => Attempt::Failed(e),
        },
    }
}

/// Scores `pairs` against `query`, retrying once before giving up — the
/// accelerator-failure contract of spec §4.3 ("fall back to CPU and
/// retry once; on second failure return `[]`"). The retry itself is a
/// second call through the same `CrossEncoder` seam; falling back to a
/// different accelerator, if any, is that collaborator's concern.
async fn score_with_retry(
    model: &dyn CrossEncoder,
    query: &str,
    pairs: &[RerankPair],
    timeout: Option<Duration>,
) -> Option<Vec<f32>> {
    for attempt in 1..=2 {
        match score_once(model, query, pairs, timeout).await {
            Attempt::Scores(scores) => return Some(scores),
            Attempt::Failed(e) => {
                if attempt == 1 {
                    tracing::warn!(error = %e, "reranking model failed, retrying once");
                } else {
                    tracing::warn!(error = %e, "reranking model failed on retry, degrading to empty result");
                    return None;
                }
            }
            Attempt::TimedOut => {
                let timeout_ms = timeout.map(|d| d.as_millis() as u64).unwrap_or(0);
                if attempt == 1 {
                    tracing::warn!(timeout_ms, "reranking timed out, retrying once");
                } else {
                    tracing::warn!(timeout_ms, "reranking timed out on retry, degrading to empty result");
                    return None;
                }
            }
        }
    }
    None
}

/// Reranks `pairs` against `query` using `model`, returning up to
/// `top_k` `(id, score)` pairs sorted descending. A failed or timed-out
/// attempt is retried once; degrades to `[]` if the retry also fails or
/// times out — never propagates an error to the caller, who treats an
/// empty result as "keep the fused order."
pub async fn rerank(
    model: &dyn CrossEncoder,
    query: &str,
    pairs: Vec<RerankPair>,
    top_k: usize,
    timeout: Option<Duration>,
) -> Vec<(Uuid, f32)> {
    let query = query.trim();
    if query.is_empty() || pairs.is_empty() {
        return Vec::new();
    }

    let ids: Vec<Uuid> = pairs.iter().map(|p| p.id).collect();

    let scores = match score_with_retry(model, query, &pairs, timeout).await {
        Some(scores) => scores,
        None => return Vec::new(),
    };

    if scores.len() != ids.len() {
        tracing::warn!(
            expected = ids.len(),
            got = scores.len(),
            "reranker returned mismatched score count"
        );
        return Vec::new();
    }

    let mut scored: Vec<(Uuid, f32)> = ids.into_iter().zip(scores).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

/// Caller-owned result cache keyed by `hash(query|sorted(ids)|top_k)`.
pub type RerankCache = std::collections::HashMap<String, Vec<(Uuid, f32)>>;

/// Computes the cache key for a rerank request. Candidate ids are
/// sorted first so key construction is order-independent.
pub fn cache_key(query: &str, candidate_ids: &[Uuid], top_k: usize) -> String {
    let mut sorted: Vec<String> = candidate_ids.iter().map(Uuid::to_string).collect();
    sorted.sort();
    let raw = format!("{query}|{}|{top_k}", sorted.join(","));
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Reranks with caching: returns the cached result on a hit, otherwise
/// reranks, stores, and returns the fresh result. A `None` cache
/// performs no caching.
pub async fn rerank_with_caching(
    model: &dyn CrossEncoder,
    query: &str,
    pairs: Vec<RerankPair>,
    top_k: usize,
    timeout: Option<Duration>,
    cache: Option<&mut RerankCache>,
) -> Vec<(Uuid, f32)> {
    let Some(cache) = cache else {
        return rerank(model, query, pairs, top_k, timeout).await;
    };

    let ids: Vec<Uuid> = pairs.iter().map(|p| p.id).collect();
    let key = cache_key(query, &ids, top_k);
    if let Some(cached) = cache.get(&key) {
        return cached.clone();
    }

    let results = rerank(model, query, pairs, top_k, timeout).await;
    cache.insert(key, results.clone());
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubEncoder {
        scores: Vec<f32>,
    }

    #[async_trait]
    impl CrossEncoder for StubEncoder {
        async fn score(&self, _query: &str, _pairs: &[RerankPair]) -> Result<Vec<f32>, String> {
            Ok(self.scores.clone())
        }
    }

    struct FailingEncoder {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl FailingEncoder {
        fn new() -> Self {
            FailingEncoder {
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CrossEncoder for FailingEncoder {
        async fn score(&self, _query: &str, _pairs: &[RerankPair]) -> Result<Vec<f32>, String> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err("model unavailable".to_string())
        }
    }

    /// Fails on the first call, succeeds on the second — exercises the
    /// retry-once path.
    struct FlakyOnceEncoder {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl FlakyOnceEncoder {
        fn new() -> Self {
            FlakyOnceEncoder {
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CrossEncoder for FlakyOnceEncoder {
        async fn score(&self, _query: &str, _pairs: &[RerankPair]) -> Result<Vec<f32>, String> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                Err("out of memory on accelerator".to_string())
            } else {
                Ok(vec![0.7])
            }
        }
    }

    struct SlowEncoder;

    #[async_trait]
    impl CrossEncoder for SlowEncoder {
        async fn score(&self, _query: &str, _pairs: &[RerankPair]) -> Result<Vec<f32>, String> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(vec![1.0])
        }
    }

    fn pair(id: Uuid) -> RerankPair {
        RerankPair {
            id,
            text: "some document text".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_query_yields_empty_result() {
        let model = StubEncoder { scores: vec![] };
        let result = rerank(&model, "", vec![pair(Uuid::new_v4())], 10, None).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn model_failure_degrades_to_empty_after_one_retry() {
        let model = FailingEncoder::new();
        let result = rerank(&model, "query", vec![pair(Uuid::new_v4())], 10, None).await;
        assert!(result.is_empty());
        assert_eq!(model.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once_then_succeeds() {
        let model = FlakyOnceEncoder::new();
        let result = rerank(&model, "query", vec![pair(Uuid::new_v4())], 10, None).await;
        assert_eq!(result.len(), 1);
        assert_eq!(model.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timeout_degrades_to_empty() {
        let model = SlowEncoder;
        let result = rerank(
            &model,
            "query",
            vec![pair(Uuid::new_v4())],
            10,
            Some(Duration::from_millis(5)),
        )
        .await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn results_are_sorted_and_truncated() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let model = StubEncoder {
            scores: vec![0.2, 0.9, 0.5],
        };
        let pairs: Vec<RerankPair> = ids.iter().map(|id| pair(*id)).collect();
        let result = rerank(&model, "query", pairs, 2, None).await;
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].0, ids[1]);
        assert_eq!(result[1].0, ids[2]);
    }

    #[test]
    fn cache_key_is_order_independent() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let k1 = cache_key("q", &[a, b], 10);
        let k2 = cache_key("q", &[b, a], 10);
        assert_eq!(k1, k2);
    }

    #[tokio::test]
    async fn caching_returns_identical_result_on_hit() {
        let model = StubEncoder { scores: vec![0.5] };
        let id = Uuid::new_v4();
        let mut cache = RerankCache::new();
        let first = rerank_with_caching(
            &model,
            "query",
            vec![pair(id)],
            10,
            None,
            Some(&mut cache),
        )
        .await;
        assert_eq!(cache.len(), 1);
        let second = rerank_with_caching(
            &model,
            "query",
            vec![pair(id)],
            10,
            None,
            Some(&mut cache),
        )
        .await;
        assert_eq!(first, second);
    }

    #[test]
    fn resolve_top_k_caps_at_settings() {
        let settings = RerankSettings {
            top_k_cap: 100,
            max_doc_chars: 500,
            timeout_ms: 3000,
        };
        assert_eq!(resolve_top_k(25, &settings), 25);
        assert_eq!(resolve_top_k(150, &settings), 100);
    }
}
