//! Reciprocal Rank Fusion (spec §4.2). Grounded in
//! `original_source/backend/app/services/reciprocal_rank_fusion_service.py`.

use std::collections::HashMap;

use uuid::Uuid;

/// RRF smoothing constant default (spec §4.2).
pub const DEFAULT_K: u32 = 60;

/// Normalizes fusion weights per spec §4.2: missing weights, a length
/// mismatch against `list_count`, or an all-zero weight vector all fall
/// back to equal weights; otherwise weights are normalized to sum to 1.
pub fn normalize_weights(weights: Option<&[f64]>, list_count: usize) -> Vec<f64> {
    if list_count == 0 {
        return Vec::new();
    }
    let equal = vec![1.0 / list_count as f64; list_count];

    let weights = match weights {
        Some(w) if w.len() == list_count => w.to_vec(),
        Some(w) => {
            tracing::warn!(
                given = w.len(),
                expected = list_count,
                "RRF weights length mismatch, using equal weights"
            );
            return equal;
        }
        None => return equal,
    };

    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        tracing::warn!("RRF weights sum to zero, using equal weights");
        return equal;
    }
    weights.iter().map(|w| w / sum).collect()
}

/// Fuses `result_lists` (each an ordered list of doc ids; per-leg scores
/// are discarded — only rank matters) using Reciprocal Rank Fusion with
/// constant `k`. Returns `(doc_id, rrf_score)` sorted by score descending.
///
/// Testable property 1 (spec §8): for any input weights with non-zero
/// sum, the weights actually used sum to 1 (±1e-9) — enforced by
/// [`normalize_weights`], which this function always routes through.
pub fn fuse(result_lists: &[Vec<Uuid>], weights: Option<&[f64]>, k: u32) -> Vec<(Uuid, f64)> {
    if result_lists.is_empty() || result_lists.iter().all(|l| l.is_empty()) {
        return Vec::new();
    }

    let weights = normalize_weights(weights, result_lists.len());
    let mut scores: HashMap<Uuid, f64> = HashMap::new();

    for (list, weight) in result_lists.iter().zip(weights.iter()) {
        for (rank, doc_id) in list.iter().enumerate() {
            let contribution = weight / (k as f64 + rank as f64);
            *scores.entry(*doc_id).or_insert(0.0) += contribution;
        }
    }

    let mut fused: Vec<(Uuid, f64)> = scores.into_iter().collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}
