//! Search-quality metrics: nDCG@K, Recall@K, Precision@K, MRR (spec
//! §4.4). Pure functions over a ranked id list and a relevance
//! judgment map. Grounded in
//! `original_source/backend/app/services/search_metrics_service.py`.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

/// `DCG@k / IDCG@k`; `0.0` if `ranked_results` or `judgments` is empty,
/// or if the ideal DCG is zero (testable property 6, spec §8).
pub fn ndcg(ranked_results: &[Uuid], judgments: &HashMap<Uuid, u8>, k: usize) -> f64 {
    if ranked_results.is_empty() || judgments.is_empty() {
        return 0.0;
    }

    let dcg: f64 = ranked_results
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, id)| {
            let rel = *judgments.get(id).unwrap_or(&0) as i32;
            (2f64.powi(rel) - 1.0) / (i as f64 + 2.0).log2()
        })
        .sum();

    let mut ideal: Vec<i32> = judgments.values().map(|r| *r as i32).collect();
    ideal.sort_by(|a, b| b.cmp(a));
    let idcg: f64 = ideal
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(i, rel)| (2f64.powi(rel) - 1.0) / (i as f64 + 2.0).log2())
        .sum();

    if idcg == 0.0 {
        0.0
    } else {
        dcg / idcg
    }
}

/// `|top_k ∩ relevant| / |relevant|`; relevant = ids with `judgments[id]
/// > 0`. `0.0` if there are no relevant documents.
pub fn recall_at_k(ranked_results: &[Uuid], relevant: &[Uuid], k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let top_k: HashSet<&Uuid> = ranked_results.iter().take(k).collect();
    let relevant_set: HashSet<&Uuid> = relevant.iter().collect();
    let hits = top_k.intersection(&relevant_set).count();
    hits as f64 / relevant_set.len() as f64
}

/// `|top_k ∩ relevant| / k`; `0.0` if `k == 0`.
pub fn precision_at_k(ranked_results: &[Uuid], relevant: &[Uuid], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let top_k: HashSet<&Uuid> = ranked_results.iter().take(k).collect();
    let relevant_set: HashSet<&Uuid> = relevant.iter().collect();
    let hits = top_k.intersection(&relevant_set).count();
    hits as f64 / k as f64
}

/// `1 / rank_of_first_relevant` (1-based); `0.0` if no relevant
/// document appears in `ranked_results`.
pub fn mrr(ranked_results: &[Uuid], relevant: &[Uuid]) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let relevant_set: HashSet<&Uuid> = relevant.iter().collect();
    ranked_results
        .iter()
        .position(|id| relevant_set.contains(id))
        .map(|pos| 1.0 / (pos as f64 + 1.0))
        .unwrap_or(0.0)
}

/// Aggregate metrics returned by an evaluation request (spec §6,
/// `POST /search/evaluate`).
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationMetrics {
    pub ndcg: f64,
    pub recall: f64,
    pub precision: f64,
    pub mrr: f64,
}

/// Evaluates `ranked_results` against `judgments` at cutoff `k`,
/// deriving the relevant-doc set as `judgments[id] > 0`.
pub fn evaluate(ranked_results: &[Uuid], judgments: &HashMap<Uuid, u8>, k: usize) -> EvaluationMetrics {
    let relevant: Vec<Uuid> = judgments
        .iter()
        .filter(|(_, rel)| **rel > 0)
        .map(|(id, _)| *id)
        .collect();

    EvaluationMetrics {
        ndcg: ndcg(ranked_results, judgments, k),
        recall: recall_at_k(ranked_results, &relevant, k),
        precision: precision_at_k(ranked_results, &relevant, k),
        mrr: mrr(ranked_results, &relevant),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|i| Uuid::from_u128(i as u128 + 1)).collect()
    }

    // Scenario G (spec §8): nDCG with perfect ranking.
    #[test]
    fn scenario_g_perfect_ranking_has_ndcg_one() {
        let [d1, d2, d3] = [Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)];
        let judgments = HashMap::from([(d1, 3), (d2, 2), (d3, 1)]);
        let score = ndcg(&[d1, d2, d3], &judgments, 3);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ndcg_is_bounded_in_unit_interval() {
        let docs = ids(5);
        let judgments = HashMap::from([(docs[0], 1), (docs[1], 3), (docs[2], 0), (docs[3], 2)]);
        let shuffled = vec![docs[2], docs[0], docs[3], docs[1], docs[4]];
        let score = ndcg(&shuffled, &judgments, 5);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn ndcg_empty_inputs_are_zero() {
        assert_eq!(ndcg(&[], &HashMap::new(), 10), 0.0);
        let docs = ids(2);
        assert_eq!(ndcg(&docs, &HashMap::new(), 10), 0.0);
    }

    #[test]
    fn recall_increases_or_holds_as_k_grows() {
        let docs = ids(6);
        let relevant = vec![docs[1], docs[3], docs[5]];
        let r3 = recall_at_k(&docs, &relevant, 3);
        let r6 = recall_at_k(&docs, &relevant, 6);
        assert!(r6 >= r3);
    }

    #[test]
    fn recall_no_relevant_docs_is_zero() {
        let docs = ids(3);
        assert_eq!(recall_at_k(&docs, &[], 3), 0.0);
    }

    #[test]
    fn precision_example_matches_manual_computation() {
        let docs = ids(4);
        let relevant = vec![docs[0], docs[2]];
        let p = precision_at_k(&docs, &relevant, 4);
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn precision_zero_k_is_zero() {
        let docs = ids(4);
        assert_eq!(precision_at_k(&docs, &docs, 0), 0.0);
    }

    #[test]
    fn mrr_matches_first_relevant_rank() {
        let docs = ids(4);
        let relevant = vec![docs[2]];
        let score = mrr(&docs, &relevant);
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn mrr_no_relevant_is_zero() {
        let docs = ids(4);
        assert_eq!(mrr(&docs, &[]), 0.0);
    }

    #[test]
    fn evaluate_aggregates_all_four_metrics() {
        let docs = ids(3);
        let judgments = HashMap::from([(docs[0], 3), (docs[1], 2), (docs[2], 1)]);
        let metrics = evaluate(&docs, &judgments, 3);
        assert!((metrics.ndcg - 1.0).abs() < 1e-9);
        assert_eq!(metrics.recall, 1.0);
        assert!((metrics.precision - 1.0).abs() < 1e-9);
        assert_eq!(metrics.mrr, 1.0);
    }
}
