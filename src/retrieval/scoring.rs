//! Score normalization and cosine similarity, shared by the dense leg and
//! two-way hybrid scoring (spec §4.1 "Scoring and ordering"). Grounded in
//! `original_source/backend/app/services/hybrid_search_methods.py::normalize_scores,
//! cosine_similarity`.

/// Min-max normalizes `scores` to `[0,1]`. Empty input returns empty;
/// a single value or an all-equal input normalizes to `1.0` for every
/// element (testable property 3, spec §8).
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    if scores.len() == 1 {
        return vec![1.0];
    }
    let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

/// Cosine similarity. Zero-norm vectors or mismatched dimensions both
/// yield `0.0` rather than raising (testable property 4, spec §8).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
