//! Dense vector retrieval: exhaustive cosine-similarity scan over
//! resources with a non-null embedding (spec §4.1 "Dense retrieval").
//! Grounded in
//! `original_source/backend/app/services/hybrid_search_methods.py::pure_vector_search`.

use rayon::prelude::*;
use uuid::Uuid;

use crate::retrieval::scoring::cosine_similarity;
use crate::types::Resource;

/// Scores every resource with a non-null embedding against `query_vec`
/// via cosine similarity, returning `(id, score)` sorted descending.
/// The scan is exhaustive; implementations with larger corpora may
/// substitute an ANN index behind the same contract.
pub fn search<'a>(resources: impl IntoIterator<Item = &'a Resource>, query_vec: &[f32]) -> Vec<(Uuid, f64)> {
    let candidates: Vec<&Resource> = resources
        .into_iter()
        .filter(|r| r.embedding.is_some())
        .collect();

    let mut scored: Vec<(Uuid, f64)> = candidates
        .par_iter()
        .map(|r| {
            let embedding = r.embedding.as_deref().unwrap_or(&[]);
            (r.id, cosine_similarity(query_vec, embedding))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}
