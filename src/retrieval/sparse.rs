//! Sparse (learned-keyword) retrieval: dot product of the query sparse
//! vector against each resource's sparse embedding (spec §4.1 "Sparse
//! retrieval"). If the AI core cannot produce a query sparse vector,
//! the caller passes `None` and this leg contributes zero results.

use uuid::Uuid;

use crate::types::{Resource, SparseVector};

/// Scores every resource with a non-empty sparse embedding against
/// `query_vec`, returning `(id, score)` sorted descending. Returns an
/// empty list if `query_vec` is `None` (model unavailable) or empty.
pub fn search<'a>(
    resources: impl IntoIterator<Item = &'a Resource>,
    query_vec: Option<&SparseVector>,
) -> Vec<(Uuid, f32)> {
    let Some(query_vec) = query_vec else {
        return Vec::new();
    };
    if query_vec.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(Uuid, f32)> = resources
        .into_iter()
        .filter_map(|r| {
            let sparse = r.sparse_embedding.as_ref()?;
            if sparse.is_empty() {
                return None;
            }
            let score = query_vec.dot(sparse);
            (score > 0.0).then_some((r.id, score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}
