//! Core record types shared across all modules: `Resource`, `TaxonomyNode`,
//! `ResourceTaxonomy`, and the event-bus `Event` payload, plus the
//! authority rows and quality record embedded in `Resource`.
//!
//! All field names are stable wire names (serialized via `serde` using
//! the same snake_case the original schemas use).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{NeoError, NeoResult};

/// Dimension of dense embeddings used across the crate. The Python
/// original targets BGE-M3-family models at 768 dims.
pub const EMBEDDING_DIM: usize = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    Unread,
    InProgress,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Per-dimension quality weights; must sum to 1.0 within tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub accuracy: f64,
    pub completeness: f64,
    pub consistency: f64,
    pub timeliness: f64,
    pub relevance: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        // Default weights from spec §4.7.
        QualityWeights {
            accuracy: 0.30,
            completeness: 0.25,
            consistency: 0.20,
            timeliness: 0.15,
            relevance: 0.10,
        }
    }
}

/// `quality_overall` plus the five dimension scores and their weights.
/// The invariant `quality_overall == Σ w_d * s_d` (tolerance 1e-6) is
/// enforced by `QualityRecord::new`, which recomputes `overall` itself
/// rather than trusting a caller-supplied value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityRecord {
    pub accuracy: f64,
    pub completeness: f64,
    pub consistency: f64,
    pub timeliness: f64,
    pub relevance: f64,
    pub weights: QualityWeights,
    overall: f64,
}

impl QualityRecord {
    pub fn new(
        accuracy: f64,
        completeness: f64,
        consistency: f64,
        timeliness: f64,
        relevance: f64,
        weights: QualityWeights,
    ) -> Self {
        let overall = weights.accuracy * accuracy
            + weights.completeness * completeness
            + weights.consistency * consistency
            + weights.timeliness * timeliness
            + weights.relevance * relevance;
        QualityRecord {
            accuracy,
            completeness,
            consistency,
            timeliness,
            relevance,
            weights,
            overall,
        }
    }

    /// The weighted overall quality score, `Σ w_d * s_d`.
    pub fn overall(&self) -> f64 {
        self.overall
    }
}

impl Default for QualityRecord {
    fn default() -> Self {
        QualityRecord::new(0.0, 0.0, 0.0, 0.0, 0.0, QualityWeights::default())
    }
}

/// A sparse learned-keyword vector: `term_id -> weight`. Weights are
/// non-negative and zero-weight entries are never stored (spec §3
/// invariant); `SparseVector::new` filters and validates at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector(BTreeMap<u32, f32>);

impl SparseVector {
    pub fn new(weights: impl IntoIterator<Item = (u32, f32)>) -> NeoResult<Self> {
        let mut map = BTreeMap::new();
        for (term, weight) in weights {
            if weight < 0.0 {
                return Err(NeoError::InvalidArgument(format!(
                    "sparse embedding weight for term {term} is negative: {weight}"
                )));
            }
            if weight != 0.0 {
                map.insert(term, weight);
            }
        }
        Ok(SparseVector(map))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dot product with another sparse vector; terms absent from either
    /// side contribute zero.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (smaller, larger) = if self.0.len() <= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        smaller
            .iter()
            .filter_map(|(term, weight)| larger.get(term).map(|w2| weight * w2))
            .sum()
    }
}

/// The indexed unit: a web resource with AI-derived metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub subject: Vec<String>,
    pub creator: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub r#type: Option<String>,
    pub classification_code: Option<String>,
    pub read_status: ReadStatus,
    pub quality: QualityRecord,
    pub embedding: Option<Vec<f32>>,
    pub sparse_embedding: Option<SparseVector>,
    pub sparse_embedding_model: Option<String>,
    pub sparse_embedding_updated_at: Option<DateTime<Utc>>,
    pub ingestion_status: IngestionStatus,
    pub ingestion_error: Option<String>,
    pub needs_quality_review: bool,
    pub outlier_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// A resource is searchable iff its ingestion has completed (spec §3).
    pub fn is_searchable(&self) -> bool {
        self.ingestion_status == IngestionStatus::Completed
    }

    /// Validates the `embedding` length == D and sparse-embedding
    /// non-negativity invariants (the latter is already enforced by
    /// `SparseVector::new`, this only re-checks embedding dimension).
    pub fn validate(&self) -> NeoResult<()> {
        if let Some(embedding) = &self.embedding {
            if embedding.len() != EMBEDDING_DIM {
                return Err(NeoError::InvalidArgument(format!(
                    "embedding length {} does not match expected dimension {}",
                    embedding.len(),
                    EMBEDDING_DIM
                )));
            }
        }
        Ok(())
    }
}

/// A node in the materialized-path taxonomy tree (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyNode {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub level: i32,
    pub path: String,
    pub keywords: Vec<String>,
    pub description: Option<String>,
    pub resource_count: i64,
    pub descendant_resource_count: i64,
    pub is_leaf: bool,
    pub allow_resources: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assignment of a resource to a taxonomy node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTaxonomy {
    pub resource_id: Uuid,
    pub taxonomy_node_id: Uuid,
    pub confidence: f64,
    pub is_predicted: bool,
    pub predicted_by: Option<String>,
    pub needs_review: bool,
    pub review_priority: f64,
}

impl ResourceTaxonomy {
    /// Constructs an assignment, enforcing the `confidence < 0.7 =>
    /// needs_review` invariant from spec §3 regardless of caller input.
    pub fn new(
        resource_id: Uuid,
        taxonomy_node_id: Uuid,
        confidence: f64,
        is_predicted: bool,
        predicted_by: Option<String>,
    ) -> Self {
        let needs_review = confidence < 0.7;
        let review_priority = if needs_review { 1.0 - confidence } else { 0.0 };
        ResourceTaxonomy {
            resource_id,
            taxonomy_node_id,
            confidence,
            is_predicted,
            predicted_by,
            needs_review,
            review_priority,
        }
    }

    /// A manual assignment: never auto-deleted on reclassification.
    pub fn manual(resource_id: Uuid, taxonomy_node_id: Uuid) -> Self {
        ResourceTaxonomy::new(resource_id, taxonomy_node_id, 1.0, false, None)
    }
}

/// Priority tag carried on an `Event`; used only for logging/metrics,
/// never for delivery ordering (spec §4.5, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for EventPriority {
    fn default() -> Self {
        EventPriority::Normal
    }
}

/// The event-bus payload. `data` is an opaque map of dynamic values —
/// subscribers define their own schemas for the keys they read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub priority: EventPriority,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

/// An authority-control row backing subject/creator/publisher
/// normalization (spec §4.6), grounded in
/// `original_source/backend/app/modules/authority/service.py`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityEntry {
    pub canonical_form: String,
    pub variants: Vec<String>,
    pub usage_count: u64,
}

impl AuthorityEntry {
    pub fn new(canonical_form: impl Into<String>) -> Self {
        AuthorityEntry {
            canonical_form: canonical_form.into(),
            variants: Vec::new(),
            usage_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_overall_matches_weighted_sum() {
        let q = QualityRecord::new(1.0, 1.0, 1.0, 1.0, 1.0, QualityWeights::default());
        assert!((q.overall() - 1.0).abs() < 1e-6);

        let q2 = QualityRecord::new(0.5, 0.6, 0.7, 0.8, 0.9, QualityWeights::default());
        let expected =
            0.30 * 0.5 + 0.25 * 0.6 + 0.20 * 0.7 + 0.15 * 0.8 + 0.10 * 0.9;
        assert!((q2.overall() - expected).abs() < 1e-6);
    }

    #[test]
    fn sparse_vector_drops_zero_weights_and_rejects_negative() {
        let v = SparseVector::new(vec![(1, 0.5), (2, 0.0), (3, 1.5)]).unwrap();
        assert_eq!(v.iter().count(), 2);

        let err = SparseVector::new(vec![(1, -0.1)]);
        assert!(err.is_err());
    }

    #[test]
    fn sparse_vector_dot_product() {
        let a = SparseVector::new(vec![(1, 2.0), (2, 3.0)]).unwrap();
        let b = SparseVector::new(vec![(2, 4.0), (3, 5.0)]).unwrap();
        // Only term 2 overlaps: 3.0 * 4.0 = 12.0
        assert_eq!(a.dot(&b), 12.0);
    }

    #[test]
    fn resource_taxonomy_low_confidence_needs_review() {
        let rt = ResourceTaxonomy::new(Uuid::new_v4(), Uuid::new_v4(), 0.4, true, Some("ml".into()));
        assert!(rt.needs_review);
        assert!((rt.review_priority - 0.6).abs() < 1e-9);

        let rt2 = ResourceTaxonomy::new(Uuid::new_v4(), Uuid::new_v4(), 0.9, true, Some("ml".into()));
        assert!(!rt2.needs_review);
        assert_eq!(rt2.review_priority, 0.0);
    }

    #[test]
    fn manual_assignment_is_full_confidence() {
        let rt = ResourceTaxonomy::manual(Uuid::new_v4(), Uuid::new_v4());
        assert!(!rt.is_predicted);
        assert_eq!(rt.confidence, 1.0);
        assert!(!rt.needs_review);
    }
}
