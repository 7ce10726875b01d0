//! # Neo Alexandria core
//!
//! Hybrid retrieval, search-quality metrics, authority/taxonomy
//! normalization, and the in-process event bus backing a personal
//! knowledge-management system.
//!
//! ## Architecture
//!
//! ```text
//! neo-alexandria-core/
//! ├── storage/      # in-memory resource table (real storage layer is external)
//! ├── embedding/    # AiCore trait seam (embed/sparse_embed/summarize/tag)
//! ├── retrieval/    # lexical (tantivy BM25) + dense + sparse + RRF fusion + reranking
//! ├── metrics/      # nDCG/Recall/Precision/MRR search-quality evaluation
//! ├── authority/    # subject/creator/publisher normalization + classification
//! ├── taxonomy/     # materialized-path category tree
//! ├── events/       # in-process priority-tagged event bus
//! └── config/       # layered settings
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use neo_alexandria_core::retrieval::{HybridSearchEngine, Query};
//! use neo_alexandria_core::config::Settings;
//!
//! let settings = Settings::load()?;
//! let engine = HybridSearchEngine::new(&settings, &ai_core);
//! let results = engine.search(&Query::default(), &corpus).await?;
//! ```

#![warn(clippy::all)]

pub use error::{NeoError, NeoResult};

/// Crate-wide error type.
pub mod error;

/// Core record types shared across all modules.
pub mod types;

/// Layered configuration.
pub mod config;

/// In-process, synchronous, priority-tagged event bus.
pub mod events;

/// In-memory resource table (the real storage layer is an external
/// collaborator; this is a stand-in for it).
pub mod storage;

/// `AiCore` trait seam (embeddings, sparse embeddings, summarization,
/// tagging) plus a test double.
pub mod embedding;

/// Hybrid retrieval: lexical, dense, sparse legs, RRF fusion,
/// adaptive weighting, and cross-encoder reranking.
pub mod retrieval;

/// Search-quality evaluation: nDCG, Recall@K, Precision@K, MRR.
pub mod metrics;

/// Subject/creator/publisher normalization and rule-based
/// classification.
pub mod authority;

/// Materialized-path taxonomy tree.
pub mod taxonomy;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::{NeoError, NeoResult};
    pub use crate::retrieval::{HybridSearchEngine, Query, SearchResults};
    pub use crate::types::*;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_lib_compiles() {
        assert!(true);
    }
}
