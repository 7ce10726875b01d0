//! The hybrid retrieval and ranking engine (spec §4.1–§4.3): lexical
//! (BM25), dense (cosine), and sparse (learned-keyword) legs fused via
//! Reciprocal Rank Fusion with optional adaptive weighting and
//! cross-encoder reranking.

pub mod adaptive;
pub mod dense;
pub mod engine;
pub mod fusion;
pub mod lexical;
pub mod rerank;
pub mod scoring;
pub mod snippets;
pub mod sparse;

pub use engine::{Facets, Filters, HybridSearchEngine, MethodContributions, Query, SearchResults, SortBy, SortDir};
