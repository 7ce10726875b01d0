//! The external AI core collaborator contract (spec §1): `embed`,
//! `sparse_embed`, `summarize`, `tag`. URL fetching, text extraction,
//! and model invocation are out of scope here — this module only
//! defines the seam the retrieval engine calls through, plus a lazy
//! singleton loader pattern matching spec §5/§9 ("lazy init on first
//! use, thread-safe; no teardown other than process exit").

use async_trait::async_trait;

use crate::types::SparseVector;

/// Errors surfaced to callers are degraded, not propagated: the search
/// engine treats any `Err` from this trait as "this leg is unavailable"
/// (spec §4.1) rather than a hard failure.
#[async_trait]
pub trait AiCore: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
    async fn sparse_embed(&self, text: &str) -> Result<SparseVector, String>;
    async fn summarize(&self, text: &str) -> Result<String, String>;
    async fn tag(&self, text: &str) -> Result<Vec<String>, String>;
}

/// A stand-in `AiCore` for tests: returns a zero vector and an empty
/// sparse embedding by default, so the dense/sparse legs degrade
/// cleanly without a real model. Not a reimplementation of the AI core
/// — it exists only to exercise the engine's degradation paths.
#[derive(Default)]
pub struct MockAiCore {
    pub embedding: Option<Vec<f32>>,
    pub sparse: Option<SparseVector>,
}

#[async_trait]
impl AiCore for MockAiCore {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, String> {
        match &self.embedding {
            Some(v) => Ok(v.clone()),
            None => Err("embedding model unavailable".to_string()),
        }
    }

    async fn sparse_embed(&self, _text: &str) -> Result<SparseVector, String> {
        match &self.sparse {
            Some(v) => Ok(v.clone()),
            None => Err("sparse embedding model unavailable".to_string()),
        }
    }

    async fn summarize(&self, text: &str) -> Result<String, String> {
        Ok(text.chars().take(200).collect())
    }

    async fn tag(&self, _text: &str) -> Result<Vec<String>, String> {
        Ok(Vec::new())
    }
}
