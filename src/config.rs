//! Layered configuration: built-in defaults overridable via environment
//! variables prefixed `NEO_` (e.g. `NEO_RRF__K=80`), in the style of
//! `loganmoon-codesearch`'s `codesearch-core` config layer.

use serde::{Deserialize, Serialize};

use crate::error::{NeoError, NeoResult};

/// RRF fusion tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RrfSettings {
    /// Smoothing constant `k` (spec §4.2, default 60).
    pub k: u32,
}

impl Default for RrfSettings {
    fn default() -> Self {
        RrfSettings { k: 60 }
    }
}

/// Reranker tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RerankSettings {
    /// Hard cap applied to any caller-supplied `top_k` (spec §9 Open
    /// Questions: `top_k = min(limit, rerank_top_k_cap)`).
    pub top_k_cap: usize,
    /// Characters of description used to build the rerank document text.
    pub max_doc_chars: usize,
    /// Budget for a single scoring attempt (spec §4.3: "`timeout`
    /// exceeded before inference → return `[]`"). Each of the two
    /// attempts in the retry-once path gets its own budget of this size.
    pub timeout_ms: u64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        RerankSettings {
            top_k_cap: 100,
            max_doc_chars: 500,
            timeout_ms: 3000,
        }
    }
}

/// Event bus tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventBusSettings {
    /// Capacity of the bounded event-history ring (spec §4.5, default 1000).
    pub history_capacity: usize,
    /// Capacity of the latency sample rings used for percentiles.
    pub latency_sample_capacity: usize,
    /// Handlers slower than this are logged as slow (spec §4.5, default 100ms).
    pub slow_handler_threshold_ms: f64,
}

impl Default for EventBusSettings {
    fn default() -> Self {
        EventBusSettings {
            history_capacity: 1000,
            latency_sample_capacity: 1000,
            slow_handler_threshold_ms: 100.0,
        }
    }
}

/// Search engine tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub max_limit: usize,
    /// Snippet window width in characters (spec §4.1, default 200).
    pub snippet_window: usize,
    /// Per-leg retrieval budget (spec §5 "cancellation and timeouts"):
    /// a leg that exceeds this is cancelled and the engine proceeds
    /// with the others.
    pub leg_timeout_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            default_limit: 25,
            max_limit: 100,
            snippet_window: 200,
            leg_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Settings {
    pub rrf: RrfSettings,
    pub rerank: RerankSettings,
    pub event_bus: EventBusSettings,
    pub search: SearchSettings,
}

impl Settings {
    /// Loads defaults, then layers in `NEO_`-prefixed environment
    /// overrides (e.g. `NEO_RRF__K`, `NEO_SEARCH__MAX_LIMIT`).
    pub fn load() -> NeoResult<Self> {
        let defaults = Settings::default();
        let builder = ::config::Config::builder()
            .add_source(::config::Config::try_from(&defaults).map_err(|e| {
                NeoError::Internal(format!("failed to seed config defaults: {e}"))
            })?)
            .add_source(
                ::config::Environment::with_prefix("NEO")
                    .separator("__")
                    .try_parsing(true),
            );
        let built = builder
            .build()
            .map_err(|e| NeoError::Internal(format!("failed to build config: {e}")))?;
        built
            .try_deserialize()
            .map_err(|e| NeoError::Internal(format!("failed to deserialize config: {e}")))
    }
}
