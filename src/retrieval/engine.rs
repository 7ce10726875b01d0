//! The hybrid search engine: query routing, fusion, reranking, facets,
//! snippets, and result assembly (spec §4.1). Grounded in
//! `original_source/backend/app/services/search_service.py` and
//! `hybrid_search_methods.py` for orchestration shape, generalized from
//! the Python two-way fusion to the three-way RRF contract in §4.2.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Settings;
use crate::embedding::AiCore;
use crate::error::{NeoError, NeoResult};
use crate::retrieval::rerank::CrossEncoder;
use crate::retrieval::{adaptive, dense, fusion, lexical, rerank, scoring, snippets, sparse};
use crate::types::{ReadStatus, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Relevance,
    UpdatedAt,
    CreatedAt,
    QualityScore,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub classification_code: Vec<String>,
    pub r#type: Vec<String>,
    pub language: Vec<String>,
    pub read_status: Vec<ReadStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub updated_from: Option<DateTime<Utc>>,
    pub updated_to: Option<DateTime<Utc>>,
    pub subject_any: Vec<String>,
    pub subject_all: Vec<String>,
    pub min_quality: Option<f64>,
}

impl Filters {
    fn matches(&self, resource: &Resource) -> bool {
        if !self.classification_code.is_empty() {
            let Some(code) = &resource.classification_code else {
                return false;
            };
            if !self.classification_code.contains(code) {
                return false;
            }
        }
        if !self.r#type.is_empty() {
            let Some(t) = &resource.r#type else {
                return false;
            };
            if !self.r#type.contains(t) {
                return false;
            }
        }
        if !self.language.is_empty() {
            let Some(lang) = &resource.language else {
                return false;
            };
            if !self.language.contains(lang) {
                return false;
            }
        }
        if !self.read_status.is_empty() && !self.read_status.contains(&resource.read_status) {
            return false;
        }
        if let Some(from) = self.created_from {
            if resource.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if resource.created_at > to {
                return false;
            }
        }
        if let Some(from) = self.updated_from {
            if resource.updated_at < from {
                return false;
            }
        }
        if let Some(to) = self.updated_to {
            if resource.updated_at > to {
                return false;
            }
        }
        if !self.subject_any.is_empty()
            && !self.subject_any.iter().any(|s| resource.subject.contains(s))
        {
            return false;
        }
        if !self.subject_all.is_empty()
            && !self.subject_all.iter().all(|s| resource.subject.contains(s))
        {
            return false;
        }
        if let Some(min_quality) = self.min_quality {
            if resource.quality.overall() < min_quality {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub filters: Filters,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: SortBy,
    pub sort_dir: SortDir,
    pub hybrid_weight: Option<f64>,
    pub enable_reranking: bool,
    pub adaptive_weighting: bool,
}

impl Default for Query {
    fn default() -> Self {
        Query {
            text: String::new(),
            filters: Filters::default(),
            limit: 25,
            offset: 0,
            sort_by: SortBy::Relevance,
            sort_dir: SortDir::Desc,
            hybrid_weight: None,
            enable_reranking: false,
            adaptive_weighting: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FacetBucket {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub classification_code: Vec<FacetBucket>,
    pub r#type: Vec<FacetBucket>,
    pub language: Vec<FacetBucket>,
    pub read_status: Vec<FacetBucket>,
    pub subject: Vec<FacetBucket>,
}

#[derive(Debug, Clone, Default)]
pub struct MethodContributions {
    pub fts5: usize,
    pub dense: usize,
    pub sparse: usize,
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    pub total: usize,
    pub items: Vec<Resource>,
    pub facets: Facets,
    pub snippets: HashMap<Uuid, String>,
    pub latency_ms: f64,
    pub method_contributions: MethodContributions,
    pub weights_used: [f64; 3],
}

fn top_buckets(counts: HashMap<String, u64>, limit: usize) -> Vec<FacetBucket> {
    let mut buckets: Vec<FacetBucket> = counts
        .into_iter()
        .map(|(key, count)| FacetBucket { key, count })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    buckets.truncate(limit);
    buckets
}

fn compute_facets(resources: &[&Resource]) -> Facets {
    let mut classification_code: HashMap<String, u64> = HashMap::new();
    let mut r#type: HashMap<String, u64> = HashMap::new();
    let mut language: HashMap<String, u64> = HashMap::new();
    let mut read_status: HashMap<String, u64> = HashMap::new();
    let mut subject: HashMap<String, u64> = HashMap::new();

    for resource in resources {
        if let Some(code) = &resource.classification_code {
            *classification_code.entry(code.clone()).or_insert(0) += 1;
        }
        if let Some(t) = &resource.r#type {
            *r#type.entry(t.clone()).or_insert(0) += 1;
        }
        if let Some(lang) = &resource.language {
            *language.entry(lang.clone()).or_insert(0) += 1;
        }
        *read_status
            .entry(format!("{:?}", resource.read_status))
            .or_insert(0) += 1;
        for s in &resource.subject {
            *subject.entry(s.clone()).or_insert(0) += 1;
        }
    }

    Facets {
        classification_code: top_buckets(classification_code, 10),
        r#type: top_buckets(r#type, 10),
        language: top_buckets(language, 10),
        read_status: top_buckets(read_status, 10),
        subject: top_buckets(subject, 25),
    }
}

fn sort_key(resource: &Resource, sort_by: SortBy) -> std::cmp::Reverse<String> {
    let key = match sort_by {
        SortBy::UpdatedAt | SortBy::Relevance => resource.updated_at.to_rfc3339(),
        SortBy::CreatedAt => resource.created_at.to_rfc3339(),
        SortBy::QualityScore => format!("{:020.10}", resource.quality.overall()),
        SortBy::Title => resource.title.to_lowercase(),
    };
    std::cmp::Reverse(key)
}

fn apply_structured_sort(mut resources: Vec<&Resource>, sort_by: SortBy, sort_dir: SortDir) -> Vec<&Resource> {
    resources.sort_by_key(|r| sort_key(r, sort_by));
    if sort_dir == SortDir::Asc {
        resources.reverse();
    }
    resources
}

/// Applies tie-break boosts to lexical scores before normalization:
/// higher `quality_overall`, more recent `updated_at`, matching
/// `classification_code` filter, ascending `id` (spec §4.1 "Ranking
/// tie-breaks and boosts").
fn lexical_tie_break_order(a: &Resource, b: &Resource, filters: &Filters) -> std::cmp::Ordering {
    b.quality
        .overall()
        .partial_cmp(&a.quality.overall())
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| {
            let a_match = a
                .classification_code
                .as_ref()
                .map(|c| filters.classification_code.contains(c))
                .unwrap_or(false);
            let b_match = b
                .classification_code
                .as_ref()
                .map(|c| filters.classification_code.contains(c))
                .unwrap_or(false);
            b_match.cmp(&a_match)
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// The hybrid search engine. Holds no resource storage itself — callers
/// supply the candidate corpus per call, matching the "storage layer is
/// an external collaborator" boundary (spec §1).
pub struct HybridSearchEngine<'a> {
    pub settings: &'a Settings,
    pub ai_core: &'a dyn AiCore,
    pub reranker: Option<&'a dyn CrossEncoder>,
}

impl<'a> HybridSearchEngine<'a> {
    pub fn new(settings: &'a Settings, ai_core: &'a dyn AiCore) -> Self {
        HybridSearchEngine {
            settings,
            ai_core,
            reranker: None,
        }
    }

    /// Attaches a cross-encoder collaborator so three-way searches with
    /// `enable_reranking=true` apply it (spec §4.1 step "optionally
    /// followed by reranking").
    pub fn with_reranker(mut self, reranker: &'a dyn CrossEncoder) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Executes `query` over `corpus`, implementing the decision table,
    /// fusion, facets, snippets, and result-assembly pipeline of §4.1.
    pub async fn search(&self, query: &Query, corpus: &[Resource]) -> NeoResult<SearchResults> {
        let start = Instant::now();

        if query.limit == 0 || query.limit > self.settings.search.max_limit {
            return Err(NeoError::InvalidArgument(format!(
                "limit must be in [1,{}]",
                self.settings.search.max_limit
            )));
        }
        if let Some(w) = query.hybrid_weight {
            if !(0.0..=1.0).contains(&w) {
                return Err(NeoError::InvalidArgument(
                    "hybrid_weight must be in [0,1]".to_string(),
                ));
            }
        }

        let filtered: Vec<&Resource> = corpus
            .iter()
            .filter(|r| r.is_searchable() && query.filters.matches(r))
            .collect();

        if query.text.trim().is_empty() {
            return Ok(self.search_structured(query, filtered, start));
        }

        if !query.enable_reranking && query.hybrid_weight.is_some() {
            return self.search_two_way(query, filtered, start).await;
        }

        self.search_three_way(query, filtered, start).await
    }

    fn search_structured(&self, query: &Query, filtered: Vec<&Resource>, start: Instant) -> SearchResults {
        let facets = compute_facets(&filtered);
        let ordered = apply_structured_sort(filtered, query.sort_by, query.sort_dir);
        let total = ordered.len();
        let page: Vec<Resource> = ordered
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();

        SearchResults {
            total,
            items: page,
            facets,
            snippets: HashMap::new(),
            latency_ms: elapsed_ms(start),
            method_contributions: MethodContributions::default(),
            weights_used: [0.0, 0.0, 0.0],
        }
    }

    async fn search_two_way(
        &self,
        query: &Query,
        filtered: Vec<&Resource>,
        start: Instant,
    ) -> NeoResult<SearchResults> {
        let weight = query.hybrid_weight.unwrap_or(0.0);
        let by_id: HashMap<Uuid, &Resource> = filtered.iter().map(|r| (r.id, *r)).collect();

        let leg_budget = std::time::Duration::from_millis(self.settings.search.leg_timeout_ms);
        let lexical_leg = async {
            lexical::LexicalIndex::build(filtered.iter().copied())
                .ok()
                .and_then(|idx| idx.search(&query.text, 1000).ok())
                .unwrap_or_else(|| lexical::fallback_scan(filtered.iter().copied(), &query.text))
        };
        let dense_leg = async {
            match tokio::time::timeout(leg_budget, self.ai_core.embed(&query.text)).await {
                Ok(Ok(vec)) => dense::search(filtered.iter().copied(), &vec),
                Ok(Err(_)) => Vec::new(),
                Err(_) => {
                    tracing::warn!("dense retrieval leg exceeded budget, proceeding without it");
                    Vec::new()
                }
            }
        };
        let (lexical_hits, dense_hits) = tokio::join!(lexical_leg, dense_leg);

        let lexical_scores: Vec<f64> = lexical_hits.iter().map(|(_, s)| *s as f64).collect();
        let dense_scores: Vec<f64> = dense_hits.iter().map(|(_, s)| *s).collect();
        let norm_lexical = scoring::normalize_scores(&lexical_scores);
        let norm_dense = scoring::normalize_scores(&dense_scores);

        let mut lexical_map: HashMap<Uuid, f64> = HashMap::new();
        for ((id, _), score) in lexical_hits.iter().zip(norm_lexical.iter()) {
            lexical_map.insert(*id, *score);
        }
        let mut dense_map: HashMap<Uuid, f64> = HashMap::new();
        for ((id, _), score) in dense_hits.iter().zip(norm_dense.iter()) {
            dense_map.insert(*id, *score);
        }

        let all_ids: std::collections::HashSet<Uuid> =
            lexical_map.keys().chain(dense_map.keys()).copied().collect();

        let mut fused: Vec<(Uuid, f64)> = all_ids
            .into_iter()
            .map(|id| {
                let l = *lexical_map.get(&id).unwrap_or(&0.0);
                let d = *dense_map.get(&id).unwrap_or(&0.0);
                (id, (1.0 - weight) * l + weight * d)
            })
            .collect();
        fused.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ra = by_id.get(&a.0);
                    let rb = by_id.get(&b.0);
                    match (ra, rb) {
                        (Some(ra), Some(rb)) => lexical_tie_break_order(ra, rb, &query.filters),
                        _ => std::cmp::Ordering::Equal,
                    }
                })
        });

        let total = fused.len();
        let contributions = MethodContributions {
            fts5: lexical_hits.len(),
            dense: dense_hits.len(),
            sparse: 0,
        };

        let page_ids: Vec<Uuid> = fused
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|(id, _)| id)
            .collect();

        let items = self.assemble_page(&page_ids, &by_id);
        let snippets = self.compute_snippets(&items, &query.text);
        let facets = compute_facets(&filtered);

        Ok(SearchResults {
            total,
            items,
            facets,
            snippets,
            latency_ms: elapsed_ms(start),
            method_contributions: contributions,
            weights_used: [1.0 - weight, weight, 0.0],
        })
    }

    async fn search_three_way(
        &self,
        query: &Query,
        filtered: Vec<&Resource>,
        start: Instant,
    ) -> NeoResult<SearchResults> {
        let by_id: HashMap<Uuid, &Resource> = filtered.iter().map(|r| (r.id, *r)).collect();

        let leg_budget = std::time::Duration::from_millis(self.settings.search.leg_timeout_ms);
        let lexical_leg = async {
            lexical::LexicalIndex::build(filtered.iter().copied())
                .ok()
                .and_then(|idx| idx.search(&query.text, 1000).ok())
                .unwrap_or_else(|| lexical::fallback_scan(filtered.iter().copied(), &query.text))
        };
        let dense_leg = async {
            match tokio::time::timeout(leg_budget, self.ai_core.embed(&query.text)).await {
                Ok(Ok(vec)) => dense::search(filtered.iter().copied(), &vec),
                Ok(Err(_)) => Vec::new(),
                Err(_) => {
                    tracing::warn!("dense retrieval leg exceeded budget, proceeding without it");
                    Vec::new()
                }
            }
        };
        let sparse_leg = async {
            match tokio::time::timeout(leg_budget, self.ai_core.sparse_embed(&query.text)).await {
                Ok(Ok(sv)) => sparse::search(filtered.iter().copied(), Some(&sv)),
                Ok(Err(_)) => Vec::new(),
                Err(_) => {
                    tracing::warn!("sparse retrieval leg exceeded budget, proceeding without it");
                    Vec::new()
                }
            }
        };
        let (lexical_hits, dense_hits, sparse_hits) = tokio::join!(lexical_leg, dense_leg, sparse_leg);

        let lexical_ids: Vec<Uuid> = lexical_hits.iter().map(|(id, _)| *id).collect();
        let dense_ids: Vec<Uuid> = dense_hits.iter().map(|(id, _)| *id).collect();
        let sparse_ids: Vec<Uuid> = sparse_hits.iter().map(|(id, _)| *id).collect();

        let weights = if query.adaptive_weighting {
            adaptive::adaptive_weights(&query.text)
        } else {
            [1.0 / 3.0; 3]
        };

        let mut fused = fusion::fuse(
            &[lexical_ids.clone(), dense_ids.clone(), sparse_ids.clone()],
            Some(&weights),
            self.settings.rrf.k,
        );
        fused.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ra = by_id.get(&a.0);
                    let rb = by_id.get(&b.0);
                    match (ra, rb) {
                        (Some(ra), Some(rb)) => lexical_tie_break_order(ra, rb, &query.filters),
                        _ => std::cmp::Ordering::Equal,
                    }
                })
        });

        if query.enable_reranking {
            if let Some(model) = self.reranker {
                fused = self.apply_reranking(model, query, fused, &by_id).await;
            }
        }

        let total = fused.len();
        let contributions = MethodContributions {
            fts5: lexical_hits.len(),
            dense: dense_hits.len(),
            sparse: sparse_hits.len(),
        };

        let page_ids: Vec<Uuid> = fused
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|(id, _)| id)
            .collect();

        let items = self.assemble_page(&page_ids, &by_id);
        let snippets = self.compute_snippets(&items, &query.text);
        let facets = compute_facets(&filtered);

        Ok(SearchResults {
            total,
            items,
            facets,
            snippets,
            latency_ms: elapsed_ms(start),
            method_contributions: contributions,
            weights_used: weights,
        })
    }

    /// Reranks the top of the fused list with a cross-encoder, keeping
    /// the fused order for anything outside the rerank pool or when the
    /// model degrades to an empty result (spec §4.3).
    async fn apply_reranking(
        &self,
        model: &dyn CrossEncoder,
        query: &Query,
        fused: Vec<(Uuid, f64)>,
        by_id: &HashMap<Uuid, &Resource>,
    ) -> Vec<(Uuid, f64)> {
        let top_k = rerank::resolve_top_k(query.limit, &self.settings.rerank);
        let pool: Vec<(Uuid, f64)> = fused
            .iter()
            .take(self.settings.rerank.top_k_cap)
            .cloned()
            .collect();

        let pairs = rerank::build_pairs(
            pool.iter().filter_map(|(id, _)| {
                by_id
                    .get(id)
                    .map(|r| (*id, r.title.as_str(), r.description.as_str()))
            }),
            self.settings.rerank.max_doc_chars,
        );

        let timeout = std::time::Duration::from_millis(self.settings.rerank.timeout_ms);
        let reranked = rerank::rerank(model, &query.text, pairs, top_k, Some(timeout)).await;
        if reranked.is_empty() {
            return fused;
        }

        let reranked_ids: std::collections::HashSet<Uuid> =
            reranked.iter().map(|(id, _)| *id).collect();
        let mut new_order: Vec<(Uuid, f64)> = reranked
            .into_iter()
            .map(|(id, score)| (id, score as f64))
            .collect();
        for (id, score) in fused {
            if !reranked_ids.contains(&id) {
                new_order.push((id, score));
            }
        }
        new_order
    }

    /// Loads full records for `page_ids`, preserving the fused order
    /// (spec §4.1 "Result assembly").
    fn assemble_page(&self, page_ids: &[Uuid], by_id: &HashMap<Uuid, &Resource>) -> Vec<Resource> {
        page_ids
            .iter()
            .filter_map(|id| by_id.get(id).map(|r| (*r).clone()))
            .collect()
    }

    fn compute_snippets(&self, items: &[Resource], query_text: &str) -> HashMap<Uuid, String> {
        items
            .iter()
            .map(|r| {
                let source = if r.description.is_empty() {
                    &r.title
                } else {
                    &r.description
                };
                (r.id, snippets::generate_snippet(source, query_text))
            })
            .collect()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
