//! BM25 lexical retrieval over `(title, description, subject, creator,
//! classification_code)` (spec §4.1 "Lexical retrieval"), backed by
//! `tantivy`. Falls back to a case-insensitive contains scan when no
//! index is available.

use std::collections::BTreeMap;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Schema, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexWriter, TantivyDocument, Term};
use uuid::Uuid;

use crate::error::{NeoError, NeoResult};
use crate::types::Resource;

/// Normalizes a raw query string into a boolean expression tantivy can
/// parse: bare tokens AND-combined (tantivy's default), quoted strings
/// kept as phrases, `AND`/`OR`/`NOT` upper-cased regardless of input
/// case, `field:term` and `prefix*` left untouched, and characters
/// meaningless to the index stripped while preserving tokens like
/// `C++` verbatim.
pub fn normalize_query(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if c == '"' {
            in_quotes = !in_quotes;
            out.push(c);
            continue;
        }
        if in_quotes {
            out.push(c);
            continue;
        }
        if c.is_alphanumeric() || matches!(c, '+' | '_' | ':' | '*' | '.' | '-') {
            out.push(c);
        } else if c.is_whitespace() {
            out.push(' ');
        }
        // other punctuation is meaningless to the index and dropped.
    }

    out.split_whitespace()
        .map(|tok| match tok {
            t if t.eq_ignore_ascii_case("and") => "AND".to_string(),
            t if t.eq_ignore_ascii_case("or") => "OR".to_string(),
            t if t.eq_ignore_ascii_case("not") => "NOT".to_string(),
            t => t.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

struct Fields {
    id: tantivy::schema::Field,
    title: tantivy::schema::Field,
    description: tantivy::schema::Field,
    subject: tantivy::schema::Field,
    creator: tantivy::schema::Field,
    classification_code: tantivy::schema::Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let id = builder.add_text_field("id", STRING | STORED);
    let title = builder.add_text_field("title", TEXT | STORED);
    let description = builder.add_text_field("description", TEXT | STORED);
    let subject = builder.add_text_field("subject", TEXT | STORED);
    let creator = builder.add_text_field("creator", TEXT | STORED);
    let classification_code = builder.add_text_field("classification_code", TEXT | STORED);
    (
        builder.build(),
        Fields {
            id,
            title,
            description,
            subject,
            creator,
            classification_code,
        },
    )
}

/// An in-memory BM25 index over a set of resources, rebuilt per search
/// call. Small corpora make this an acceptable cost; a persistent index
/// is a storage-layer concern outside this crate's scope.
pub struct LexicalIndex {
    index: Index,
    fields: Fields,
}

impl LexicalIndex {
    pub fn build<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> NeoResult<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);

        let mut writer: IndexWriter = index
            .writer(15_000_000)
            .map_err(|e| NeoError::Internal(format!("failed to open index writer: {e}")))?;

        for resource in resources {
            let subject_joined = resource.subject.join(" ");
            writer
                .add_document(doc!(
                    fields.id => resource.id.to_string(),
                    fields.title => resource.title.clone(),
                    fields.description => resource.description.clone(),
                    fields.subject => subject_joined,
                    fields.creator => resource.creator.clone().unwrap_or_default(),
                    fields.classification_code => resource.classification_code.clone().unwrap_or_default(),
                ))
                .map_err(|e| NeoError::Internal(format!("failed to index resource: {e}")))?;
        }
        writer
            .commit()
            .map_err(|e| NeoError::Internal(format!("failed to commit lexical index: {e}")))?;

        Ok(LexicalIndex { index, fields })
    }

    /// Runs `query_text` and returns `(resource_id, bm25_score)` pairs
    /// sorted by score descending, up to `limit`.
    pub fn search(&self, query_text: &str, limit: usize) -> NeoResult<Vec<(Uuid, f32)>> {
        let normalized = normalize_query(query_text);
        if normalized.trim().is_empty() {
            return Ok(Vec::new());
        }

        let reader = self
            .index
            .reader()
            .map_err(|e| NeoError::Internal(format!("failed to open index reader: {e}")))?;
        let searcher = reader.searcher();

        let parser = QueryParser::for_index(
            &self.index,
            vec![
                self.fields.title,
                self.fields.description,
                self.fields.subject,
                self.fields.creator,
                self.fields.classification_code,
            ],
        );
        let query = parser
            .parse_query(&normalized)
            .map_err(|e| NeoError::InvalidArgument(format!("invalid search query: {e}")))?;

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit.max(1)))
            .map_err(|e| NeoError::Internal(format!("lexical search failed: {e}")))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let retrieved: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| NeoError::Internal(format!("failed to fetch document: {e}")))?;
            if let Some(id_value) = retrieved.get_first(self.fields.id) {
                if let Some(id_str) = id_value.as_str() {
                    if let Ok(id) = Uuid::parse_str(id_str) {
                        results.push((id, score));
                    }
                }
            }
        }
        Ok(results)
    }
}

/// Case-insensitive contains scan over the same fields, used when a
/// full-text index is unavailable. Produces the same `(id, score)`
/// tuple shape; score is the count of distinct fields matched (ties
/// resolved by caller-side stable ordering).
pub fn fallback_scan<'a>(
    resources: impl IntoIterator<Item = &'a Resource>,
    query_text: &str,
) -> Vec<(Uuid, f32)> {
    let needle = query_text.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut scored: BTreeMap<Uuid, f32> = BTreeMap::new();
    for resource in resources {
        let haystacks = [
            resource.title.to_lowercase(),
            resource.description.to_lowercase(),
            resource.subject.join(" ").to_lowercase(),
            resource.creator.clone().unwrap_or_default().to_lowercase(),
            resource
                .classification_code
                .clone()
                .unwrap_or_default()
                .to_lowercase(),
        ];
        let hits = haystacks.iter().filter(|h| h.contains(&needle)).count();
        if hits > 0 {
            scored.insert(resource.id, hits as f32);
        }
    }

    let mut results: Vec<(Uuid, f32)> = scored.into_iter().collect();
    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results
}
