//! Subject/creator/publisher normalization (spec §4.6 "Authority
//! normalization"). Grounded in
//! `original_source/backend/app/modules/authority/service.py::AuthorityControl`.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::AuthorityEntry;

/// Built-in subject synonym table (spec §4.6), immutable after startup
/// (spec §5).
fn synonyms() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: std::sync::OnceLock<HashMap<&'static str, &'static str>> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("ml", "Machine Learning"),
            ("ai", "Artificial Intelligence"),
            ("nlp", "Natural Language Processing"),
            ("py", "Python"),
            ("js", "JavaScript"),
            ("javascript", "JavaScript"),
            ("db", "Database"),
            ("database", "Database"),
        ])
    })
}

const SMALL_WORDS: [&str; 9] = ["of", "and", "in", "on", "for", "to", "the", "a", "an"];

fn collapse_punct_and_whitespace(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if matches!(c, ',' | ';' | '|') { ' ' } else { c })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn title_case_subject(s: &str) -> String {
    let words: Vec<&str> = s.split(' ').filter(|w| !w.is_empty()).collect();
    if words.is_empty() {
        return String::new();
    }
    let last = words.len() - 1;
    words
        .iter()
        .enumerate()
        .map(|(idx, w)| {
            let lower = w.to_lowercase();
            if SMALL_WORDS.contains(&lower.as_str()) && idx > 0 && idx < last {
                lower
            } else {
                capitalize_first(w)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Flips `"Last, First"` to `"First Last"`, then smart-title-cases each
/// token, preserving all-caps acronyms of 4 letters or fewer.
fn normalize_person_or_org(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let flipped = if let Some((last, first)) = collapsed.split_once(',') {
        let last = last.trim();
        let first = first.trim();
        if !last.is_empty() && !first.is_empty() && collapsed.matches(',').count() == 1 {
            format!("{first} {last}")
        } else {
            collapsed.clone()
        }
    } else {
        collapsed.clone()
    };

    flipped
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(smart_title_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn smart_title_token(token: &str) -> String {
    let alphas: String = token.chars().filter(|c| c.is_alphabetic()).collect();
    if !alphas.is_empty() && alphas.len() <= 4 && alphas.chars().all(|c| c.is_uppercase()) {
        return token.to_uppercase();
    }

    let mut out = String::with_capacity(token.len());
    let mut start_of_word = true;
    for ch in token.chars() {
        if ch.is_alphabetic() {
            if start_of_word {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            start_of_word = false;
        } else {
            out.push(ch);
            start_of_word = true;
        }
    }
    out
}

/// Authority rows for subjects, creators, and publishers. A minimal
/// in-process substitute for the real storage layer (spec §1/§9) —
/// not a reimplementation of it. `RwLock<HashMap<...>>` stands in for
/// a DB-backed authority table.
#[derive(Default)]
pub struct AuthorityStore {
    subjects: RwLock<HashMap<String, AuthorityEntry>>,
    creators: RwLock<HashMap<String, AuthorityEntry>>,
    publishers: RwLock<HashMap<String, AuthorityEntry>>,
}

enum Kind {
    Creator,
    Publisher,
}

impl AuthorityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup_subject_canonical(&self, lower: &str) -> Option<String> {
        let subjects = self.subjects.read().unwrap();
        if let Some(entry) = subjects.get(lower) {
            return Some(entry.canonical_form.clone());
        }
        subjects
            .values()
            .find(|e| e.variants.iter().any(|v| v.to_lowercase() == lower))
            .map(|e| e.canonical_form.clone())
    }

    fn persist_subject(&self, canonical: &str, variant: Option<&str>) {
        let mut subjects = self.subjects.write().unwrap();
        let key = canonical.to_lowercase();
        let entry = subjects
            .entry(key)
            .or_insert_with(|| AuthorityEntry::new(canonical));
        if let Some(v) = variant {
            if !entry.variants.iter().any(|existing| existing.eq_ignore_ascii_case(v)) {
                entry.variants.push(v.to_string());
            }
        }
    }

    fn increment_subject_usage(&self, canonical: &str) {
        let mut subjects = self.subjects.write().unwrap();
        if let Some(entry) = subjects.get_mut(&canonical.to_lowercase()) {
            entry.usage_count += 1;
        }
    }

    fn store_for(&self, kind: &Kind) -> &RwLock<HashMap<String, AuthorityEntry>> {
        match kind {
            Kind::Creator => &self.creators,
            Kind::Publisher => &self.publishers,
        }
    }

    fn persist_person(&self, kind: Kind, canonical: &str, raw: &str) {
        let store = self.store_for(&kind);
        let mut rows = store.write().unwrap();
        let entry = rows
            .entry(canonical.to_lowercase())
            .or_insert_with(|| AuthorityEntry::new(canonical));
        if raw.trim() != canonical && !entry.variants.iter().any(|v| v.eq_ignore_ascii_case(raw.trim())) {
            entry.variants.push(raw.trim().to_string());
        }
        entry.usage_count += 1;
    }

    /// `NormalizeSubject(raw) -> canonical` (spec §4.6).
    pub fn normalize_subject(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        let collapsed = collapse_punct_and_whitespace(raw);
        let lower = collapsed.to_lowercase();

        if let Some(&canonical) = synonyms().get(lower.as_str()) {
            self.persist_subject(canonical, Some(raw));
            return canonical.to_string();
        }

        if let Some(canonical) = self.lookup_subject_canonical(&lower) {
            self.persist_subject(&canonical, Some(raw));
            return canonical;
        }

        let canonical = title_case_subject(&collapsed);
        let variant = (raw.trim() != canonical).then_some(raw);
        self.persist_subject(&canonical, variant);
        canonical
    }

    /// Normalizes each tag, deduplicates preserving first-seen order,
    /// and increments `usage_count` once per unique resource tag.
    pub fn normalize_subjects(&self, raw_tags: &[String]) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for tag in raw_tags {
            let normalized = self.normalize_subject(tag);
            if !normalized.is_empty() && seen.insert(normalized.clone()) {
                self.increment_subject_usage(&normalized);
                result.push(normalized);
            }
        }
        result
    }

    /// `NormalizeCreator(raw) -> canonical`.
    pub fn normalize_creator(&self, raw: &str) -> Option<String> {
        if raw.is_empty() {
            return None;
        }
        let canonical = normalize_person_or_org(raw);
        self.persist_person(Kind::Creator, &canonical, raw);
        Some(canonical)
    }

    /// `NormalizePublisher(raw) -> canonical`.
    pub fn normalize_publisher(&self, raw: &str) -> Option<String> {
        if raw.is_empty() {
            return None;
        }
        let canonical = normalize_person_or_org(raw);
        self.persist_person(Kind::Publisher, &canonical, raw);
        Some(canonical)
    }

    /// Up to 10 suggestions: built-in synonym targets matching `prefix`
    /// substring, union with authority rows whose canonical contains
    /// `prefix`, ordered by `usage_count` desc then canonical asc.
    pub fn suggest_subjects(&self, prefix: &str) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let needle = prefix.to_lowercase();
        let mut builtin: Vec<&str> = synonyms()
            .iter()
            .filter(|(k, v)| k.contains(&needle.as_str()) || v.to_lowercase().contains(&needle))
            .map(|(_, v)| *v)
            .collect();
        builtin.sort_unstable();
        builtin.dedup();

        let subjects = self.subjects.read().unwrap();
        let mut rows: Vec<&AuthorityEntry> = subjects
            .values()
            .filter(|e| e.canonical_form.to_lowercase().contains(&needle))
            .collect();
        rows.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then_with(|| a.canonical_form.cmp(&b.canonical_form))
        });

        let mut seen = std::collections::HashSet::new();
        let mut suggestions = Vec::new();
        for s in builtin.into_iter().map(str::to_string).chain(rows.into_iter().map(|e| e.canonical_form.clone())) {
            if seen.insert(s.clone()) {
                suggestions.push(s);
            }
            if suggestions.len() == 10 {
                break;
            }
        }
        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonym_hits_return_canonical() {
        let store = AuthorityStore::new();
        assert_eq!(store.normalize_subject("ml"), "Machine Learning");
        assert_eq!(store.normalize_subject("AI"), "Artificial Intelligence");
    }

    #[test]
    fn unknown_subject_title_cases_with_small_word_exceptions() {
        let store = AuthorityStore::new();
        assert_eq!(store.normalize_subject("history of the world"), "History of the World");
    }

    #[test]
    fn repeated_variant_resolves_to_same_canonical() {
        let store = AuthorityStore::new();
        let first = store.normalize_subject("Graph Theory");
        let second = store.normalize_subject("GRAPH THEORY");
        assert_eq!(first, second);
    }

    #[test]
    fn normalize_subjects_dedupes_and_counts_usage_once() {
        let store = AuthorityStore::new();
        let result = store.normalize_subjects(&["ml".to_string(), "Machine Learning".to_string()]);
        assert_eq!(result, vec!["Machine Learning".to_string()]);
    }

    #[test]
    fn creator_flips_last_first_and_preserves_acronyms() {
        let store = AuthorityStore::new();
        let canonical = store.normalize_creator("Smith, John").unwrap();
        assert_eq!(canonical, "John Smith");

        let canonical2 = store.normalize_creator("IBM").unwrap();
        assert_eq!(canonical2, "IBM");
    }

    #[test]
    fn publisher_title_cases_multi_word_names() {
        let store = AuthorityStore::new();
        let canonical = store.normalize_publisher("oreilly media").unwrap();
        assert_eq!(canonical, "Oreilly Media");
    }

    #[test]
    fn suggest_subjects_orders_by_usage_then_canonical() {
        let store = AuthorityStore::new();
        store.normalize_subjects(&["rust".to_string()]);
        store.normalize_subjects(&["ruby".to_string(), "ruby".to_string()]);
        let suggestions = store.suggest_subjects("ru");
        assert!(suggestions.contains(&"Rust".to_string()));
        assert!(suggestions.contains(&"Ruby".to_string()));
        assert!(suggestions.len() <= 10);
    }

    #[test]
    fn empty_prefix_yields_no_suggestions() {
        let store = AuthorityStore::new();
        assert!(store.suggest_subjects("").is_empty());
    }
}
