//! Rule-based UDC-style top-level classification (spec §4.6 "Personal
//! classification"). Grounded in
//! `original_source/backend/app/modules/authority/service.py::PersonalClassification`.

use regex::Regex;
use std::sync::OnceLock;

const PROGRAMMING_KEYWORDS: &[&str] = &[
    "programming",
    "software",
    "coding",
    "developer",
    "python",
    "java",
    "javascript",
    "typescript",
    "c++",
    "c#",
    "go",
    "rust",
    "algorithm",
    "data structure",
    "artificial intelligence",
    "ai",
    "machine learning",
    "ml",
    "natural language processing",
    "nlp",
    "deep learning",
    "neural networks",
];

const LANGUAGE_KEYWORDS: &[&str] = &[
    "language",
    "linguistics",
    "grammar",
    "vocabulary",
    "pronunciation",
    "syntax",
    "semantics",
    "phonetics",
    "morphology",
];

const SCIENCE_KEYWORDS: &[&str] = &[
    "science",
    "physics",
    "chemistry",
    "biology",
    "mathematics",
    "math",
    "algebra",
    "calculus",
    "astronomy",
    "geology",
    "ecology",
    "zoology",
    "botany",
];

const HISTORY_KEYWORDS: &[&str] = &[
    "history",
    "ancient",
    "medieval",
    "renaissance",
    "empire",
    "revolution",
    "napoleon",
    "rome",
    "greece",
    "wwi",
    "wwii",
    "cold war",
];

/// Top-level classification code (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopLevelCode {
    Programming,
    Language,
    Science,
    History,
}

impl TopLevelCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopLevelCode::Programming => "000",
            TopLevelCode::Language => "400",
            TopLevelCode::Science => "500",
            TopLevelCode::History => "900",
        }
    }
}

fn history_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(1[0-9]{3}|20[01][0-9])\b").unwrap())
}

fn contains_keyword(text: &str, keyword: &str) -> bool {
    if text.is_empty() || keyword.is_empty() {
        return false;
    }
    if keyword.contains(' ') {
        return text.contains(keyword);
    }
    let pattern = format!(r"\b{}\b", regex::escape(keyword));
    Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false)
}

fn contains_history_year(text: &str) -> bool {
    !text.is_empty() && history_year_regex().is_match(text)
}

fn score_for_keywords(scores: &mut [i32; 4], text: &str, keywords: &[&str], index: usize, weight: i32) {
    if text.is_empty() {
        return;
    }
    for kw in keywords {
        if contains_keyword(text, kw) {
            scores[index] += weight;
        }
    }
}

const CODES: [TopLevelCode; 4] = [
    TopLevelCode::Programming,
    TopLevelCode::Language,
    TopLevelCode::Science,
    TopLevelCode::History,
];

/// Scores all four top-level codes against `title`/`description`/`tags`.
/// index: 0=programming, 1=language, 2=science, 3=history.
fn score_all(title: &str, description: &str, tags: &[String]) -> [i32; 4] {
    let title_lower = title.to_lowercase();
    let description_lower = description.to_lowercase();
    let tags_lower = tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let mut scores = [0i32; 4];
    let keyword_sets = [
        PROGRAMMING_KEYWORDS,
        LANGUAGE_KEYWORDS,
        SCIENCE_KEYWORDS,
        HISTORY_KEYWORDS,
    ];

    for (idx, keywords) in keyword_sets.iter().enumerate() {
        score_for_keywords(&mut scores, &title_lower, keywords, idx, 3);
        score_for_keywords(&mut scores, &tags_lower, keywords, idx, 2);
        score_for_keywords(&mut scores, &description_lower, keywords, idx, 1);
    }

    if contains_history_year(&title_lower) {
        scores[3] += 3;
    }
    if contains_history_year(&tags_lower) {
        scores[3] += 2;
    }
    if contains_history_year(&description_lower) {
        scores[3] += 1;
    }

    scores
}

/// `auto_classify(title, description, tags) -> top-level code`.
/// Precedence on ties: `000 > 400 > 500 > 900`. All-zero scores fall
/// back to `000`.
pub fn auto_classify(title: &str, description: &str, tags: &[String]) -> TopLevelCode {
    let scores = score_all(title, description, tags);

    let (best_idx, best_score) = scores
        .iter()
        .enumerate()
        .max_by_key(|(idx, score)| (**score, std::cmp::Reverse(*idx)))
        .map(|(idx, score)| (idx, *score))
        .unwrap();

    if best_score == 0 {
        TopLevelCode::Programming
    } else {
        CODES[best_idx]
    }
}

/// Ranks all four top-level codes by rule score and returns up to 5 with
/// a positive score, ordered by score descending and `000 > 400 > 500 >
/// 900` on ties — a candidate list for a curation UI's reclassification
/// handoff, not a single changed-or-not verdict.
pub fn suggest_reclassification(title: &str, description: &str, tags: &[String]) -> Vec<TopLevelCode> {
    let scores = score_all(title, description, tags);

    let mut ranked: Vec<(usize, i32)> = (0..4).map(|idx| (idx, scores[idx])).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .filter(|(_, score)| *score > 0)
        .take(5)
        .map(|(idx, _)| CODES[idx])
        .collect()
}
