//! Query-adaptive RRF weighting (spec §4.2). Grounded in
//! `original_source/backend/app/services/reciprocal_rank_fusion_service.py::adaptive_weights`.

const QUESTION_WORDS: [&str; 6] = ["who", "what", "when", "where", "why", "how"];

const CODE_KEYWORDS: [&str; 9] = [
    "def", "class", "function", "var", "let", "const", "import", "from", "return",
];

const MATH_TERMS: [&str; 5] = ["sum", "integral", "derivative", "equation", "formula"];
const MATH_SYMBOLS: [char; 5] = ['\u{222B}', '\u{2211}', '\u{220F}', '\u{221A}', '\u{2202}'];

fn is_code_like(query: &str) -> bool {
    let lower = query.to_lowercase();
    let has_keyword = CODE_KEYWORDS.iter().any(|kw| contains_word(&lower, kw));
    let has_bracket = query.chars().any(|c| matches!(c, '(' | ')' | '{' | '}' | '[' | ']'));
    let has_operator = query.chars().any(|c| matches!(c, '=' | '<' | '>' | '!'));
    let has_method_call = lower.split_whitespace().any(|tok| {
        let trimmed = tok.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '(' && c != ')');
        (trimmed.contains('.') && trimmed.chars().any(|c| c.is_alphabetic()))
            || (trimmed.ends_with("()") && trimmed.len() > 2)
    });
    has_keyword || has_bracket || has_operator || has_method_call
}

fn is_math_like(query: &str) -> bool {
    let lower = query.to_lowercase();
    let has_operator = query.chars().any(|c| matches!(c, '+' | '-' | '*' | '/' | '^' | '='));
    let has_term = MATH_TERMS.iter().any(|t| contains_word(&lower, t));
    let has_symbol = query.chars().any(|c| MATH_SYMBOLS.contains(&c));
    has_operator || has_term || has_symbol
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|tok| tok == word)
}

/// Computes `[w_lex, w_dense, w_sparse]` for `query`, normalized to sum
/// to 1. Empty query returns equal weights (testable property 2, spec §8).
pub fn adaptive_weights(query: &str) -> [f64; 3] {
    let query = query.trim();
    if query.is_empty() {
        return [1.0 / 3.0; 3];
    }

    let mut w_lex = 1.0f64;
    let mut w_dense = 1.0f64;
    let mut w_sparse = 1.0f64;

    let word_count = query.split_whitespace().count();
    if word_count <= 3 {
        w_lex *= 1.5;
        w_dense *= 0.8;
    } else if word_count > 10 {
        w_dense *= 1.5;
        w_lex *= 0.8;
    }

    let lower = query.to_lowercase();
    if QUESTION_WORDS.iter().any(|qw| lower.starts_with(qw)) {
        w_dense *= 1.3;
    }

    if is_code_like(query) || is_math_like(query) {
        w_sparse *= 1.5;
        w_dense *= 0.9;
    }

    let sum = w_lex + w_dense + w_sparse;
    if sum <= 0.0 {
        return [1.0 / 3.0; 3];
    }
    [w_lex / sum, w_dense / sum, w_sparse / sum]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sums_to_one(w: [f64; 3]) -> bool {
        (w.iter().sum::<f64>() - 1.0).abs() < 1e-9 && w.iter().all(|x| *x >= 0.0)
    }

    #[test]
    fn empty_query_is_equal_weights() {
        assert_eq!(adaptive_weights(""), [1.0 / 3.0; 3]);
        assert_eq!(adaptive_weights("   "), [1.0 / 3.0; 3]);
    }

    // Scenario B (spec §8): short query boosts lexical.
    #[test]
    fn scenario_b_short_query_boosts_lexical() {
        let w = adaptive_weights("ML AI");
        assert!(sums_to_one(w));
        assert!(w[0] > w[1]);
        assert!(w[0] > w[2]);
    }

    // Scenario C (spec §8): code query boosts sparse.
    #[test]
    fn scenario_c_code_query_boosts_sparse() {
        let w = adaptive_weights("def fibonacci(n): return n");
        assert!(sums_to_one(w));
        assert!(w[2] >= w[0]);
        assert!(w[2] >= w[1]);
    }

    #[test]
    fn from_import_statement_boosts_sparse() {
        let w = adaptive_weights("from collections import Counter");
        assert!(sums_to_one(w));
        assert!(w[2] >= w[0]);
        assert!(w[2] >= w[1]);
    }

    #[test]
    fn long_query_boosts_dense() {
        let w = adaptive_weights(
            "how does gradient descent converge for nonconvex loss landscapes in practice today",
        );
        assert!(sums_to_one(w));
        assert!(w[1] > w[0]);
    }

    #[test]
    fn question_query_boosts_dense() {
        let w = adaptive_weights("why is the sky blue");
        assert!(sums_to_one(w));
        assert!(w[1] > 1.0 / 3.0);
    }

    #[test]
    fn every_query_normalizes_to_one() {
        for q in [
            "a",
            "machine learning",
            "def foo(): pass",
            "x + y = z",
            "what is the meaning of life, the universe, and everything else",
        ] {
            assert!(sums_to_one(adaptive_weights(q)), "query: {q}");
        }
    }
}
