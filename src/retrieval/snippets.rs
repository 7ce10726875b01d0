//! Snippet generation: a bounded window around the first matched token
//! with `<mark>` highlighting (spec §4.1 "Lexical retrieval").

const WINDOW: usize = 200;

/// Returns a `<=200`-char window of `text` centered on the first
/// occurrence of any token in `query`, with matches wrapped in
/// `<mark>...</mark>`. Matching is case-insensitive. Returns an empty
/// string if `text` or `query` is empty, or if no token matches.
pub fn generate_snippet(text: &str, query: &str) -> String {
    if text.is_empty() || query.is_empty() {
        return String::new();
    }

    let lower_text = text.to_lowercase();
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return String::new();
    }

    let first_match = tokens
        .iter()
        .filter_map(|tok| lower_text.find(tok).map(|pos| (pos, tok.len())))
        .min_by_key(|(pos, _)| *pos);

    let Some((match_start, match_len)) = first_match else {
        return String::new();
    };

    let half = WINDOW / 2;
    let window_start = match_start.saturating_sub(half);
    let window_end = (match_start + match_len + half).min(text.len());
    let window_start = floor_char_boundary(text, window_start);
    let window_end = ceil_char_boundary(text, window_end);

    let window = &text[window_start..window_end];
    let window = if window.len() > WINDOW {
        let cut = floor_char_boundary(window, WINDOW);
        &window[..cut]
    } else {
        window
    };

    highlight(window, &tokens)
}

fn highlight(window: &str, tokens: &[String]) -> String {
    let lower_window = window.to_lowercase();
    let mut matches: Vec<(usize, usize)> = Vec::new();
    for tok in tokens {
        if tok.is_empty() {
            continue;
        }
        let mut start = 0;
        while let Some(found) = lower_window[start..].find(tok.as_str()) {
            let pos = start + found;
            matches.push((pos, pos + tok.len()));
            start = pos + tok.len().max(1);
        }
    }
    matches.sort_by_key(|(s, _)| *s);

    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (s, e) in matches {
        if let Some(last) = merged.last_mut() {
            if s <= last.1 {
                last.1 = last.1.max(e);
                continue;
            }
        }
        merged.push((s, e));
    }

    let mut out = String::new();
    let mut cursor = 0;
    for (s, e) in merged {
        if s < cursor {
            continue;
        }
        out.push_str(&window[cursor..s]);
        out.push_str("<mark>");
        out.push_str(&window[s..e]);
        out.push_str("</mark>");
        cursor = e;
    }
    out.push_str(&window[cursor..]);
    out
}

fn floor_char_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
