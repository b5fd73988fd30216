//! Search result highlighting
//!
//! The title of each hit is re-tokenized with the analyzer selected for the
//! title itself, which yields the tokens the index holds for it. Tokens are
//! matched against the terms of the mode that
//! actually ran (exact tokens, edit distance, or glob), so marked spans are
//! the ones that made the document match.

use crate::search::analyzer::{analyze, select_analyzer, AnalyzedToken};
use crate::search::config::HighlightConfig;
use crate::search::query::{glob_to_regex, CompiledQuery, QueryMode};
use regex::Regex;
use std::collections::HashSet;
use tracing::{trace, warn};

/// Decides whether an analyzed token matches one of the query's terms
#[derive(Debug, Clone)]
pub enum TermMatcher {
    Exact(HashSet<String>),
    Fuzzy { terms: Vec<String>, max_edits: u8 },
    Wildcard(Vec<Regex>),
}

impl TermMatcher {
    /// Matcher for the terms of a compiled query
    pub fn for_query(query: &CompiledQuery) -> Self {
        match query.mode() {
            QueryMode::Standard => TermMatcher::Exact(query.terms().iter().cloned().collect()),
            QueryMode::Fuzzy { max_edits } => TermMatcher::Fuzzy {
                terms: query.terms().to_vec(),
                max_edits,
            },
            QueryMode::Wildcard => TermMatcher::Wildcard(
                query
                    .terms()
                    .iter()
                    .filter_map(|pattern| {
                        Regex::new(&format!("^{}$", glob_to_regex(pattern)))
                            .map_err(|e| warn!(pattern = %pattern, error = %e, "Skipping highlight pattern"))
                            .ok()
                    })
                    .collect(),
            ),
        }
    }

    /// Key of the query term `token` matches, if any
    pub fn matching_term(&self, token: &str) -> Option<String> {
        match self {
            TermMatcher::Exact(terms) => terms.contains(token).then(|| token.to_string()),
            TermMatcher::Fuzzy { terms, max_edits } => terms
                .iter()
                .find(|term| edit_distance(term, token) <= *max_edits as usize)
                .cloned(),
            TermMatcher::Wildcard(patterns) => patterns
                .iter()
                .find(|pattern| pattern.is_match(token))
                .map(|pattern| pattern.as_str().to_string()),
        }
    }
}

/// Optimal string alignment distance: insertions, deletions, substitutions
/// and adjacent transpositions each cost one
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());

    let mut matrix = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        matrix[0][j] = j;
    }

    for i in 1..=n {
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(matrix[i - 2][j - 2] + 1);
            }
            matrix[i][j] = best;
        }
    }

    matrix[n][m]
}

/// Produces the best highlighted fragment of a field
#[derive(Debug, Clone)]
pub struct Highlighter {
    pre_tag: String,
    post_tag: String,
    fragment_chars: usize,
}

struct Fragment {
    start: usize,
    end: usize,
    matches: Vec<(usize, usize, String)>,
}

impl Fragment {
    fn score(&self) -> (usize, usize) {
        let distinct: HashSet<&str> = self.matches.iter().map(|(_, _, key)| key.as_str()).collect();
        (distinct.len(), self.matches.len())
    }
}

impl Highlighter {
    pub fn new(config: &HighlightConfig) -> Self {
        Self {
            pre_tag: config.pre_tag.clone(),
            post_tag: config.post_tag.clone(),
            fragment_chars: config.fragment_chars.max(1),
        }
    }

    /// Best-scoring fragment of `text` with matched tokens wrapped in tags,
    /// or `None` when nothing matches
    pub fn best_fragment(&self, text: &str, query_text: &str, matcher: &TermMatcher) -> Option<String> {
        let mut analyzer = select_analyzer(text);
        let mut tokens = analyze(&mut analyzer, text);
        // Search-mode segmentation emits a compound after its parts
        tokens.sort_by_key(|token| (token.offset_from, token.offset_to));
        trace!(query = %query_text, tokens = tokens.len(), "Highlighting field");

        let fragment = self
            .fragments(text, &tokens, matcher)
            .into_iter()
            .filter(|fragment| !fragment.matches.is_empty())
            // max_by_key keeps the last maximum; reverse so the earliest wins ties
            .rev()
            .max_by_key(Fragment::score)?;

        Some(self.render(text, &fragment))
    }

    /// Highlighted fragment, falling back to the untouched text
    pub fn highlight_or_original(&self, text: &str, query_text: &str, matcher: &TermMatcher) -> String {
        self.best_fragment(text, query_text, matcher)
            .unwrap_or_else(|| text.to_string())
    }

    fn fragments(&self, text: &str, tokens: &[AnalyzedToken], matcher: &TermMatcher) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        let mut current = Fragment {
            start: 0,
            end: text.len(),
            matches: Vec::new(),
        };
        // Furthest byte covered by a token of the current fragment
        let mut reach = 0;

        for token in tokens {
            let span_chars = text[current.start..token.offset_to.max(current.start)]
                .chars()
                .count();
            // Never split inside a token that overlaps one already taken
            if span_chars > self.fragment_chars
                && token.offset_from > current.start
                && token.offset_from >= reach
            {
                let boundary = token.offset_from;
                current.end = boundary;
                fragments.push(std::mem::replace(
                    &mut current,
                    Fragment {
                        start: boundary,
                        end: text.len(),
                        matches: Vec::new(),
                    },
                ));
            }
            reach = reach.max(token.offset_to);
            if let Some(key) = matcher.matching_term(&token.text) {
                current.matches.push((token.offset_from, token.offset_to, key));
            }
        }
        fragments.push(current);
        fragments
    }

    fn render(&self, text: &str, fragment: &Fragment) -> String {
        let mut spans: Vec<(usize, usize)> = fragment
            .matches
            .iter()
            .map(|(from, to, _)| ((*from).max(fragment.start), (*to).min(fragment.end)))
            .filter(|(from, to)| from < to)
            .collect();
        spans.sort_unstable();

        // Search-mode segmentation emits overlapping tokens
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
        for (from, to) in spans {
            match merged.last_mut() {
                Some(last) if from <= last.1 => last.1 = last.1.max(to),
                _ => merged.push((from, to)),
            }
        }

        let mut out = String::with_capacity(fragment.end - fragment.start + merged.len() * 32);
        let mut cursor = fragment.start;
        for (from, to) in merged {
            out.push_str(&text[cursor..from]);
            out.push_str(&self.pre_tag);
            out.push_str(&text[from..to]);
            out.push_str(&self.post_tag);
            cursor = to;
        }
        out.push_str(&text[cursor..fragment.end]);
        out
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(&HighlightConfig::default())
    }
}
