//! Search query building
//!
//! Three mutually exclusive modes are supported:
//!
//! - **Standard**: the text goes through the query parser with the field
//!   analyzer; OR across terms and across fields.
//! - **Fuzzy**: whitespace-split terms, each a per-field fuzzy match bounded
//!   by an edit distance in `[0, 2]`.
//! - **Wildcard**: whitespace-split glob patterns; a bare term `t` becomes
//!   `*t*`.
//!
//! Fuzzy and wildcard share the same shape: a conjunction over terms where
//! each term is a disjunction over the target fields.

use crate::search::analyzer::{analyze_terms, multilingual_analyzer, register_analyzers};
use crate::search::document::{FIELD_SUMMARY, FIELD_TITLE, SEARCHABLE_FIELDS};
use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tantivy::query::{
    BooleanQuery, EmptyQuery, FuzzyTermQuery, Occur, Query, QueryClone, QueryParser, RegexQuery,
};
use tantivy::schema::{Field, Schema};
use tantivy::tokenizer::TokenizerManager;
use tantivy::Term;

/// Largest edit distance a fuzzy query accepts
pub const MAX_EDITS: u8 = 2;

/// Edit distance used when the caller does not pass one
pub const DEFAULT_MAX_EDITS: u8 = 2;

/// How the query text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueryMode {
    Standard,
    Fuzzy { max_edits: u8 },
    Wildcard,
}

impl Default for QueryMode {
    fn default() -> Self {
        Self::Standard
    }
}

impl QueryMode {
    /// Fuzzy mode with `max_edits` clamped to `[0, 2]`
    pub fn fuzzy(max_edits: i64) -> Self {
        Self::Fuzzy {
            max_edits: clamp_edits(max_edits),
        }
    }

    /// Resolve request flags; wildcard wins over fuzzy
    pub fn from_flags(fuzzy: bool, max_edits: Option<i64>, wildcard: bool) -> Self {
        if wildcard {
            Self::Wildcard
        } else if fuzzy {
            Self::fuzzy(max_edits.unwrap_or(DEFAULT_MAX_EDITS as i64))
        } else {
            Self::Standard
        }
    }

    /// Get the mode as a string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Fuzzy { .. } => "fuzzy",
            Self::Wildcard => "wildcard",
        }
    }
}

fn clamp_edits(requested: i64) -> u8 {
    requested.clamp(0, MAX_EDITS as i64) as u8
}

/// Lowercase a wildcard term and wrap it in `*` unless it already carries a
/// metacharacter
pub fn preprocess_wildcard(term: &str) -> String {
    let lowered = term.to_lowercase();
    if lowered.contains('*') || lowered.contains('?') {
        lowered
    } else {
        format!("*{}*", lowered)
    }
}

/// Translate a `*`/`?` glob into an anchored term regex
pub fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2);
    for ch in pattern.chars() {
        match ch {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    regex
}

/// A built predicate together with what it was built from
pub struct CompiledQuery {
    query: Box<dyn Query>,
    mode: QueryMode,
    text: String,
    terms: Vec<String>,
}

impl CompiledQuery {
    pub fn as_query(&self) -> &dyn Query {
        self.query.as_ref()
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Raw query text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Terms the predicate matches on: analyzed tokens in standard mode,
    /// lowercased terms in fuzzy mode, glob patterns in wildcard mode
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether the predicate can never match
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Clone for CompiledQuery {
    fn clone(&self) -> Self {
        Self {
            query: self.query.box_clone(),
            mode: self.mode,
            text: self.text.clone(),
            terms: self.terms.clone(),
        }
    }
}

impl fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("mode", &self.mode)
            .field("text", &self.text)
            .field("terms", &self.terms)
            .field("query", &self.query)
            .finish()
    }
}

/// Query builder for the article schema
#[derive(Clone)]
pub struct QueryBuilder {
    schema: Schema,
    tokenizers: TokenizerManager,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new(schema: Schema) -> Self {
        let tokenizers = TokenizerManager::default();
        register_analyzers(&tokenizers);
        Self { schema, tokenizers }
    }

    /// Build a query over `fields` (title and summary when empty)
    pub fn build(&self, text: &str, fields: &[String], mode: QueryMode) -> SearchResult<CompiledQuery> {
        let fields = self.resolve_fields(fields)?;

        if text.trim().is_empty() {
            return Ok(CompiledQuery {
                query: Box::new(EmptyQuery),
                mode,
                text: text.to_string(),
                terms: Vec::new(),
            });
        }

        let (query, terms) = match mode {
            QueryMode::Standard => self.standard(text, fields)?,
            QueryMode::Fuzzy { max_edits } => self.fuzzy(text, &fields, clamp_edits(max_edits as i64)),
            QueryMode::Wildcard => self.wildcard(text, &fields)?,
        };

        Ok(CompiledQuery {
            query,
            mode,
            text: text.to_string(),
            terms,
        })
    }

    fn resolve_fields(&self, names: &[String]) -> SearchResult<Vec<Field>> {
        let defaults = [FIELD_TITLE.to_string(), FIELD_SUMMARY.to_string()];
        let names = if names.is_empty() { &defaults[..] } else { names };

        names
            .iter()
            .map(|name| {
                if !SEARCHABLE_FIELDS.contains(&name.as_str()) {
                    return Err(SearchError::UnknownField(name.clone()));
                }
                self.schema
                    .get_field(name)
                    .map_err(|_| SearchError::UnknownField(name.clone()))
            })
            .collect()
    }

    fn standard(&self, text: &str, fields: Vec<Field>) -> SearchResult<(Box<dyn Query>, Vec<String>)> {
        let parser = QueryParser::new(self.schema.clone(), fields, self.tokenizers.clone());
        let query = parser.parse_query(text)?;
        let terms = analyze_terms(&mut multilingual_analyzer(), text);
        Ok((query, terms))
    }

    fn fuzzy(&self, text: &str, fields: &[Field], distance: u8) -> (Box<dyn Query>, Vec<String>) {
        let terms: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();

        let per_term = terms
            .iter()
            .map(|term| {
                fields
                    .iter()
                    .map(|field| {
                        Box::new(FuzzyTermQuery::new(
                            Term::from_field_text(*field, term),
                            distance,
                            true,
                        )) as Box<dyn Query>
                    })
                    .collect()
            })
            .collect();

        (combine(per_term), terms)
    }

    fn wildcard(&self, text: &str, fields: &[Field]) -> SearchResult<(Box<dyn Query>, Vec<String>)> {
        let patterns: Vec<String> = text.split_whitespace().map(preprocess_wildcard).collect();

        let mut per_term = Vec::with_capacity(patterns.len());
        for pattern in &patterns {
            let regex = glob_to_regex(pattern);
            let mut field_queries: Vec<Box<dyn Query>> = Vec::with_capacity(fields.len());
            for field in fields {
                let query = RegexQuery::from_pattern(&regex, *field).map_err(|e| {
                    SearchError::QuerySyntaxInvalid(format!("Invalid wildcard '{}': {}", pattern, e))
                })?;
                field_queries.push(Box::new(query));
            }
            per_term.push(field_queries);
        }

        Ok((combine(per_term), patterns))
    }
}

/// One term: OR over its field clauses. Several terms: AND over terms.
fn combine(per_term: Vec<Vec<Box<dyn Query>>>) -> Box<dyn Query> {
    let mut clauses: Vec<Box<dyn Query>> = per_term
        .into_iter()
        .map(|field_queries| {
            let should = field_queries.into_iter().map(|q| (Occur::Should, q)).collect();
            Box::new(BooleanQuery::new(should)) as Box<dyn Query>
        })
        .collect();

    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        Box::new(BooleanQuery::new(
            clauses.into_iter().map(|q| (Occur::Must, q)).collect(),
        ))
    }
}
