//! Article documents and the index schema

use crate::models::{Article, ArticleContent};
use crate::search::analyzer::{classify, Script, MULTILINGUAL_ANALYZER};
use crate::search::error::{SearchError, SearchResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tantivy::schema::*;
use tantivy::{TantivyDocument, Term};

pub const FIELD_ID: &str = "id";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_COVER: &str = "cover";
pub const FIELD_SUMMARY: &str = "summary";
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_CREATE_TIME: &str = "createTime";
pub const FIELD_SCRIPT: &str = "script";

/// Fields a query may target
pub const SEARCHABLE_FIELDS: &[&str] = &[
    FIELD_TITLE,
    FIELD_COVER,
    FIELD_SUMMARY,
    FIELD_CONTENT,
    FIELD_CREATE_TIME,
];

/// Format of the stored `createTime` field
pub const CREATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Trait for documents that can be indexed and searched
pub trait SearchDocument {
    /// Convert to Tantivy document
    fn to_tantivy_doc(&self, schema: &Schema) -> TantivyDocument;

    /// Get document ID
    fn document_id(&self) -> String;
}

/// Exact (field, value) predicate used to target updates and deletes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTerm {
    pub field: String,
    pub value: String,
}

impl MatchTerm {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Term on the identity field
    pub fn id(article_id: i64) -> Self {
        Self::new(FIELD_ID, article_id.to_string())
    }

    /// Resolve against a schema
    pub fn to_term(&self, schema: &Schema) -> SearchResult<Term> {
        let field = schema
            .get_field(&self.field)
            .map_err(|_| SearchError::UnknownField(self.field.clone()))?;
        Ok(Term::from_field_text(field, &self.value))
    }
}

/// Article document for search indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDocument {
    /// Article primary key rendered as a string
    pub id: String,

    pub title: String,

    pub cover: String,

    pub summary: String,

    /// Raw Markdown body
    pub content: String,

    /// Creation time formatted as `yyyy-MM-dd HH:mm:ss`
    pub create_time: String,
}

impl ArticleDocument {
    /// Build from the authoritative article row and its content
    pub fn from_article(article: &Article, content: Option<&ArticleContent>) -> Self {
        Self {
            id: article.id.to_string(),
            title: article.title.clone(),
            cover: article.cover.clone().unwrap_or_default(),
            summary: article.summary.clone().unwrap_or_default(),
            content: content.map(|c| c.content.clone()).unwrap_or_default(),
            create_time: format_create_time(&article.create_time),
        }
    }

    /// Script detected over all text fields
    pub fn script(&self) -> Script {
        let combined = [
            self.title.as_str(),
            self.summary.as_str(),
            self.content.as_str(),
        ]
        .join(" ");
        classify(&combined)
    }

    /// Rebuild from a stored document
    pub fn from_tantivy_doc(doc: &TantivyDocument, schema: &Schema) -> Self {
        Self {
            id: stored_text(doc, schema, FIELD_ID),
            title: stored_text(doc, schema, FIELD_TITLE),
            cover: stored_text(doc, schema, FIELD_COVER),
            summary: stored_text(doc, schema, FIELD_SUMMARY),
            content: stored_text(doc, schema, FIELD_CONTENT),
            create_time: stored_text(doc, schema, FIELD_CREATE_TIME),
        }
    }

    /// Article id parsed back to its numeric form
    pub fn article_id(&self) -> Option<i64> {
        self.id.parse().ok()
    }
}

impl SearchDocument for ArticleDocument {
    fn to_tantivy_doc(&self, schema: &Schema) -> TantivyDocument {
        let mut doc = TantivyDocument::new();

        let values = [
            (FIELD_ID, self.id.as_str()),
            (FIELD_TITLE, self.title.as_str()),
            (FIELD_COVER, self.cover.as_str()),
            (FIELD_SUMMARY, self.summary.as_str()),
            (FIELD_CONTENT, self.content.as_str()),
            (FIELD_CREATE_TIME, self.create_time.as_str()),
        ];
        for (name, value) in values {
            if let Ok(field) = schema.get_field(name) {
                doc.add_text(field, value);
            }
        }

        if let Ok(field) = schema.get_field(FIELD_SCRIPT) {
            doc.add_text(field, self.script().to_string());
        }

        doc
    }

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

pub fn format_create_time(time: &NaiveDateTime) -> String {
    time.format(CREATE_TIME_FORMAT).to_string()
}

fn stored_text(doc: &TantivyDocument, schema: &Schema, field_name: &str) -> String {
    schema
        .get_field(field_name)
        .ok()
        .and_then(|field| doc.get_first(field).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Build the search schema for articles
pub fn build_article_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    // ID - exact match for update/delete targeting
    schema_builder.add_text_field(FIELD_ID, STRING | STORED);

    let text_indexing = TextFieldIndexing::default()
        .set_tokenizer(MULTILINGUAL_ANALYZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default()
        .set_indexing_options(text_indexing)
        .set_stored();

    for name in SEARCHABLE_FIELDS {
        schema_builder.add_text_field(name, text_options.clone());
    }

    schema_builder.add_text_field(FIELD_SCRIPT, STRING | STORED);

    schema_builder.build()
}
