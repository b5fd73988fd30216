use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Article row from the relational store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub cover: Option<String>,
    pub summary: Option<String>,
    pub create_time: NaiveDateTime,
    /// Soft-delete flag
    #[serde(default)]
    pub is_deleted: bool,
}

impl Article {
    /// Create a live article stamped with the current time
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            cover: None,
            summary: None,
            create_time: Utc::now().naive_utc(),
            is_deleted: false,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    pub fn with_create_time(mut self, create_time: NaiveDateTime) -> Self {
        self.create_time = create_time;
        self
    }
}

/// Markdown body, stored apart from the article row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleContent {
    pub article_id: i64,
    pub content: String,
}

/// Category and tag link rows of one article
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleLinks {
    pub category_ids: BTreeSet<i64>,
    pub tag_ids: BTreeSet<i64>,
}

impl ArticleLinks {
    pub fn new(
        category_ids: impl IntoIterator<Item = i64>,
        tag_ids: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            category_ids: category_ids.into_iter().collect(),
            tag_ids: tag_ids.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category_ids.is_empty() && self.tag_ids.is_empty()
    }
}

/// Flat article record used to seed a repository from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(flatten)]
    pub article: Article,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

impl ArticleRecord {
    pub fn links(&self) -> ArticleLinks {
        ArticleLinks::new(self.category_id, self.tag_ids.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_json() {
        let json = r#"{
            "id": 7,
            "title": "Rust 入门",
            "cover": null,
            "summary": "intro",
            "create_time": "2024-01-02T03:04:05",
            "content": "body",
            "category_id": 3,
            "tag_ids": [1, 2]
        }"#;
        let record: ArticleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.article.id, 7);
        assert!(!record.article.is_deleted);
        assert_eq!(record.links(), ArticleLinks::new([3], [1, 2]));
    }

    #[test]
    fn test_builder_helpers() {
        let article = Article::new(1, "t").with_summary("s").with_cover("c");
        assert_eq!(article.summary.as_deref(), Some("s"));
        assert_eq!(article.cover.as_deref(), Some("c"));
    }
}
