//! Common test utilities for search and sync integration tests

#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;
use weblog_search::models::{Article, ArticleRecord};
use weblog_search::search::{
    ArticleDocument, FailurePolicy, IndexStore, SearchConfig, SearchService, WriteLockConfig,
};

pub const INDEX: &str = "article";

/// Search config rooted in `temp_dir`, patient with lock contention
pub fn search_config(temp_dir: &TempDir, policy: FailurePolicy) -> SearchConfig {
    SearchConfig::builder()
        .index_root(temp_dir.path().join("index"))
        .index_name(INDEX)
        .writer_heap_size(20_000_000)
        .failure_policy(policy)
        .write_lock(WriteLockConfig {
            max_attempts: 40,
            initial_backoff_ms: 10,
            max_backoff_ms: 200,
        })
        .build()
}

pub fn store(temp_dir: &TempDir) -> Arc<IndexStore> {
    Arc::new(IndexStore::new(search_config(temp_dir, FailurePolicy::Propagate)).unwrap())
}

/// Service that returns typed errors instead of empty pages
pub fn strict_service(store: &Arc<IndexStore>) -> SearchService {
    SearchService::with_store(store.clone())
}

pub fn article(id: i64, title: &str) -> Article {
    let create_time = NaiveDate::from_ymd_opt(2024, 3, 15)
        .and_then(|d| d.and_hms_opt(10, 30, 0))
        .unwrap();
    Article::new(id, title)
        .with_summary(format!("summary of {}", title))
        .with_create_time(create_time)
}

pub fn document(id: i64, title: &str) -> ArticleDocument {
    ArticleDocument::from_article(&article(id, title), None)
}

pub fn record(id: i64, title: &str, category_id: i64, tag_ids: Vec<i64>) -> ArticleRecord {
    ArticleRecord {
        article: article(id, title),
        content: format!("content of {}", title),
        category_id: Some(category_id),
        tag_ids,
    }
}

pub fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
