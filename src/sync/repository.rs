//! Read/write access to the relational article store

use crate::models::{Article, ArticleContent, ArticleLinks, ArticleRecord};
use crate::sync::error::SyncResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Relational operations the sync pipeline depends on
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Fetch the article row, soft-deleted rows included
    async fn get_article_by_id(&self, id: i64) -> SyncResult<Option<Article>>;

    async fn get_article_content_by_article_id(
        &self,
        article_id: i64,
    ) -> SyncResult<Option<ArticleContent>>;

    /// Live articles per category; every known category is present, zeros included
    async fn count_articles_per_category(&self) -> SyncResult<BTreeMap<i64, u64>>;

    /// Live articles per tag; every known tag is present, zeros included
    async fn count_articles_per_tag(&self) -> SyncResult<BTreeMap<i64, u64>>;

    async fn set_category_article_total(&self, category_id: i64, total: u64) -> SyncResult<()>;

    async fn set_tag_article_total(&self, tag_id: i64, total: u64) -> SyncResult<()>;

    /// Category and tag links of one article; empty when it has none
    async fn get_article_links(&self, article_id: i64) -> SyncResult<ArticleLinks>;

    /// IDs of every live article
    async fn list_article_ids(&self) -> SyncResult<Vec<i64>>;
}

/// In-memory article store (for the CLI and testing)
#[derive(Clone, Default)]
pub struct InMemoryArticleRepository {
    articles: Arc<DashMap<i64, Article>>,
    contents: Arc<DashMap<i64, ArticleContent>>,
    links: Arc<DashMap<i64, ArticleLinks>>,
    category_totals: Arc<DashMap<i64, u64>>,
    tag_totals: Arc<DashMap<i64, u64>>,
    total_writes: Arc<AtomicU64>,
}

impl InMemoryArticleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository holding `records`
    pub fn from_records(records: impl IntoIterator<Item = ArticleRecord>) -> Self {
        let repository = Self::new();
        for record in records {
            repository.upsert(record);
        }
        repository
    }

    /// Insert or replace an article with its content and links
    pub fn upsert(&self, record: ArticleRecord) {
        let id = record.article.id;
        let links = record.links();
        for category_id in &links.category_ids {
            self.add_category(*category_id);
        }
        for tag_id in &links.tag_ids {
            self.add_tag(*tag_id);
        }

        self.contents.insert(
            id,
            ArticleContent {
                article_id: id,
                content: record.content,
            },
        );
        self.links.insert(id, links);
        self.articles.insert(id, record.article);
        tracing::debug!(article_id = id, "Article saved");
    }

    /// Replace the article row only
    pub fn save_article(&self, article: Article) {
        self.articles.insert(article.id, article);
    }

    pub fn set_links(&self, article_id: i64, links: ArticleLinks) {
        for category_id in &links.category_ids {
            self.add_category(*category_id);
        }
        for tag_id in &links.tag_ids {
            self.add_tag(*tag_id);
        }
        self.links.insert(article_id, links);
    }

    /// Flag the row as deleted, keeping it readable
    pub fn soft_delete(&self, article_id: i64) -> bool {
        match self.articles.get_mut(&article_id) {
            Some(mut article) => {
                article.is_deleted = true;
                true
            }
            None => false,
        }
    }

    /// Remove the row, its content and its links
    pub fn remove(&self, article_id: i64) -> Option<Article> {
        self.contents.remove(&article_id);
        self.links.remove(&article_id);
        self.articles.remove(&article_id).map(|(_, article)| article)
    }

    /// Register a category so it is reported even with no articles
    pub fn add_category(&self, category_id: i64) {
        self.category_totals.entry(category_id).or_insert(0);
    }

    pub fn add_tag(&self, tag_id: i64) {
        self.tag_totals.entry(tag_id).or_insert(0);
    }

    /// Last total written for a category
    pub fn category_total(&self, category_id: i64) -> Option<u64> {
        self.category_totals.get(&category_id).map(|total| *total)
    }

    pub fn tag_total(&self, tag_id: i64) -> Option<u64> {
        self.tag_totals.get(&tag_id).map(|total| *total)
    }

    pub fn category_totals(&self) -> BTreeMap<i64, u64> {
        self.category_totals
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    pub fn tag_totals(&self) -> BTreeMap<i64, u64> {
        self.tag_totals
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Number of total writes performed through the trait
    pub fn total_writes(&self) -> u64 {
        self.total_writes.load(Ordering::SeqCst)
    }

    fn is_live(&self, article_id: i64) -> bool {
        self.articles
            .get(&article_id)
            .map(|article| !article.is_deleted)
            .unwrap_or(false)
    }

    fn count_live<F>(&self, known: &DashMap<i64, u64>, ids_of: F) -> BTreeMap<i64, u64>
    where
        F: Fn(&ArticleLinks) -> Vec<i64>,
    {
        let mut counts: BTreeMap<i64, u64> = known.iter().map(|entry| (*entry.key(), 0)).collect();
        for entry in self.links.iter() {
            if !self.is_live(*entry.key()) {
                continue;
            }
            for id in ids_of(entry.value()) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[async_trait]
impl ArticleRepository for InMemoryArticleRepository {
    async fn get_article_by_id(&self, id: i64) -> SyncResult<Option<Article>> {
        Ok(self.articles.get(&id).map(|entry| entry.clone()))
    }

    async fn get_article_content_by_article_id(
        &self,
        article_id: i64,
    ) -> SyncResult<Option<ArticleContent>> {
        Ok(self.contents.get(&article_id).map(|entry| entry.clone()))
    }

    async fn count_articles_per_category(&self) -> SyncResult<BTreeMap<i64, u64>> {
        Ok(self.count_live(&self.category_totals, |links| {
            links.category_ids.iter().copied().collect()
        }))
    }

    async fn count_articles_per_tag(&self) -> SyncResult<BTreeMap<i64, u64>> {
        Ok(self.count_live(&self.tag_totals, |links| links.tag_ids.iter().copied().collect()))
    }

    async fn set_category_article_total(&self, category_id: i64, total: u64) -> SyncResult<()> {
        self.category_totals.insert(category_id, total);
        self.total_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_tag_article_total(&self, tag_id: i64, total: u64) -> SyncResult<()> {
        self.tag_totals.insert(tag_id, total);
        self.total_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_article_links(&self, article_id: i64) -> SyncResult<ArticleLinks> {
        Ok(self
            .links
            .get(&article_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn list_article_ids(&self) -> SyncResult<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .articles
            .iter()
            .filter(|entry| !entry.is_deleted)
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, category_id: i64, tag_ids: Vec<i64>) -> ArticleRecord {
        ArticleRecord {
            article: Article::new(id, format!("article {}", id)),
            content: "body".to_string(),
            category_id: Some(category_id),
            tag_ids,
        }
    }

    #[tokio::test]
    async fn test_counts_include_empty_categories() {
        let repository = InMemoryArticleRepository::from_records(vec![
            record(1, 10, vec![100, 101]),
            record(2, 10, vec![101]),
        ]);
        repository.add_category(11);

        let categories = repository.count_articles_per_category().await.unwrap();
        assert_eq!(categories.get(&10), Some(&2));
        assert_eq!(categories.get(&11), Some(&0));

        let tags = repository.count_articles_per_tag().await.unwrap();
        assert_eq!(tags.get(&100), Some(&1));
        assert_eq!(tags.get(&101), Some(&2));
    }

    #[tokio::test]
    async fn test_soft_deleted_articles_not_counted() {
        let repository = InMemoryArticleRepository::from_records(vec![
            record(1, 10, vec![]),
            record(2, 10, vec![]),
        ]);
        assert!(repository.soft_delete(2));

        let categories = repository.count_articles_per_category().await.unwrap();
        assert_eq!(categories.get(&10), Some(&1));
        assert_eq!(repository.list_article_ids().await.unwrap(), vec![1]);

        // The row stays readable
        let article = repository.get_article_by_id(2).await.unwrap().unwrap();
        assert!(article.is_deleted);
    }

    #[test]
    fn test_remove_drops_row_and_links() {
        let repository = InMemoryArticleRepository::from_records(vec![record(1, 10, vec![100])]);
        assert!(repository.remove(1).is_some());

        let article = tokio_test::block_on(repository.get_article_by_id(1)).unwrap();
        assert!(article.is_none());
        let links = tokio_test::block_on(repository.get_article_links(1)).unwrap();
        assert!(links.is_empty());
        // The category stays known with a zero count
        let categories = tokio_test::block_on(repository.count_articles_per_category()).unwrap();
        assert_eq!(categories.get(&10), Some(&0));
    }

    #[tokio::test]
    async fn test_total_writes_tracked() {
        let repository = InMemoryArticleRepository::new();
        repository.set_category_article_total(1, 3).await.unwrap();
        repository.set_tag_article_total(2, 4).await.unwrap();

        assert_eq!(repository.category_total(1), Some(3));
        assert_eq!(repository.tag_total(2), Some(4));
        assert_eq!(repository.total_writes(), 2);
    }
}
