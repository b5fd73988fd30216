//! Main search service implementation

use crate::metrics::{SEARCH_DURATION_SECONDS, SEARCH_REQUESTS_TOTAL};
use crate::search::config::{FailurePolicy, SearchConfig};
use crate::search::document::ArticleDocument;
use crate::search::error::{SearchError, SearchErrorKind, SearchResult};
use crate::search::highlight::{Highlighter, TermMatcher};
use crate::search::index::IndexStore;
use crate::search::query::{CompiledQuery, QueryBuilder, QueryMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use validator::Validate;

/// A search request as received from the query service
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    /// Target index name
    pub index: String,

    /// Raw query text
    pub query: String,

    /// Fields to search; the configured defaults when empty
    #[serde(default)]
    pub fields: Vec<String>,

    /// 1-based page number
    #[validate(range(min = 1))]
    pub page: usize,

    #[validate(range(min = 1))]
    pub page_size: usize,

    #[serde(default)]
    pub mode: QueryMode,
}

impl SearchRequest {
    /// Create a request for the first page of ten
    pub fn new(index: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            query: query.into(),
            fields: Vec::new(),
            page: 1,
            page_size: 10,
            mode: QueryMode::Standard,
        }
    }

    pub fn with_fields(mut self, fields: Vec<impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(|f| f.into()).collect();
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }
}

/// A single search result hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Article ID
    pub id: i64,

    /// Title with matched terms wrapped in highlight tags
    pub highlighted_title: String,

    pub summary: String,

    pub cover: String,

    /// Creation time as stored (`yyyy-MM-dd HH:mm:ss`)
    pub create_time: String,
}

/// One page of results plus the total match count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    /// Total matches across all pages
    pub total: u64,

    /// Current page (1-based)
    pub current: usize,

    /// Page size
    pub size: usize,

    /// Number of pages
    pub pages: u64,

    pub items: Vec<SearchHit>,
}

impl SearchPage {
    pub fn new(total: u64, current: usize, size: usize, items: Vec<SearchHit>) -> Self {
        let pages = if size == 0 { 0 } else { total.div_ceil(size as u64) };
        Self {
            total,
            current,
            size,
            pages,
            items,
        }
    }

    /// Page with no results
    pub fn empty(current: usize, size: usize) -> Self {
        Self::new(0, current, size, Vec::new())
    }
}

/// Main search service
pub struct SearchService {
    /// Index store
    store: Arc<IndexStore>,

    builder: QueryBuilder,

    highlighter: Highlighter,

    /// Configuration
    config: SearchConfig,
}

impl SearchService {
    /// Create a new search service with its own index store
    pub fn new(config: SearchConfig) -> SearchResult<Self> {
        let store = Arc::new(IndexStore::new(config)?);
        Ok(Self::with_store(store))
    }

    /// Create a search service sharing an existing index store
    pub fn with_store(store: Arc<IndexStore>) -> Self {
        let config = store.config().clone();
        Self {
            builder: QueryBuilder::new(store.schema().clone()),
            highlighter: Highlighter::new(&config.highlight),
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Search `index` and return the requested page with highlighted titles
    pub async fn search(
        &self,
        index: &str,
        query_text: &str,
        fields: &[String],
        page: usize,
        page_size: usize,
        mode: QueryMode,
    ) -> SearchResult<SearchPage> {
        let request = SearchRequest {
            index: index.to_string(),
            query: query_text.to_string(),
            fields: fields.to_vec(),
            page,
            page_size,
            mode,
        };
        self.execute(&request).await
    }

    /// Execute a request, applying the configured failure policy
    pub async fn execute(&self, request: &SearchRequest) -> SearchResult<SearchPage> {
        let start_time = Instant::now();
        let mode = request.mode.name();

        let result = self.try_execute(request).await;
        SEARCH_DURATION_SECONDS
            .with_label_values(&[mode])
            .observe(start_time.elapsed().as_secs_f64());

        match result {
            Ok(page) => {
                SEARCH_REQUESTS_TOTAL.with_label_values(&[mode, "ok"]).inc();
                Ok(page)
            }
            Err(e) => {
                SEARCH_REQUESTS_TOTAL
                    .with_label_values(&[mode, e.kind().to_string().as_str()])
                    .inc();
                self.apply_failure_policy(request, e)
            }
        }
    }

    fn apply_failure_policy(&self, request: &SearchRequest, err: SearchError) -> SearchResult<SearchPage> {
        // Malformed requests are the caller's bug and are never masked
        if self.config.failure_policy == FailurePolicy::Propagate
            || err.kind() == SearchErrorKind::InvalidRequest
        {
            return Err(err);
        }

        warn!(
            index = %request.index,
            query = %request.query,
            kind = %err.kind(),
            error = %err,
            "Search failed, answering with an empty page"
        );
        Ok(SearchPage::empty(request.page, request.page_size))
    }

    async fn try_execute(&self, request: &SearchRequest) -> SearchResult<SearchPage> {
        request.validate()?;
        if request.page_size > self.config.max_page_size {
            return Err(SearchError::InvalidPagination(format!(
                "page size {} exceeds the maximum of {}",
                request.page_size, self.config.max_page_size
            )));
        }

        let fields = if request.fields.is_empty() {
            &self.config.default_fields
        } else {
            &request.fields
        };
        let query = self.builder.build(&request.query, fields, request.mode)?;
        if query.is_empty() {
            return Ok(SearchPage::empty(request.page, request.page_size));
        }

        let total = self.store.count(&request.index, &query).await?;
        let documents = self
            .store
            .search(&request.index, &query, request.page, request.page_size)
            .await?;

        debug!(
            index = %request.index,
            mode = request.mode.name(),
            total,
            returned = documents.len(),
            "Search executed"
        );

        let items = self.present(&query, documents);
        Ok(SearchPage::new(total, request.page, request.page_size, items))
    }

    /// Turn a page of documents into hits with highlighted titles
    pub fn present(&self, query: &CompiledQuery, documents: Vec<ArticleDocument>) -> Vec<SearchHit> {
        let matcher = TermMatcher::for_query(query);

        documents
            .into_iter()
            .filter_map(|doc| {
                let Some(id) = doc.article_id() else {
                    warn!(id = %doc.id, "Skipping hit with non-numeric id");
                    return None;
                };
                let highlighted_title =
                    self.highlighter
                        .highlight_or_original(&doc.title, query.text(), &matcher);
                Some(SearchHit {
                    id,
                    highlighted_title,
                    summary: doc.summary,
                    cover: doc.cover,
                    create_time: doc.create_time,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(temp_dir: &TempDir, policy: FailurePolicy) -> SearchService {
        let config = SearchConfig {
            index_root: temp_dir.path().to_path_buf(),
            failure_policy: policy,
            ..Default::default()
        };
        SearchService::new(config).unwrap()
    }

    #[test]
    fn test_page_count() {
        assert_eq!(SearchPage::new(25, 1, 10, Vec::new()).pages, 3);
        assert_eq!(SearchPage::new(20, 1, 10, Vec::new()).pages, 2);
        assert_eq!(SearchPage::empty(1, 10).pages, 0);
    }

    #[test]
    fn test_request_validation() {
        assert!(SearchRequest::new("article", "x").validate().is_ok());
        assert!(SearchRequest::new("article", "x").with_page(0, 10).validate().is_err());
        assert!(SearchRequest::new("article", "x").with_page(1, 0).validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_index_fails_open() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, FailurePolicy::FailOpen);

        let page = service
            .search("missing", "hello", &[], 1, 10, QueryMode::Standard)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_missing_index_propagates() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, FailurePolicy::Propagate);

        let err = service
            .search("missing", "hello", &[], 1, 10, QueryMode::Standard)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), SearchErrorKind::IndexUnavailable);
    }

    #[tokio::test]
    async fn test_invalid_pagination_never_masked() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, FailurePolicy::FailOpen);

        let err = service
            .search("article", "hello", &[], 0, 10, QueryMode::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidPagination(_)));
    }

    #[tokio::test]
    async fn test_oversized_page_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, FailurePolicy::FailOpen);

        let err = service
            .search("article", "hello", &[], 1, 1_000, QueryMode::Standard)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), SearchErrorKind::InvalidRequest);
    }
}
