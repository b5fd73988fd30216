//! Directory-backed index store
//!
//! Every call opens its own index handle. Mutations take the directory's
//! writer lock for one open → mutate → commit → close cycle; reads open a
//! snapshot of the last committed generation. Nothing is cached between
//! calls.

use crate::metrics::{INDEX_DOCUMENTS, INDEX_OPERATIONS_TOTAL};
use crate::search::analyzer::register_analyzers;
use crate::search::config::SearchConfig;
use crate::search::document::{build_article_schema, ArticleDocument, MatchTerm, SearchDocument};
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::CompiledQuery;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::TermQuery;
use tantivy::schema::{IndexRecordOption, Schema};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, TantivyError};
use tracing::{debug, info, warn};

/// Index statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Live documents in the index
    pub total_documents: u64,

    /// Index size in bytes
    pub index_size_bytes: u64,

    /// Number of segments
    pub num_segments: usize,
}

/// Owns one directory per named index under the configured root
pub struct IndexStore {
    schema: Schema,
    config: SearchConfig,
}

impl IndexStore {
    /// Create a store rooted at `config.index_root`
    pub fn new(config: SearchConfig) -> SearchResult<Self> {
        std::fs::create_dir_all(&config.index_root).map_err(|e| {
            SearchError::unavailable("*", format!("Failed to create index root: {}", e))
        })?;

        Ok(Self {
            schema: build_article_schema(),
            config,
        })
    }

    /// Get the schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Check whether a committed index exists under `name`
    pub fn index_exists(&self, name: &str) -> bool {
        self.config
            .index_dir(name)
            .map(|dir| dir.join("meta.json").exists())
            .unwrap_or(false)
    }

    /// Wipe the index directory and write `documents` as the only content
    pub async fn create_index(&self, name: &str, documents: &[ArticleDocument]) -> SearchResult<u64> {
        let dir = self.config.index_dir(name)?;
        if dir.exists() {
            clean_directory(&dir).map_err(|e| SearchError::unavailable(name, e))?;
        } else {
            std::fs::create_dir_all(&dir).map_err(|e| SearchError::unavailable(name, e))?;
        }

        let index = Index::create_in_dir(&dir, self.schema.clone())
            .map_err(|e| SearchError::unavailable(name, format!("Failed to create index: {}", e)))?;
        register_analyzers(index.tokenizers());

        let affected = self
            .write_with(name, &index, "create", |writer, _, schema| {
                for document in documents {
                    writer
                        .add_document(document.to_tantivy_doc(schema))
                        .map_err(|e| {
                            SearchError::IndexingFailed(format!(
                                "Failed to add document {}: {}",
                                document.document_id(),
                                e
                            ))
                        })?;
                }
                Ok(documents.len() as u64)
            })
            .await?;

        info!(index = name, documents = affected, "Index rebuilt");
        Ok(affected)
    }

    /// Append a document
    pub async fn add_document(&self, name: &str, document: &ArticleDocument) -> SearchResult<u64> {
        self.mutate(name, "add", |writer, _, schema| {
            writer
                .add_document(document.to_tantivy_doc(schema))
                .map_err(|e| SearchError::IndexingFailed(format!("Failed to add document: {}", e)))?;
            Ok(1)
        })
        .await
    }

    /// Replace every document matching `match_term` with `document` in one commit
    pub async fn update_document(
        &self,
        name: &str,
        document: &ArticleDocument,
        match_term: &MatchTerm,
    ) -> SearchResult<u64> {
        self.mutate(name, "update", |writer, _, schema| {
            let term = match_term.to_term(schema)?;
            writer.delete_term(term);
            writer
                .add_document(document.to_tantivy_doc(schema))
                .map_err(|e| SearchError::IndexingFailed(format!("Failed to add document: {}", e)))?;
            Ok(1)
        })
        .await
    }

    /// Delete every document matching `match_term`, returning how many were removed
    pub async fn delete_document(&self, name: &str, match_term: &MatchTerm) -> SearchResult<u64> {
        self.mutate(name, "delete", |writer, index, schema| {
            let term = match_term.to_term(schema)?;
            // The writer lock is held, so this snapshot cannot go stale before commit
            let searcher = open_searcher(index)?;
            let matching = searcher.search(&TermQuery::new(term.clone(), IndexRecordOption::Basic), &Count)?;
            writer.delete_term(term);
            Ok(matching as u64)
        })
        .await
    }

    /// Return the window `[(page-1)*page_size, page*page_size)` of ranked hits
    pub async fn search(
        &self,
        name: &str,
        query: &CompiledQuery,
        page: usize,
        page_size: usize,
    ) -> SearchResult<Vec<ArticleDocument>> {
        if page == 0 || page_size == 0 {
            return Err(SearchError::InvalidPagination(format!(
                "page and page size must be positive (page={}, page_size={})",
                page, page_size
            )));
        }
        let limit = page
            .checked_mul(page_size)
            .ok_or_else(|| SearchError::InvalidPagination("page window overflows".to_string()))?;

        let searcher = self.snapshot(name)?;
        let top_docs = searcher.search(query.as_query(), &TopDocs::with_limit(limit))?;

        let start = (page - 1) * page_size;
        let end = limit.min(top_docs.len());
        if start >= end {
            return Ok(Vec::new());
        }

        let mut documents = Vec::with_capacity(end - start);
        for (_score, address) in &top_docs[start..end] {
            let retrieved: TantivyDocument = searcher.doc(*address)?;
            documents.push(ArticleDocument::from_tantivy_doc(&retrieved, &self.schema));
        }

        debug!(index = name, page, page_size, returned = documents.len(), "Search window");
        Ok(documents)
    }

    /// Count every document matching `query`
    pub async fn count(&self, name: &str, query: &CompiledQuery) -> SearchResult<u64> {
        let searcher = self.snapshot(name)?;
        let total = searcher.search(query.as_query(), &Count)?;
        Ok(total as u64)
    }

    /// Fetch the first document matching `match_term`
    pub async fn get_document(
        &self,
        name: &str,
        match_term: &MatchTerm,
    ) -> SearchResult<Option<ArticleDocument>> {
        let term = match_term.to_term(&self.schema)?;
        let searcher = self.snapshot(name)?;
        let top = searcher.search(
            &TermQuery::new(term, IndexRecordOption::Basic),
            &TopDocs::with_limit(1),
        )?;

        match top.first() {
            Some((_, address)) => {
                let retrieved: TantivyDocument = searcher.doc(*address)?;
                Ok(Some(ArticleDocument::from_tantivy_doc(&retrieved, &self.schema)))
            }
            None => Ok(None),
        }
    }

    /// Number of live documents
    pub async fn doc_count(&self, name: &str) -> SearchResult<u64> {
        Ok(self.snapshot(name)?.num_docs())
    }

    /// Get index statistics
    pub async fn stats(&self, name: &str) -> SearchResult<IndexStats> {
        let searcher = self.snapshot(name)?;

        let index_size_bytes = std::fs::read_dir(self.config.index_dir(name)?)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0);

        let total_documents = searcher.num_docs();
        INDEX_DOCUMENTS
            .with_label_values(&[name])
            .set(total_documents as i64);

        Ok(IndexStats {
            total_documents,
            index_size_bytes,
            num_segments: searcher.segment_readers().len(),
        })
    }

    async fn mutate<F>(&self, name: &str, operation: &'static str, apply: F) -> SearchResult<u64>
    where
        F: FnOnce(&mut IndexWriter, &Index, &Schema) -> SearchResult<u64>,
    {
        let index = self.open_or_create(name)?;
        self.write_with(name, &index, operation, apply).await
    }

    async fn write_with<F>(
        &self,
        name: &str,
        index: &Index,
        operation: &'static str,
        apply: F,
    ) -> SearchResult<u64>
    where
        F: FnOnce(&mut IndexWriter, &Index, &Schema) -> SearchResult<u64>,
    {
        let mut writer = match self.acquire_writer(name, index).await {
            Ok(writer) => writer,
            Err(e) => {
                INDEX_OPERATIONS_TOTAL.with_label_values(&[operation, "error"]).inc();
                return Err(e);
            }
        };

        let outcome = apply(&mut writer, index, &self.schema).and_then(|affected| {
            writer
                .commit()
                .map_err(|e| SearchError::IndexingFailed(format!("Failed to commit: {}", e)))?;
            Ok(affected)
        });

        match outcome {
            Ok(affected) => {
                // Joining the merge threads releases the directory lock
                writer.wait_merging_threads().map_err(|e| {
                    SearchError::unavailable(name, format!("Failed to close writer: {}", e))
                })?;
                INDEX_OPERATIONS_TOTAL.with_label_values(&[operation, "ok"]).inc();
                debug!(index = name, operation, affected, "Index mutation committed");
                Ok(affected)
            }
            Err(e) => {
                if let Err(rollback) = writer.rollback() {
                    warn!(index = name, operation, error = %rollback, "Rollback failed");
                }
                INDEX_OPERATIONS_TOTAL.with_label_values(&[operation, "error"]).inc();
                Err(e)
            }
        }
    }

    /// Open the writer, retrying while another writer holds the lock
    async fn acquire_writer(&self, name: &str, index: &Index) -> SearchResult<IndexWriter> {
        let policy = &self.config.write_lock;
        let attempts = policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let result: tantivy::Result<IndexWriter> = index.writer_with_num_threads(
                self.config.writer_threads.max(1),
                self.config.writer_heap_size,
            );
            match result {
                Ok(writer) => return Ok(writer),
                Err(TantivyError::LockFailure(err, _)) => {
                    if attempt == attempts {
                        break;
                    }
                    let delay = policy.backoff(attempt);
                    warn!(
                        index = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Index writer lock busy, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(SearchError::unavailable(
                        name,
                        format!("Failed to open writer: {}", e),
                    ))
                }
            }
        }

        Err(SearchError::LockContention {
            index: name.to_string(),
            attempts,
        })
    }

    fn open_or_create(&self, name: &str) -> SearchResult<Index> {
        let dir = self.config.index_dir(name)?;
        let index = if self.index_exists(name) {
            Index::open_in_dir(&dir)
                .map_err(|e| SearchError::unavailable(name, format!("Failed to open index: {}", e)))?
        } else {
            std::fs::create_dir_all(&dir).map_err(|e| SearchError::unavailable(name, e))?;
            Index::create_in_dir(&dir, self.schema.clone())
                .map_err(|e| SearchError::unavailable(name, format!("Failed to create index: {}", e)))?
        };
        register_analyzers(index.tokenizers());
        Ok(index)
    }

    fn snapshot(&self, name: &str) -> SearchResult<Searcher> {
        let dir = self.config.index_dir(name)?;
        if !dir.join("meta.json").exists() {
            return Err(SearchError::unavailable(name, "index does not exist"));
        }
        let index = Index::open_in_dir(&dir)
            .map_err(|e| SearchError::unavailable(name, format!("Failed to open index: {}", e)))?;
        register_analyzers(index.tokenizers());
        open_searcher(&index).map_err(|e| SearchError::unavailable(name, e))
    }
}

fn open_searcher(index: &Index) -> SearchResult<Searcher> {
    let reader: IndexReader = index
        .reader_builder()
        .reload_policy(ReloadPolicy::Manual)
        .try_into()?;
    Ok(reader.searcher())
}

fn clean_directory(dir: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}
