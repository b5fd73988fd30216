//! Full-text article search powered by Tantivy
//!
//! This module provides the search side of the blog:
//!
//! - **Analysis**: jieba segmentation for Chinese text, Latin tokenization
//!   with English stop words for everything else
//! - **Index Store**: one directory per named index, short-lived writers,
//!   exact pagination
//! - **Query Building**: standard (parsed), fuzzy and wildcard modes
//! - **Highlighting**: best title fragment with configurable tags
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           Search Service                         │
//! ├─────────────────────────────────────────────────┤
//! │  - search()        - execute()                  │
//! │  - present()       - failure policy             │
//! └─────────────────────────────────────────────────┘
//!           │                        │
//!           ▼                        ▼
//! ┌──────────────────────┐  ┌──────────────────────┐
//! │   Query Builder       │  │   Highlighter         │
//! │  standard / fuzzy /   │  │  term matcher per     │
//! │  wildcard             │  │  query mode           │
//! └──────────────────────┘  └──────────────────────┘
//!           │
//!           ▼
//! ┌─────────────────────────────────────────────────┐
//! │           Index Store                            │
//! ├─────────────────────────────────────────────────┤
//! │  - create / add / update / delete               │
//! │  - search window / count                        │
//! │  - writer lock retry                            │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │     Tantivy index directory  (<root>/<name>)     │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use weblog_search::search::{QueryMode, SearchConfig, SearchService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let search = SearchService::new(SearchConfig::default())?;
//!
//!     let page = search
//!         .search("article", "rust async", &[], 1, 10, QueryMode::Standard)
//!         .await?;
//!     println!("{} matches over {} pages", page.total, page.pages);
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod document;
pub mod error;
pub mod highlight;
pub mod index;
pub mod query;
pub mod service;

pub use analyzer::{select_analyzer, Script};
pub use config::{FailurePolicy, HighlightConfig, SearchConfig, SearchConfigBuilder, WriteLockConfig};
pub use document::{ArticleDocument, MatchTerm, SearchDocument};
pub use error::{SearchError, SearchErrorKind, SearchResult};
pub use highlight::{Highlighter, TermMatcher};
pub use index::{IndexStats, IndexStore};
pub use query::{CompiledQuery, QueryBuilder, QueryMode};
pub use service::{SearchHit, SearchPage, SearchRequest, SearchService};
