//! Search configuration

use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// What the search service does when the index layer fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the error and answer with an empty page
    #[default]
    FailOpen,
    /// Return the typed error to the caller
    Propagate,
}

/// Retry policy applied when another writer holds the index lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteLockConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_lock_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubled on every further attempt
    #[serde(default = "default_lock_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single delay
    #[serde(default = "default_lock_max_backoff")]
    pub max_backoff_ms: u64,
}

impl WriteLockConfig {
    /// Delay to wait after `attempt` (1-based) failed
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

impl Default for WriteLockConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_lock_attempts(),
            initial_backoff_ms: default_lock_initial_backoff(),
            max_backoff_ms: default_lock_max_backoff(),
        }
    }
}

/// Highlighting markup and fragment size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightConfig {
    #[serde(default = "default_pre_tag")]
    pub pre_tag: String,

    #[serde(default = "default_post_tag")]
    pub post_tag: String,

    /// Maximum characters in the extracted fragment
    #[serde(default = "default_fragment_chars")]
    pub fragment_chars: usize,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            pre_tag: default_pre_tag(),
            post_tag: default_post_tag(),
            fragment_chars: default_fragment_chars(),
        }
    }
}

/// Search service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Directory holding one sub-directory per named index
    #[serde(default = "default_index_root")]
    pub index_root: PathBuf,

    /// Name of the article index
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Index writer heap size in bytes (default: 50MB)
    #[serde(default = "default_writer_heap_size")]
    pub writer_heap_size: usize,

    /// Number of indexing threads per writer
    #[serde(default = "default_writer_threads")]
    pub writer_threads: usize,

    /// Fields searched when the caller does not name any
    #[serde(default = "default_fields")]
    pub default_fields: Vec<String>,

    /// Largest accepted page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub write_lock: WriteLockConfig,

    #[serde(default)]
    pub highlight: HighlightConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_root: default_index_root(),
            index_name: default_index_name(),
            writer_heap_size: default_writer_heap_size(),
            writer_threads: default_writer_threads(),
            default_fields: default_fields(),
            max_page_size: default_max_page_size(),
            failure_policy: FailurePolicy::default(),
            write_lock: WriteLockConfig::default(),
            highlight: HighlightConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::new()
    }

    /// Directory of a named index
    pub fn index_dir(&self, name: &str) -> SearchResult<PathBuf> {
        validate_index_name(name)?;
        Ok(self.index_root.join(name))
    }
}

/// An index name must be one plain path component so its directory stays
/// under the index root
pub fn validate_index_name(name: &str) -> SearchResult<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(SearchError::InvalidIndexName(name.to_string())),
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn index_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_root = path.into();
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    pub fn writer_heap_size(mut self, size: usize) -> Self {
        self.config.writer_heap_size = size;
        self
    }

    pub fn writer_threads(mut self, threads: usize) -> Self {
        self.config.writer_threads = threads;
        self
    }

    pub fn default_fields(mut self, fields: Vec<String>) -> Self {
        self.config.default_fields = fields;
        self
    }

    pub fn max_page_size(mut self, size: usize) -> Self {
        self.config.max_page_size = size;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn write_lock(mut self, write_lock: WriteLockConfig) -> Self {
        self.config.write_lock = write_lock;
        self
    }

    pub fn highlight(mut self, highlight: HighlightConfig) -> Self {
        self.config.highlight = highlight;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_index_root() -> PathBuf {
    PathBuf::from("./data/search_index")
}

fn default_index_name() -> String {
    "article".to_string()
}

fn default_writer_heap_size() -> usize {
    50_000_000
}

fn default_writer_threads() -> usize {
    1
}

fn default_fields() -> Vec<String> {
    vec!["title".to_string(), "summary".to_string()]
}

fn default_max_page_size() -> usize {
    100
}

fn default_lock_attempts() -> u32 {
    5
}

fn default_lock_initial_backoff() -> u64 {
    50
}

fn default_lock_max_backoff() -> u64 {
    2_000
}

fn default_pre_tag() -> String {
    r##"<span style="color: #f73131">"##.to_string()
}

fn default_post_tag() -> String {
    "</span>".to_string()
}

fn default_fragment_chars() -> usize {
    100
}
