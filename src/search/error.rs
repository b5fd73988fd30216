//! Error types for search operations

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use tantivy::TantivyError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Coarse classification of a [`SearchError`], stable enough for callers to
/// branch on ("no matches" vs "search subsystem is broken").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchErrorKind {
    IndexUnavailable,
    QuerySyntaxInvalid,
    LockContention,
    InvalidRequest,
    Internal,
}

/// Errors that can occur during search operations
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The index directory could not be opened, created or closed
    #[error("Index '{index}' unavailable: {reason}")]
    IndexUnavailable { index: String, reason: String },

    /// Standard-mode query text could not be parsed
    #[error("Query syntax invalid: {0}")]
    QuerySyntaxInvalid(String),

    /// Another writer held the index lock for every attempt
    #[error("Index '{index}' is locked by another writer after {attempts} attempts")]
    LockContention { index: String, attempts: u32 },

    /// A target field does not exist in the article schema
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Index name that is not a single directory name
    #[error("Invalid index name: {0:?}")]
    InvalidIndexName(String),

    /// Page or page size out of range
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    /// Document write failed
    #[error("Document indexing failed: {0}")]
    IndexingFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Tantivy error
    #[error("Tantivy error: {0}")]
    TantivyError(String),
}

impl SearchError {
    pub(crate) fn unavailable(index: &str, reason: impl ToString) -> Self {
        SearchError::IndexUnavailable {
            index: index.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> SearchErrorKind {
        match self {
            SearchError::IndexUnavailable { .. } | SearchError::IoError(_) => {
                SearchErrorKind::IndexUnavailable
            }
            SearchError::QuerySyntaxInvalid(_) => SearchErrorKind::QuerySyntaxInvalid,
            SearchError::LockContention { .. } => SearchErrorKind::LockContention,
            SearchError::UnknownField(_)
            | SearchError::InvalidIndexName(_)
            | SearchError::InvalidPagination(_)
            | SearchError::InvalidConfiguration(_) => SearchErrorKind::InvalidRequest,
            SearchError::IndexingFailed(_) | SearchError::TantivyError(_) => {
                SearchErrorKind::Internal
            }
        }
    }

    /// Whether a write that failed with this error may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            SearchErrorKind::LockContention | SearchErrorKind::IndexUnavailable
        )
    }
}

impl From<TantivyError> for SearchError {
    fn from(err: TantivyError) -> Self {
        SearchError::TantivyError(err.to_string())
    }
}

impl From<tantivy::query::QueryParserError> for SearchError {
    fn from(err: tantivy::query::QueryParserError) -> Self {
        SearchError::QuerySyntaxInvalid(err.to_string())
    }
}

impl From<validator::ValidationErrors> for SearchError {
    fn from(err: validator::ValidationErrors) -> Self {
        SearchError::InvalidPagination(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidConfiguration(msg) => AppError::Configuration(msg),
            SearchError::UnknownField(_) | SearchError::InvalidPagination(_) => {
                AppError::Validation(err.to_string())
            }
            SearchError::IoError(err) => AppError::Io(err),
            _ => AppError::Search(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SearchError::unavailable("article", "missing").kind(),
            SearchErrorKind::IndexUnavailable
        );
        assert_eq!(
            SearchError::QuerySyntaxInvalid("\"".into()).kind(),
            SearchErrorKind::QuerySyntaxInvalid
        );
        assert_eq!(
            SearchError::LockContention {
                index: "article".into(),
                attempts: 3
            }
            .kind(),
            SearchErrorKind::LockContention
        );
        assert_eq!(
            SearchError::UnknownField("body".into()).kind(),
            SearchErrorKind::InvalidRequest
        );
    }

    #[test]
    fn test_retryable() {
        assert!(SearchError::LockContention {
            index: "article".into(),
            attempts: 1
        }
        .is_retryable());
        assert!(!SearchError::QuerySyntaxInvalid("x".into()).is_retryable());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SearchErrorKind::QuerySyntaxInvalid.to_string(), "query_syntax_invalid");
    }
}
