use std::path::Path;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Relational store errors
    #[error("Database error: {0}")]
    Database(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Index or query failures
    #[error("Search error: {0}")]
    Search(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Search(_) => "SEARCH_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// IO failure on a named file; a missing file becomes `NotFound`
    pub fn file(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound(path.display().to_string())
        } else {
            AppError::Io(err)
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Validation(_) | AppError::NotFound(_) => 2,
            AppError::Configuration(_) => 78,
            _ => 1,
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchError;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            AppError::Validation("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(AppError::Search("x".to_string()).error_code(), "SEARCH_ERROR");
    }

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let path = Path::new("/no/such/articles.json");
        let err = AppError::file(path, std::fs::read_to_string(path).unwrap_err());
        assert!(matches!(err, AppError::NotFound(ref p) if p == "/no/such/articles.json"));
        assert_eq!(err.exit_code(), 2);

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = AppError::file(path, denied);
        assert_eq!(err.error_code(), "IO_ERROR");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_config_errors_exit_with_config_code() {
        let err: AppError = config::ConfigError::Message("bad".to_string()).into();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn test_search_error_conversion() {
        let err: AppError = SearchError::UnknownField("body".to_string()).into();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.exit_code(), 2);

        let err: AppError = SearchError::QuerySyntaxInvalid("\"".to_string()).into();
        assert!(matches!(err, AppError::Search(_)));
    }
}
