//! Error types for the synchronization pipeline

use crate::error::AppError;
use crate::search::SearchError;

/// Result type for sync operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while applying article events
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Index mutation failed
    #[error(transparent)]
    Search(#[from] SearchError),

    /// The relational store could not be read or written
    #[error("Repository error: {0}")]
    Repository(String),

    /// The durable outbox could not be read or written
    #[error("Outbox error: {0}")]
    Outbox(String),

    /// The worker for a shard is gone
    #[error("Event channel closed for shard {0}")]
    ChannelClosed(usize),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SyncError {
    /// Whether handling the event again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Search(e) => e.is_retryable(),
            SyncError::Repository(_) | SyncError::Outbox(_) => true,
            SyncError::ChannelClosed(_) | SyncError::InvalidConfiguration(_) => false,
        }
    }
}

impl From<sled::Error> for SyncError {
    fn from(err: sled::Error) -> Self {
        SyncError::Outbox(err.to_string())
    }
}

impl From<bincode::Error> for SyncError {
    fn from(err: bincode::Error) -> Self {
        SyncError::Outbox(format!("Failed to encode outbox record: {}", err))
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Search(e) => e.into(),
            SyncError::Repository(msg) => AppError::Database(msg),
            SyncError::InvalidConfiguration(msg) => AppError::Configuration(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}
