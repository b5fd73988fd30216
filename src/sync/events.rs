//! Article lifecycle events
//!
//! Events carry identity only; handlers re-read the authoritative row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Article lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ArticleEvent {
    /// Article became visible
    Published { article_id: i64 },

    /// Article row or content changed
    Updated { article_id: i64 },

    /// Article removed
    Deleted { article_id: i64 },
}

impl ArticleEvent {
    /// Get the article ID from any event
    pub fn article_id(&self) -> i64 {
        match self {
            ArticleEvent::Published { article_id }
            | ArticleEvent::Updated { article_id }
            | ArticleEvent::Deleted { article_id } => *article_id,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ArticleEvent::Published { .. } => EventKind::Published,
            ArticleEvent::Updated { .. } => EventKind::Updated,
            ArticleEvent::Deleted { .. } => EventKind::Deleted,
        }
    }

    pub fn from_parts(kind: EventKind, article_id: i64) -> Self {
        match kind {
            EventKind::Published => ArticleEvent::Published { article_id },
            EventKind::Updated => ArticleEvent::Updated { article_id },
            EventKind::Deleted => ArticleEvent::Deleted { article_id },
        }
    }
}

/// Event discriminant, stored in the outbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Published,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Published => "Published",
            EventKind::Updated => "Updated",
            EventKind::Deleted => "Deleted",
        }
    }
}

/// Event plus delivery metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub event_id: Uuid,

    /// Outbox sequence number; 0 when the pipeline runs without an outbox
    pub sequence: u64,

    pub event: ArticleEvent,

    /// When the event was accepted
    pub recorded_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: ArticleEvent, sequence: u64) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            sequence,
            event,
            recorded_at: Utc::now(),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.sequence != 0
    }
}
