//! Durable event outbox backed by sled
//!
//! Events are appended before dispatch and removed once handled, so anything
//! left in the tree after a crash is replayed on the next start.

use crate::sync::error::SyncResult;
use crate::sync::events::{ArticleEvent, EventEnvelope, EventKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

const EVENTS_TREE: &str = "article_events";

/// On-disk form of an envelope
#[derive(Debug, Serialize, Deserialize)]
struct OutboxRecord {
    event_id: Uuid,
    kind: EventKind,
    article_id: i64,
    recorded_at: DateTime<Utc>,
}

/// Persistent queue of unacknowledged events
#[derive(Clone)]
pub struct EventOutbox {
    db: Arc<Db>,
    events_tree: sled::Tree,
}

impl EventOutbox {
    /// Open (or create) an outbox at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let db = sled::open(path.as_ref())?;
        let events_tree = db.open_tree(EVENTS_TREE)?;

        tracing::info!(path = ?path.as_ref(), pending = events_tree.len(), "Opened event outbox");

        Ok(Self {
            db: Arc::new(db),
            events_tree,
        })
    }

    /// Persist `event` and return its envelope
    pub fn append(&self, event: ArticleEvent) -> SyncResult<EventEnvelope> {
        // sled ids start at 0; shift by one so 0 can mean "not durable"
        let sequence = self.db.generate_id()? + 1;
        let envelope = EventEnvelope::new(event, sequence);

        let record = OutboxRecord {
            event_id: envelope.event_id,
            kind: event.kind(),
            article_id: event.article_id(),
            recorded_at: envelope.recorded_at,
        };
        self.events_tree
            .insert(Self::key(sequence), bincode::serialize(&record)?)?;
        self.events_tree.flush()?;

        Ok(envelope)
    }

    /// Remove a handled event
    pub fn ack(&self, sequence: u64) -> SyncResult<()> {
        self.events_tree.remove(Self::key(sequence))?;
        Ok(())
    }

    /// Every unacknowledged event in append order
    pub fn pending(&self) -> SyncResult<Vec<EventEnvelope>> {
        let mut envelopes = Vec::new();
        for entry in self.events_tree.iter() {
            let (key, value) = entry?;
            let record: OutboxRecord = bincode::deserialize(&value)?;
            envelopes.push(EventEnvelope {
                event_id: record.event_id,
                sequence: Self::sequence(&key),
                event: ArticleEvent::from_parts(record.kind, record.article_id),
                recorded_at: record.recorded_at,
            });
        }
        Ok(envelopes)
    }

    pub fn len(&self) -> usize {
        self.events_tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events_tree.is_empty()
    }

    pub fn flush(&self) -> SyncResult<()> {
        self.db.flush()?;
        Ok(())
    }

    // Big-endian keys keep sled's iteration order equal to append order
    fn key(sequence: u64) -> [u8; 8] {
        sequence.to_be_bytes()
    }

    fn sequence(key: &[u8]) -> u64 {
        let mut bytes = [0u8; 8];
        let len = key.len().min(8);
        bytes[..len].copy_from_slice(&key[..len]);
        u64::from_be_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_ack_pending() {
        let temp_dir = TempDir::new().unwrap();
        let outbox = EventOutbox::open(temp_dir.path().join("outbox")).unwrap();

        let first = outbox.append(ArticleEvent::Published { article_id: 1 }).unwrap();
        let second = outbox.append(ArticleEvent::Deleted { article_id: 2 }).unwrap();
        assert!(first.sequence < second.sequence);
        assert!(first.is_durable());

        outbox.ack(first.sequence).unwrap();
        let pending = outbox.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event, ArticleEvent::Deleted { article_id: 2 });
        assert_eq!(pending[0].event_id, second.event_id);
    }

    #[test]
    fn test_pending_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("outbox");
        {
            let outbox = EventOutbox::open(&path).unwrap();
            outbox.append(ArticleEvent::Updated { article_id: 9 }).unwrap();
            outbox.flush().unwrap();
        }

        let outbox = EventOutbox::open(&path).unwrap();
        let pending = outbox.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event.article_id(), 9);
    }
}
