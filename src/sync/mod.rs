//! Article synchronization pipeline
//!
//! Lifecycle events from the relational side drive index mutations and
//! category/tag total recomputation:
//!
//! ```text
//! publish(ArticleEvent) ──► [outbox] ──► shard = id mod workers
//!                                              │
//!                    ┌─────────────────────────┼──────────────────────┐
//!                    ▼                         ▼                      ▼
//!               worker 0                  worker 1        ...    worker N-1
//!                    │  re-read row, build document, replace/delete by id
//!                    ▼
//!              Index Store  ──►  AggregateRecomputer (full scan | deltas)
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod outbox;
pub mod pipeline;
pub mod repository;
pub mod statistics;

pub use config::{AggregateStrategy, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use events::{ArticleEvent, EventEnvelope, EventKind};
pub use outbox::EventOutbox;
pub use pipeline::{EventHandler, EventSink, SyncPipeline};
pub use repository::{ArticleRepository, InMemoryArticleRepository};
pub use statistics::{AggregateRecomputer, AggregateReport};
