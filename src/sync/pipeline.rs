//! Event-driven index synchronization
//!
//! Events are routed to `workers` shards by `article_id mod workers`. Each
//! shard is one task draining a FIFO queue, so events for the same article are
//! handled in publish order while different articles proceed in parallel.

use crate::metrics::{SYNC_EVENTS_TOTAL, SYNC_EVENT_DURATION_SECONDS};
use crate::search::{ArticleDocument, IndexStore, MatchTerm};
use crate::sync::config::SyncConfig;
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::events::{ArticleEvent, EventEnvelope};
use crate::sync::outbox::EventOutbox;
use crate::sync::repository::ArticleRepository;
use crate::sync::statistics::{AggregateRecomputer, AggregateReport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Anything that accepts article events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: ArticleEvent) -> SyncResult<()>;
}

/// Applies one event to the index and the aggregates
pub struct EventHandler {
    store: Arc<IndexStore>,
    repository: Arc<dyn ArticleRepository>,
    aggregates: Arc<AggregateRecomputer>,
    index_name: String,
}

impl EventHandler {
    pub fn new(
        store: Arc<IndexStore>,
        repository: Arc<dyn ArticleRepository>,
        aggregates: Arc<AggregateRecomputer>,
    ) -> Self {
        let index_name = store.config().index_name.clone();
        Self {
            store,
            repository,
            aggregates,
            index_name,
        }
    }

    pub async fn handle(&self, event: &ArticleEvent) -> SyncResult<()> {
        let article_id = event.article_id();
        match event {
            ArticleEvent::Published { .. } | ArticleEvent::Updated { .. } => {
                self.sync_article(article_id).await?
            }
            ArticleEvent::Deleted { .. } => self.remove_article(article_id).await?,
        }
        self.aggregates.article_changed(article_id).await?;
        Ok(())
    }

    /// Write the current row to the index, or remove it when the row is gone
    async fn sync_article(&self, article_id: i64) -> SyncResult<()> {
        let article = match self.repository.get_article_by_id(article_id).await? {
            Some(article) if !article.is_deleted => article,
            _ => {
                debug!(article_id, "Article missing or deleted, removing from index");
                return self.remove_article(article_id).await;
            }
        };
        let content = self
            .repository
            .get_article_content_by_article_id(article_id)
            .await?;

        let document = ArticleDocument::from_article(&article, content.as_ref());
        // Replace by id so a redelivered Published does not duplicate
        self.store
            .update_document(&self.index_name, &document, &MatchTerm::id(article_id))
            .await?;
        debug!(article_id, "Article indexed");
        Ok(())
    }

    async fn remove_article(&self, article_id: i64) -> SyncResult<()> {
        let removed = self
            .store
            .delete_document(&self.index_name, &MatchTerm::id(article_id))
            .await?;
        debug!(article_id, removed, "Article removed from index");
        Ok(())
    }
}

/// Counts dispatched events that have not finished
#[derive(Default)]
struct InFlight {
    pending: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn begin(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn wait(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Keeps the search index and article totals consistent with the repository
pub struct SyncPipeline {
    config: SyncConfig,
    store: Arc<IndexStore>,
    repository: Arc<dyn ArticleRepository>,
    aggregates: Arc<AggregateRecomputer>,
    outbox: Option<EventOutbox>,
    shards: Mutex<Vec<mpsc::Sender<EventEnvelope>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
    in_flight: Arc<InFlight>,
}

impl SyncPipeline {
    /// Start the shard workers and, if configured, the reconciliation task.
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: SyncConfig,
        store: Arc<IndexStore>,
        repository: Arc<dyn ArticleRepository>,
    ) -> SyncResult<Self> {
        if config.workers == 0 || config.queue_capacity == 0 {
            return Err(SyncError::InvalidConfiguration(
                "workers and queue_capacity must be positive".to_string(),
            ));
        }

        let outbox = config
            .outbox_path
            .as_ref()
            .map(EventOutbox::open)
            .transpose()?;
        let aggregates = Arc::new(AggregateRecomputer::new(
            repository.clone(),
            config.aggregate_strategy,
        ));
        let handler = Arc::new(EventHandler::new(
            store.clone(),
            repository.clone(),
            aggregates.clone(),
        ));
        let in_flight = Arc::new(InFlight::default());

        let mut shards = Vec::with_capacity(config.workers);
        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let (tx, rx) = mpsc::channel(config.queue_capacity);
            shards.push(tx);
            workers.push(spawn_worker(
                worker_id,
                rx,
                handler.clone(),
                outbox.clone(),
                in_flight.clone(),
                config.clone(),
            ));
        }

        let reconciler = (config.reconcile_interval_secs > 0).then(|| {
            spawn_reconciler(
                aggregates.clone(),
                Duration::from_secs(config.reconcile_interval_secs),
            )
        });

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            durable = outbox.is_some(),
            aggregate_strategy = %config.aggregate_strategy,
            "Sync pipeline started"
        );

        Ok(Self {
            config,
            store,
            repository,
            aggregates,
            outbox,
            shards: Mutex::new(shards),
            workers: Mutex::new(workers),
            reconciler: Mutex::new(reconciler),
            in_flight,
        })
    }

    pub fn aggregates(&self) -> &Arc<AggregateRecomputer> {
        &self.aggregates
    }

    pub fn outbox(&self) -> Option<&EventOutbox> {
        self.outbox.as_ref()
    }

    /// Accept an event; returns once it is queued, not once it is handled
    pub async fn publish(&self, event: ArticleEvent) -> SyncResult<()> {
        let envelope = match &self.outbox {
            Some(outbox) => outbox.append(event)?,
            None => EventEnvelope::new(event, 0),
        };
        self.dispatch(envelope).await
    }

    /// Re-dispatch events left in the outbox by a previous run
    pub async fn replay_pending(&self) -> SyncResult<usize> {
        let Some(outbox) = &self.outbox else {
            return Ok(0);
        };

        let pending = outbox.pending()?;
        let count = pending.len();
        for envelope in pending {
            self.dispatch(envelope).await?;
        }
        if count > 0 {
            info!(replayed = count, "Replayed pending article events");
        }
        Ok(count)
    }

    /// Resolve once every dispatched event has been handled
    pub async fn wait_idle(&self) {
        self.in_flight.wait().await;
    }

    /// Rebuild the index from every live article, then reconcile totals
    pub async fn reindex_all(&self) -> SyncResult<u64> {
        let mut documents = Vec::new();
        for article_id in self.repository.list_article_ids().await? {
            let Some(article) = self.repository.get_article_by_id(article_id).await? else {
                continue;
            };
            if article.is_deleted {
                continue;
            }
            let content = self
                .repository
                .get_article_content_by_article_id(article_id)
                .await?;
            documents.push(ArticleDocument::from_article(&article, content.as_ref()));
        }

        let index_name = &self.store.config().index_name;
        let indexed = self.store.create_index(index_name, &documents).await?;
        self.aggregates.reconcile().await?;

        info!(index = %index_name, documents = indexed, "Search index initialized");
        Ok(indexed)
    }

    /// Run a reconciliation now
    pub async fn recompute_statistics(&self) -> SyncResult<AggregateReport> {
        self.aggregates.reconcile().await
    }

    /// Stop accepting events, drain the queues and join the workers
    pub async fn shutdown(&self) {
        if let Some(reconciler) = self.reconciler.lock().take() {
            reconciler.abort();
        }

        // Dropping the senders ends each worker loop after its queue drains
        self.shards.lock().clear();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                error!(error = %e, "Sync worker terminated abnormally");
            }
        }

        if let Some(outbox) = &self.outbox {
            if let Err(e) = outbox.flush() {
                warn!(error = %e, "Failed to flush event outbox");
            }
        }
        info!("Sync pipeline stopped");
    }

    async fn dispatch(&self, envelope: EventEnvelope) -> SyncResult<()> {
        let shard = shard_for(envelope.event.article_id(), self.config.workers);
        let sender = self
            .shards
            .lock()
            .get(shard)
            .cloned()
            .ok_or(SyncError::ChannelClosed(shard))?;

        self.in_flight.begin();
        if sender.send(envelope).await.is_err() {
            self.in_flight.end();
            return Err(SyncError::ChannelClosed(shard));
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for SyncPipeline {
    async fn publish(&self, event: ArticleEvent) -> SyncResult<()> {
        SyncPipeline::publish(self, event).await
    }
}

/// Shard owning `article_id`
pub fn shard_for(article_id: i64, workers: usize) -> usize {
    article_id.rem_euclid(workers.max(1) as i64) as usize
}

fn spawn_worker(
    worker_id: usize,
    mut rx: mpsc::Receiver<EventEnvelope>,
    handler: Arc<EventHandler>,
    outbox: Option<EventOutbox>,
    in_flight: Arc<InFlight>,
    config: SyncConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(worker_id, "Sync worker started");

        while let Some(envelope) = rx.recv().await {
            let event = envelope.event;
            let event_type = event.event_type();
            let start_time = Instant::now();

            let handled = handle_with_retry(worker_id, &handler, &envelope, &config).await;
            SYNC_EVENT_DURATION_SECONDS
                .with_label_values(&[event_type])
                .observe(start_time.elapsed().as_secs_f64());

            match handled {
                Ok(()) => {
                    SYNC_EVENTS_TOTAL.with_label_values(&[event_type, "ok"]).inc();
                    if let (Some(outbox), true) = (&outbox, envelope.is_durable()) {
                        if let Err(e) = outbox.ack(envelope.sequence) {
                            warn!(
                                worker_id,
                                sequence = envelope.sequence,
                                error = %e,
                                "Failed to acknowledge article event"
                            );
                        }
                    }
                }
                Err(e) => {
                    SYNC_EVENTS_TOTAL.with_label_values(&[event_type, "failed"]).inc();
                    error!(
                        worker_id,
                        event_id = %envelope.event_id,
                        event_type,
                        article_id = event.article_id(),
                        retained = envelope.is_durable(),
                        error = %e,
                        "Giving up on article event"
                    );
                }
            }
            in_flight.end();
        }

        info!(worker_id, "Sync worker stopped");
    })
}

async fn handle_with_retry(
    worker_id: usize,
    handler: &EventHandler,
    envelope: &EventEnvelope,
    config: &SyncConfig,
) -> SyncResult<()> {
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match handler.handle(&envelope.event).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts && e.is_retryable() => {
                let delay = config.backoff(attempt);
                warn!(
                    worker_id,
                    article_id = envelope.event.article_id(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying article event"
                );
                SYNC_EVENTS_TOTAL
                    .with_label_values(&[envelope.event.event_type(), "retry"])
                    .inc();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn spawn_reconciler(aggregates: Arc<AggregateRecomputer>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if let Err(e) = aggregates.reconcile().await {
                warn!(error = %e, "Scheduled reconciliation failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_is_stable_and_in_range() {
        assert_eq!(shard_for(10, 4), 2);
        assert_eq!(shard_for(10, 4), shard_for(14, 4));
        assert_eq!(shard_for(-3, 4), 1);
        assert_eq!(shard_for(7, 0), 0);
    }
}
