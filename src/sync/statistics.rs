//! Per-category and per-tag article totals
//!
//! `FullScan` recounts everything after each event. `Incremental` keeps a
//! ledger of each live article's links and turns link changes into +1/-1
//! deltas, writing only the ids that moved. Until the first reconciliation
//! the ledger is unknown, so the first incremental update reconciles instead.

use crate::metrics::AGGREGATE_CORRECTIONS_TOTAL;
use crate::models::ArticleLinks;
use crate::sync::config::AggregateStrategy;
use crate::sync::error::SyncResult;
use crate::sync::repository::ArticleRepository;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Totals written by one recomputation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub categories_written: usize,
    pub tags_written: usize,
}

impl AggregateReport {
    pub fn writes(&self) -> usize {
        self.categories_written + self.tags_written
    }
}

#[derive(Default)]
struct AggregateState {
    primed: bool,
    ledger: HashMap<i64, ArticleLinks>,
    categories: BTreeMap<i64, u64>,
    tags: BTreeMap<i64, u64>,
}

#[derive(Clone, Copy)]
enum Aggregate {
    Category,
    Tag,
}

impl Aggregate {
    fn label(self) -> &'static str {
        match self {
            Aggregate::Category => "category",
            Aggregate::Tag => "tag",
        }
    }
}

/// Keeps category and tag totals in step with article links
pub struct AggregateRecomputer {
    repository: Arc<dyn ArticleRepository>,
    strategy: AggregateStrategy,
    // Serializes every read-modify-write of the totals
    state: Mutex<AggregateState>,
    last_reconciled: RwLock<Option<DateTime<Utc>>>,
}

impl AggregateRecomputer {
    pub fn new(repository: Arc<dyn ArticleRepository>, strategy: AggregateStrategy) -> Self {
        Self {
            repository,
            strategy,
            state: Mutex::new(AggregateState::default()),
            last_reconciled: RwLock::new(None),
        }
    }

    pub fn strategy(&self) -> AggregateStrategy {
        self.strategy
    }

    pub fn last_reconciled(&self) -> Option<DateTime<Utc>> {
        *self.last_reconciled.read()
    }

    /// Bring totals up to date after `article_id` changed
    pub async fn article_changed(&self, article_id: i64) -> SyncResult<AggregateReport> {
        match self.strategy {
            AggregateStrategy::FullScan => self.recompute_all().await,
            AggregateStrategy::Incremental => self.apply_delta(article_id).await,
        }
    }

    /// Recount and write every total
    pub async fn recompute_all(&self) -> SyncResult<AggregateReport> {
        let mut state = self.state.lock().await;

        let categories = self.repository.count_articles_per_category().await?;
        for (category_id, total) in &categories {
            self.repository
                .set_category_article_total(*category_id, *total)
                .await?;
        }

        let tags = self.repository.count_articles_per_tag().await?;
        for (tag_id, total) in &tags {
            self.repository.set_tag_article_total(*tag_id, *total).await?;
        }

        let report = AggregateReport {
            categories_written: categories.len(),
            tags_written: tags.len(),
        };
        state.categories = categories;
        state.tags = tags;
        debug!(
            categories = report.categories_written,
            tags = report.tags_written,
            "Recomputed article totals"
        );
        Ok(report)
    }

    /// Recount from the repository, write only totals that drifted and
    /// rebuild the link ledger
    pub async fn reconcile(&self) -> SyncResult<AggregateReport> {
        let mut state = self.state.lock().await;
        self.reconcile_locked(&mut state).await
    }

    async fn reconcile_locked(&self, state: &mut AggregateState) -> SyncResult<AggregateReport> {
        let categories = self.repository.count_articles_per_category().await?;
        let tags = self.repository.count_articles_per_tag().await?;

        let mut report = AggregateReport::default();
        for (category_id, total) in &categories {
            if self
                .correct(state.primed, state.categories.get(category_id), *total, Aggregate::Category)
            {
                self.repository
                    .set_category_article_total(*category_id, *total)
                    .await?;
                report.categories_written += 1;
            }
        }
        for (tag_id, total) in &tags {
            if self.correct(state.primed, state.tags.get(tag_id), *total, Aggregate::Tag) {
                self.repository.set_tag_article_total(*tag_id, *total).await?;
                report.tags_written += 1;
            }
        }

        let mut ledger = HashMap::new();
        for article_id in self.repository.list_article_ids().await? {
            let links = self.repository.get_article_links(article_id).await?;
            if !links.is_empty() {
                ledger.insert(article_id, links);
            }
        }

        state.categories = categories;
        state.tags = tags;
        state.ledger = ledger;
        state.primed = true;
        *self.last_reconciled.write() = Some(Utc::now());

        info!(
            categories_corrected = report.categories_written,
            tags_corrected = report.tags_written,
            articles = state.ledger.len(),
            "Reconciled article totals"
        );
        Ok(report)
    }

    /// Whether a reconciled total must be written
    fn correct(&self, primed: bool, cached: Option<&u64>, total: u64, aggregate: Aggregate) -> bool {
        if !primed {
            return true;
        }
        if cached == Some(&total) {
            return false;
        }
        AGGREGATE_CORRECTIONS_TOTAL
            .with_label_values(&[aggregate.label()])
            .inc();
        true
    }

    async fn apply_delta(&self, article_id: i64) -> SyncResult<AggregateReport> {
        let mut state = self.state.lock().await;
        if !state.primed {
            return self.reconcile_locked(&mut state).await;
        }

        let current = self.current_links(article_id).await?;
        let previous = state.ledger.get(&article_id).cloned().unwrap_or_default();
        if current == previous {
            return Ok(AggregateReport::default());
        }

        let mut report = AggregateReport::default();
        report.categories_written += self
            .write_deltas(
                &mut state.categories,
                &previous.category_ids,
                &current.category_ids,
                Aggregate::Category,
            )
            .await?;
        report.tags_written += self
            .write_deltas(&mut state.tags, &previous.tag_ids, &current.tag_ids, Aggregate::Tag)
            .await?;

        if current.is_empty() {
            state.ledger.remove(&article_id);
        } else {
            state.ledger.insert(article_id, current);
        }

        debug!(
            article_id,
            categories = report.categories_written,
            tags = report.tags_written,
            "Applied article total deltas"
        );
        Ok(report)
    }

    /// Links counted for the article right now; empty unless the row is live
    async fn current_links(&self, article_id: i64) -> SyncResult<ArticleLinks> {
        match self.repository.get_article_by_id(article_id).await? {
            Some(article) if !article.is_deleted => {
                self.repository.get_article_links(article_id).await
            }
            _ => Ok(ArticleLinks::default()),
        }
    }

    async fn write_deltas(
        &self,
        totals: &mut BTreeMap<i64, u64>,
        previous: &BTreeSet<i64>,
        current: &BTreeSet<i64>,
        aggregate: Aggregate,
    ) -> SyncResult<usize> {
        let added = current.difference(previous).map(|id| (*id, true));
        let removed = previous.difference(current).map(|id| (*id, false));

        let mut written = 0;
        for (id, increment) in added.chain(removed) {
            let total = totals.entry(id).or_insert(0);
            *total = if increment {
                *total + 1
            } else {
                total.saturating_sub(1)
            };
            let value = *total;

            match aggregate {
                Aggregate::Category => self.repository.set_category_article_total(id, value).await?,
                Aggregate::Tag => self.repository.set_tag_article_total(id, value).await?,
            }
            written += 1;
        }
        Ok(written)
    }
}
