//! Sync pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How category and tag totals are kept current
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AggregateStrategy {
    /// Recount every category and tag after each event
    #[default]
    FullScan,
    /// Apply per-link deltas; rely on reconciliation as a backstop
    Incremental,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Number of worker shards
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Queue capacity per shard
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Handler attempts per event, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts; doubled after each failure
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// sled directory for the durable outbox; none keeps delivery in memory
    #[serde(default)]
    pub outbox_path: Option<PathBuf>,

    /// Seconds between aggregate reconciliations; 0 disables the task
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    #[serde(default)]
    pub aggregate_strategy: AggregateStrategy,
}

impl SyncConfig {
    /// Delay to wait after `attempt` (1-based) failed
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.retry_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            outbox_path: None,
            reconcile_interval_secs: default_reconcile_interval(),
            aggregate_strategy: AggregateStrategy::default(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_reconcile_interval() -> u64 {
    3_600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = SyncConfig {
            retry_backoff_ms: 100,
            max_backoff_ms: 350,
            ..Default::default()
        };
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(350));
    }

    #[test]
    fn test_strategy_from_str() {
        let config: SyncConfig = serde_json::from_str(r#"{"aggregate_strategy":"incremental"}"#).unwrap();
        assert_eq!(config.aggregate_strategy, AggregateStrategy::Incremental);
        assert_eq!(config.workers, 4);
    }
}
