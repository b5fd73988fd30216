//! Prometheus metrics for the search subsystem.
//!
//! All collectors live in a process-wide registry. Recording works whether or
//! not [`init_metrics`] ran; registration only makes them visible to
//! [`gather_metrics`].
//!
//! ```no_run
//! use weblog_search::metrics::SEARCH_REQUESTS_TOTAL;
//!
//! SEARCH_REQUESTS_TOTAL.with_label_values(&["standard", "ok"]).inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry};

const NAMESPACE: &str = "weblog_search";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Index Metrics
    // ============================================================================

    /// Index mutations (create, add, update, delete)
    ///
    /// Labels: operation, outcome
    pub static ref INDEX_OPERATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("index_operations_total", "Total number of index mutations")
            .namespace(NAMESPACE),
        &["operation", "outcome"]
    ).expect("Failed to create INDEX_OPERATIONS_TOTAL metric");

    /// Live documents per index after the last mutation
    ///
    /// Labels: index
    pub static ref INDEX_DOCUMENTS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("index_documents", "Number of live documents in an index")
            .namespace(NAMESPACE),
        &["index"]
    ).expect("Failed to create INDEX_DOCUMENTS metric");

    // ============================================================================
    // Query Metrics
    // ============================================================================

    /// Search requests by query mode
    ///
    /// Labels: mode, outcome
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_requests_total", "Total number of search requests")
            .namespace(NAMESPACE),
        &["mode", "outcome"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");

    /// Search latency in seconds
    ///
    /// Labels: mode
    pub static ref SEARCH_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("search_duration_seconds", "Search latency in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["mode"]
    ).expect("Failed to create SEARCH_DURATION_SECONDS metric");

    // ============================================================================
    // Synchronization Metrics
    // ============================================================================

    /// Article events handled by the sync pipeline
    ///
    /// Labels: event_type, outcome
    pub static ref SYNC_EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("sync_events_total", "Total number of article events processed")
            .namespace(NAMESPACE),
        &["event_type", "outcome"]
    ).expect("Failed to create SYNC_EVENTS_TOTAL metric");

    /// Event handling latency including retries
    ///
    /// Labels: event_type
    pub static ref SYNC_EVENT_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("sync_event_duration_seconds", "Event handling latency in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        &["event_type"]
    ).expect("Failed to create SYNC_EVENT_DURATION_SECONDS metric");

    /// Corrections applied by aggregate reconciliation
    ///
    /// Labels: kind (category, tag)
    pub static ref AGGREGATE_CORRECTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("aggregate_corrections_total", "Aggregate totals corrected by reconciliation")
            .namespace(NAMESPACE),
        &["kind"]
    ).expect("Failed to create AGGREGATE_CORRECTIONS_TOTAL metric");
}

/// Register all collectors with the global registry
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(INDEX_OPERATIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INDEX_DOCUMENTS.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_DURATION_SECONDS.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(SYNC_EVENTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SYNC_EVENT_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(AGGREGATE_CORRECTIONS_TOTAL.clone()))?;

    tracing::info!("Prometheus metrics registered");
    Ok(())
}

/// Render the registry in the Prometheus text exposition format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
