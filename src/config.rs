use crate::search::SearchConfig;
use crate::sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming an optional override file
pub const CONFIG_PATH_ENV: &str = "WEBLOG_SEARCH_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Index and query configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Sync pipeline configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/local.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration, layering `config_path` over the embedded defaults
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (e.g. WEBLOG_SEARCH__SYNC__WORKERS)
            .add_source(
                config::Environment::with_prefix("WEBLOG_SEARCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let fail = |msg: String| Err(config::ConfigError::Message(msg));

        if crate::search::config::validate_index_name(&self.search.index_name).is_err() {
            return fail(format!(
                "search.index_name must be a single directory name, got {:?}",
                self.search.index_name
            ));
        }
        if self.search.max_page_size == 0 {
            return fail("search.max_page_size must be positive".to_string());
        }
        // Tantivy refuses writers with less than 15MB of heap per thread
        let min_heap = 15_000_000 * self.search.writer_threads.max(1);
        if self.search.writer_heap_size < min_heap {
            return fail(format!(
                "search.writer_heap_size must be at least {} bytes for {} writer thread(s)",
                min_heap, self.search.writer_threads
            ));
        }
        if self.sync.workers == 0 {
            return fail("sync.workers must be positive".to_string());
        }
        if self.sync.queue_capacity == 0 {
            return fail("sync.queue_capacity must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level, used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: default_true(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "weblog-search".to_string()
}

fn default_true() -> bool {
    true
}
