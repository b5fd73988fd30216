use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use weblog_search::{
    config::{Config, ObservabilityConfig, CONFIG_PATH_ENV},
    error::{AppError, Result},
    models::ArticleRecord,
    search::{IndexStore, QueryMode, SearchService},
    sync::{AggregateRecomputer, AggregateStrategy, ArticleEvent, InMemoryArticleRepository, SyncPipeline},
};

#[derive(Parser)]
#[command(name = "weblog-search")]
#[command(about = "Blog article search index tools", long_about = None, version)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = CONFIG_PATH_ENV, default_value = "config/local.toml")]
    config: String,

    /// Print Prometheus metrics after the command finishes
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from a JSON file of article records
    Rebuild {
        #[arg(short, long, value_name = "ARTICLES_JSON")]
        seed: PathBuf,
    },

    /// Apply a JSON list of article events to the index
    Apply {
        #[arg(short, long, value_name = "ARTICLES_JSON")]
        seed: PathBuf,

        #[arg(short, long, value_name = "EVENTS_JSON")]
        events: PathBuf,
    },

    /// Search the index and print the page as JSON
    Search {
        #[arg(value_name = "QUERY")]
        text: String,

        /// Comma-separated fields (default: title,summary)
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,

        #[arg(short, long, default_value = "1")]
        page: usize,

        #[arg(short = 's', long, default_value = "10")]
        size: usize,

        #[arg(long)]
        fuzzy: bool,

        #[arg(long, value_name = "N")]
        max_edits: Option<i64>,

        #[arg(short, long)]
        wildcard: bool,
    },

    /// Print category and tag totals computed from a seed file
    Stats {
        #[arg(value_name = "ARTICLES_JSON")]
        seed: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!(code = e.error_code(), error = %e, "Command failed");
        eprintln!("Error [{}]: {}", e.error_code(), e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from(&cli.config)?;
    config.validate()?;

    init_tracing(&config.observability);
    tracing::info!("weblog-search v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.prometheus_enabled {
        if let Err(e) = weblog_search::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    match cli.command {
        Commands::Rebuild { seed } => {
            let repository = Arc::new(load_repository(&seed)?);
            let store = Arc::new(IndexStore::new(config.search.clone())?);
            let pipeline = SyncPipeline::start(config.sync.clone(), store, repository.clone())?;

            let indexed = pipeline.reindex_all().await?;
            pipeline.shutdown().await;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "indexed": indexed,
                    "categories": repository.category_totals(),
                    "tags": repository.tag_totals(),
                }))?
            );
        }

        Commands::Apply { seed, events } => {
            let repository = Arc::new(load_repository(&seed)?);
            let events: Vec<ArticleEvent> = read_json(&events)?;
            let store = Arc::new(IndexStore::new(config.search.clone())?);
            let pipeline = SyncPipeline::start(config.sync.clone(), store, repository)?;

            let replayed = pipeline.replay_pending().await?;
            for event in &events {
                pipeline.publish(*event).await?;
            }
            pipeline.wait_idle().await;
            pipeline.shutdown().await;
            tracing::info!(replayed, applied = events.len(), "Events applied");
        }

        Commands::Search {
            text,
            fields,
            page,
            size,
            fuzzy,
            max_edits,
            wildcard,
        } => {
            let service = SearchService::new(config.search.clone())?;
            let mode = QueryMode::from_flags(fuzzy, max_edits, wildcard);
            let result = service
                .search(&config.search.index_name, &text, &fields, page, size, mode)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Stats { seed } => {
            let repository = Arc::new(load_repository(&seed)?);
            let recomputer =
                AggregateRecomputer::new(repository.clone(), AggregateStrategy::FullScan);
            recomputer.recompute_all().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "categories": repository.category_totals(),
                    "tags": repository.tag_totals(),
                }))?
            );
        }
    }

    if cli.print_metrics {
        print!("{}", weblog_search::metrics::gather_metrics());
    }
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("weblog_search={}", observability.log_level).into());

    // Logs go to stderr so command output on stdout stays machine-readable
    if observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_repository(path: &Path) -> Result<InMemoryArticleRepository> {
    let records: Vec<ArticleRecord> = read_json(path)?;
    tracing::info!(articles = records.len(), path = %path.display(), "Loaded seed articles");
    Ok(InMemoryArticleRepository::from_records(records))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::file(path, e))?;
    serde_json::from_str(&raw).map_err(|e| {
        AppError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })
}
