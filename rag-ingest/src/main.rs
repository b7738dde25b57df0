use anyhow::{bail, Context, Result};
use clap::Parser;
use crypto_data_services::{
    fixtures, Dataset, FastEmbedEmbedder, IngestionPipeline, LmdbMarketStore, QdrantPostStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

/// RAG Market Data Ingestion CLI
///
/// Loads market records and discussion posts, stores the records in LMDB,
/// embeds the posts and uploads them to Qdrant for retrieval.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON dataset with `market_records` and `posts` arrays
    #[arg(short, long, conflicts_with = "fixtures")]
    dataset: Option<PathBuf>,

    /// Ingest the built-in fixture dataset
    #[arg(long)]
    fixtures: bool,

    /// LMDB directory for market records
    #[arg(long, env = "RAG_LMDB_PATH", default_value = "data/market.lmdb")]
    lmdb_path: PathBuf,

    /// Qdrant URL
    #[arg(short = 'q', long, env = "QDRANT_URL", default_value = "http://localhost:6334")]
    qdrant_url: String,

    /// Qdrant collection name
    #[arg(short = 'c', long, env = "RAG_COLLECTION", default_value = "crypto_discussions")]
    collection: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn load_dataset(&self) -> Result<Dataset> {
        match (&self.dataset, self.fixtures) {
            (Some(path), _) => Dataset::load(path),
            (None, true) => Ok(fixtures::dataset()),
            (None, false) => bail!("either --dataset <PATH> or --fixtures is required"),
        }
    }

    /// Parse log level from string
    fn parse_log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(args.parse_log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("🚀 RAG Market Data Ingestion Tool");
    info!("==================================");

    let dataset = args.load_dataset()?;

    info!("Configuration:");
    info!("  Market records: {}", dataset.market_records.len());
    info!("  Posts: {}", dataset.posts.len());
    info!("  LMDB path: {}", args.lmdb_path.display());
    info!("  Qdrant URL: {}", args.qdrant_url);
    info!("  Collection: {}", args.collection);
    info!("");

    info!("Initializing ingestion pipeline...");
    let market_store = LmdbMarketStore::open(&args.lmdb_path)
        .with_context(|| format!("Failed to open {}", args.lmdb_path.display()))?;
    let post_store = QdrantPostStore::new(&args.qdrant_url, args.collection.clone())?;
    let embedder = FastEmbedEmbedder::new()?;

    let pipeline = IngestionPipeline::new(
        Arc::new(market_store),
        Arc::new(post_store),
        Arc::new(embedder),
    )
    .await?;

    info!("Pipeline initialized successfully");
    info!("");

    let stats = pipeline.run(&dataset).await?;

    info!("");
    info!("✅ Ingestion Complete!");
    info!("=====================");
    info!(
        "  Market records: {} inserted, {} refreshed, {} stale, {} invalid",
        stats.records_inserted, stats.records_refreshed, stats.records_stale, stats.records_invalid
    );
    info!(
        "  Posts: {} embeddings, {} points uploaded, {} skipped",
        stats.embeddings_generated, stats.points_uploaded, stats.posts_skipped
    );

    Ok(())
}
