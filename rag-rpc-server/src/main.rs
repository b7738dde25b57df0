mod protocol;
mod server;
mod handler;
mod config;
mod error;

use anyhow::Result;
use clap::Parser;
use crypto_core::ExecutionMode;
use crypto_rag::{LlmConfig, RagSettings, RetrieverConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::ServerConfig;
use server::RpcServer;

#[derive(Parser)]
#[command(name = "rag-rpc-server")]
#[command(about = "JSON-RPC server answering crypto market questions")]
struct Cli {
    /// Server host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to bind to
    #[arg(long, default_value = "7879")]
    port: u16,

    /// Qdrant vector database URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6334")]
    qdrant_url: String,

    /// Qdrant collection name
    #[arg(long, env = "RAG_COLLECTION", default_value = "crypto_discussions")]
    collection_name: String,

    /// LMDB directory holding market records
    #[arg(long, env = "RAG_LMDB_PATH", default_value = "data/market.lmdb")]
    lmdb_path: String,

    /// OpenAI API key (live mode only)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Chat model used to compose answers
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Default number of discussion posts per answer
    #[arg(long, default_value = "3")]
    top_k: usize,

    /// Serve the built-in fixture data without external services
    #[arg(long)]
    mock: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("rag_rpc_server={},crypto_rag={},crypto_data_services={}",
                cli.log_level, cli.log_level, cli.log_level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mode = if cli.mock {
        ExecutionMode::Mock
    } else {
        ExecutionMode::Live
    };

    tracing::info!("🚀 RAG JSON-RPC Server Starting");
    tracing::info!("Configuration:");
    tracing::info!("  Host: {}", cli.host);
    tracing::info!("  Port: {}", cli.port);
    tracing::info!("  Mode: {}", mode);
    tracing::info!("  Qdrant URL: {}", cli.qdrant_url);
    tracing::info!("  Collection: {}", cli.collection_name);
    tracing::info!("  LMDB Path: {}", cli.lmdb_path);
    tracing::info!("  Model: {}", cli.model);
    tracing::info!("  Top K: {}", cli.top_k);

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        rag: RagSettings {
            qdrant_url: cli.qdrant_url,
            collection: cli.collection_name,
            lmdb_path: cli.lmdb_path,
            openai_api_key: cli.openai_api_key,
            llm: LlmConfig {
                model: cli.model,
                ..LlmConfig::default()
            },
            retriever: RetrieverConfig {
                top_k: cli.top_k,
                ..RetrieverConfig::default()
            },
            mode,
            ..RagSettings::default()
        },
    };

    let server = RpcServer::new(config).await?;
    server.run().await?;

    Ok(())
}
