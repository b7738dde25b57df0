use anyhow::{Context, Result};
use clap::Parser;
use crypto_core::ExecutionMode;
use crypto_rag::{
    BatchEntry, BatchOutcome, ConversationSession, CryptoAssistant, LlmConfig, RagSettings,
    RetrieverConfig,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crypto market question answering
///
/// Answers one question, a batch of questions, or runs an interactive
/// session (the default) over market records and community discussions.
#[derive(Parser, Debug)]
#[command(name = "rag-cli", version, about, long_about = None)]
struct Cli {
    /// Answer a single question and exit
    #[arg(short, long, conflicts_with_all = ["batch", "batch_file", "interactive"])]
    query: Option<String>,

    /// Answer each of these questions in order (repeatable)
    #[arg(short, long, conflicts_with_all = ["batch_file", "interactive"])]
    batch: Vec<String>,

    /// File with one question per line
    #[arg(long, conflicts_with = "interactive")]
    batch_file: Option<PathBuf>,

    /// Interactive session (default when no question is given)
    #[arg(short, long)]
    interactive: bool,

    /// Print answers as JSON
    #[arg(long)]
    json: bool,

    /// Use the built-in fixture data, no external services
    #[arg(long)]
    mock: bool,

    /// Discussion posts per answer
    #[arg(short = 'k', long, default_value = "3")]
    top_k: usize,

    /// Qdrant vector database URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6334")]
    qdrant_url: String,

    /// Qdrant collection name
    #[arg(long, env = "RAG_COLLECTION", default_value = "crypto_discussions")]
    collection: String,

    /// LMDB directory holding market records
    #[arg(long, env = "RAG_LMDB_PATH", default_value = "data/market.lmdb")]
    lmdb_path: String,

    /// OpenAI API key (live mode only)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Chat model used to compose answers
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, PartialEq)]
enum RunMode {
    Query(String),
    Batch(Vec<String>),
    Interactive,
}

impl Cli {
    fn run_mode(&self) -> Result<RunMode> {
        if let Some(query) = &self.query {
            return Ok(RunMode::Query(query.clone()));
        }
        if let Some(path) = &self.batch_file {
            return Ok(RunMode::Batch(read_batch_file(path)?));
        }
        if !self.batch.is_empty() {
            return Ok(RunMode::Batch(self.batch.clone()));
        }
        Ok(RunMode::Interactive)
    }

    fn settings(&self) -> RagSettings {
        RagSettings {
            qdrant_url: self.qdrant_url.clone(),
            collection: self.collection.clone(),
            lmdb_path: self.lmdb_path.clone(),
            openai_api_key: self.openai_api_key.clone(),
            llm: LlmConfig {
                model: self.model.clone(),
                ..LlmConfig::default()
            },
            retriever: RetrieverConfig {
                top_k: self.top_k,
                ..RetrieverConfig::default()
            },
            mode: if self.mock {
                ExecutionMode::Mock
            } else {
                ExecutionMode::Live
            },
            ..RagSettings::default()
        }
    }
}

/// Non-blank lines, trimmed
fn read_batch_file(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn format_entry(index: usize, entry: &BatchEntry) -> String {
    match &entry.outcome {
        BatchOutcome::Answered { answer } => {
            format!("[{}] Q: {}\nA: {}\n", index + 1, entry.query, answer)
        }
        BatchOutcome::Failed { error } => {
            format!("[{}] Q: {}\nFAILED: {}\n", index + 1, entry.query, error)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Logs go to stderr, answers to stdout
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("rag_cli={},crypto_rag={},crypto_data_services={}",
                cli.log_level, cli.log_level, cli.log_level))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mode = cli.run_mode()?;
    let assistant = CryptoAssistant::from_settings(&cli.settings()).await?;
    tracing::info!("Assistant ready (mode={}), running {:?}", assistant.mode(), mode);

    let mut stdout = tokio::io::stdout();

    match mode {
        RunMode::Query(query) => {
            let reply = assistant.respond(&query, cli.top_k, &[]).await?;
            let text = if cli.json {
                serde_json::to_string_pretty(&reply)?
            } else {
                reply.answer
            };
            stdout.write_all(format!("{}\n", text).as_bytes()).await?;
        }
        RunMode::Batch(queries) => {
            let entries = assistant.batch(&queries).await;
            let text = if cli.json {
                format!("{}\n", serde_json::to_string_pretty(&entries)?)
            } else {
                entries
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| format_entry(i, entry))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            stdout.write_all(text.as_bytes()).await?;
        }
        RunMode::Interactive => {
            let mut session = ConversationSession::new();
            let stdin = BufReader::new(tokio::io::stdin());
            assistant
                .run_interactive(&mut session, stdin, &mut stdout)
                .await?;
        }
    }

    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_interactive() {
        let cli = Cli::try_parse_from(["rag-cli", "--mock"]).unwrap();
        assert_eq!(cli.run_mode().unwrap(), RunMode::Interactive);
        assert_eq!(cli.settings().mode, ExecutionMode::Mock);
    }

    #[test]
    fn test_single_query() {
        let cli = Cli::try_parse_from(["rag-cli", "-q", "Bitcoin price?", "-k", "5"]).unwrap();
        assert_eq!(cli.run_mode().unwrap(), RunMode::Query("Bitcoin price?".to_string()));
        assert_eq!(cli.settings().retriever.top_k, 5);
        assert_eq!(cli.settings().mode, ExecutionMode::Live);
    }

    #[test]
    fn test_repeated_batch() {
        let cli = Cli::try_parse_from(["rag-cli", "-b", "one", "-b", "two"]).unwrap();
        assert_eq!(
            cli.run_mode().unwrap(),
            RunMode::Batch(vec!["one".to_string(), "two".to_string()])
        );
    }

    #[test]
    fn test_conflicting_modes() {
        assert!(Cli::try_parse_from(["rag-cli", "-q", "x", "-b", "y"]).is_err());
        assert!(Cli::try_parse_from(["rag-cli", "-q", "x", "--interactive"]).is_err());
    }

    #[test]
    fn test_batch_file_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "What is Bitcoin?\n\n   \n  Solana news  ").unwrap();

        let queries = read_batch_file(file.path()).unwrap();
        assert_eq!(queries, vec!["What is Bitcoin?", "Solana news"]);
    }

    #[test]
    fn test_missing_batch_file() {
        assert!(read_batch_file(Path::new("/nonexistent/queries.txt")).is_err());
    }

    #[test]
    fn test_format_entry() {
        let answered = BatchEntry {
            query: "q".to_string(),
            outcome: BatchOutcome::Answered {
                answer: "a".to_string(),
            },
        };
        let failed = BatchEntry {
            query: "".to_string(),
            outcome: BatchOutcome::Failed {
                error: "Malformed input: query must not be empty".to_string(),
            },
        };
        assert_eq!(format_entry(0, &answered), "[1] Q: q\nA: a\n");
        assert!(format_entry(1, &failed).starts_with("[2] Q: \nFAILED: Malformed input"));
    }
}
