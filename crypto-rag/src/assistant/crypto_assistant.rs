use anyhow::{anyhow, Context, Result};
use crypto_core::{ConversationTurn, ExecutionMode, RagError, Role};
use crypto_data_services::{FastEmbedEmbedder, LmdbMarketStore, QdrantPostStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::session::ConversationSession;
use crate::config::RagSettings;
use crate::llm::{Composer, LlmClient, RetrievalMetrics, Retriever};

const HELP_TEXT: &str = "Commands:\n  \
help   show this message\n  \
reset  forget the conversation so far\n  \
exit   leave (also: quit)\n\
Anything else is answered as a question about the crypto market.\n";

/// Answer to one question, with what the answer was built from
#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub answer: String,
    /// Symbol of the market record used, if any
    pub market_symbol: Option<String>,
    pub posts_used: usize,
    /// Timings and cache flag are zeroed in mock mode
    pub metrics: RetrievalMetrics,
}

/// Result of one query in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub query: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Answered { answer: String },
    Failed { error: String },
}

impl BatchEntry {
    pub fn is_answered(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Answered { .. })
    }
}

/// Question answering over market records and community discussions
///
/// Each query is:
/// 1. Matched against tracked assets and looked up in the market store
/// 2. Embedded and searched against discussion posts
/// 3. Composed into an answer by the hosted model or the canned rules
///
/// Queries run one at a time: a query is fully answered before the next starts.
pub struct CryptoAssistant {
    retriever: Arc<Retriever>,
    composer: Composer,
}

impl CryptoAssistant {
    pub fn new(retriever: Arc<Retriever>, composer: Composer) -> Self {
        tracing::info!(
            "Initializing crypto assistant: retriever_mode={}, composer_mode={}, top_k={}",
            retriever.mode(),
            composer.mode(),
            retriever.config().top_k
        );

        Self {
            retriever,
            composer,
        }
    }

    /// Fixture-backed assistant. Deterministic and network-free.
    pub fn mock(settings: &RagSettings) -> Result<Self, RagError> {
        let retriever = Retriever::mock(settings.retriever.clone())?;
        let composer = Composer::mock(settings.composer.clone());
        Ok(Self::new(Arc::new(retriever), composer))
    }

    /// Build from settings, connecting to LMDB, Qdrant and OpenAI in live mode
    pub async fn from_settings(settings: &RagSettings) -> Result<Self> {
        if settings.mode.is_mock() {
            return Ok(Self::mock(settings)?);
        }

        let api_key = settings
            .openai_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is required in live mode"))?;

        let market_store = LmdbMarketStore::open(&settings.lmdb_path)
            .with_context(|| format!("Failed to open market store at {}", settings.lmdb_path))?;
        let post_store = QdrantPostStore::new(&settings.qdrant_url, settings.collection.clone())
            .with_context(|| format!("Failed to connect to Qdrant at {}", settings.qdrant_url))?;
        let embedder = FastEmbedEmbedder::new().context("Failed to initialize embedder")?;
        let llm = LlmClient::new(settings.llm.clone(), api_key)?;

        let retriever = Retriever::new(
            Arc::new(market_store),
            Arc::new(post_store),
            Arc::new(embedder),
            settings.retriever.clone(),
        );
        let composer = Composer::live(settings.composer.clone(), Arc::new(llm));

        Ok(Self::new(Arc::new(retriever), composer))
    }

    pub fn mode(&self) -> ExecutionMode {
        self.composer.mode()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn default_top_k(&self) -> usize {
        self.retriever.config().top_k
    }

    /// Answer a single question with no conversation context
    pub async fn query(&self, text: &str) -> Result<String, RagError> {
        self.respond(text, self.default_top_k(), &[])
            .await
            .map(|reply| reply.answer)
    }

    /// Retrieve evidence for `text` and compose an answer
    pub async fn respond(
        &self,
        text: &str,
        k: usize,
        history: &[ConversationTurn],
    ) -> Result<AssistantReply, RagError> {
        let (result, mut metrics) = self.retriever.retrieve_with_metrics(text, k).await?;
        let answer = self.composer.compose(&result, history).await;

        // Mock replies are byte-for-byte reproducible
        if self.mode() == ExecutionMode::Mock {
            metrics.clear_runtime();
        }

        tracing::info!(
            "Answered query={:?}: market={:?}, posts={}, {} chars",
            result.query,
            result.market.as_ref().map(|m| m.symbol.as_str()),
            result.posts.len(),
            answer.chars().count()
        );

        Ok(AssistantReply {
            answer,
            market_symbol: result.market.map(|m| m.symbol),
            posts_used: result.posts.len(),
            metrics,
        })
    }

    /// Answer each query in order. Failures are recorded, not propagated.
    pub async fn batch(&self, queries: &[String]) -> Vec<BatchEntry> {
        self.batch_with_top_k(queries, self.default_top_k()).await
    }

    pub async fn batch_with_top_k(&self, queries: &[String], k: usize) -> Vec<BatchEntry> {
        let mut entries = Vec::with_capacity(queries.len());

        for (i, query) in queries.iter().enumerate() {
            tracing::info!("Batch query {}/{}: {:?}", i + 1, queries.len(), query);
            let outcome = match self.respond(query, k, &[]).await {
                Ok(reply) => BatchOutcome::Answered {
                    answer: reply.answer,
                },
                Err(e) => {
                    tracing::error!("Skipping batch query {:?}: {}", query, e);
                    BatchOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            entries.push(BatchEntry {
                query: query.clone(),
                outcome,
            });
        }

        entries
    }

    /// Read questions line by line until `exit`, `quit` or end of input
    pub async fn run_interactive<R, W>(
        &self,
        session: &mut ConversationSession,
        input: R,
        mut output: W,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        output
            .write_all(b"Crypto Insight assistant. Type 'help' for commands.\n")
            .await?;
        output.flush().await?;

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let text = line.trim();
            match text.to_lowercase().as_str() {
                "" => continue,
                "exit" | "quit" => break,
                "help" => {
                    output.write_all(HELP_TEXT.as_bytes()).await?;
                }
                "reset" => {
                    session.reset();
                    output.write_all(b"Conversation cleared.\n").await?;
                }
                _ => match self.respond(text, self.default_top_k(), session.history()).await {
                    Ok(reply) => {
                        output
                            .write_all(format!("Assistant: {}\n\n", reply.answer).as_bytes())
                            .await?;
                        session.append_turn(Role::User, text)?;
                        session.append_turn(Role::Assistant, reply.answer)?;
                    }
                    Err(e) => {
                        tracing::error!("Failed to answer {:?}: {}", text, e);
                        output
                            .write_all(format!("Assistant: failed to answer: {}\n\n", e).as_bytes())
                            .await?;
                    }
                },
            }
            output.flush().await?;
        }

        tracing::info!("Interactive session ended after {} turns", session.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_entry_serialization() {
        let answered = BatchEntry {
            query: "q1".to_string(),
            outcome: BatchOutcome::Answered {
                answer: "a".to_string(),
            },
        };
        let failed = BatchEntry {
            query: "q2".to_string(),
            outcome: BatchOutcome::Failed {
                error: "boom".to_string(),
            },
        };

        assert_eq!(
            serde_json::to_value(&answered).unwrap(),
            serde_json::json!({"query": "q1", "status": "answered", "answer": "a"})
        );
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"query": "q2", "status": "failed", "error": "boom"})
        );
        assert!(answered.is_answered());
        assert!(!failed.is_answered());
    }

    #[tokio::test]
    async fn test_mock_query_mentions_bitcoin() {
        let assistant = CryptoAssistant::mock(&RagSettings::mock()).unwrap();
        let answer = assistant
            .query("What's the current price of Bitcoin?")
            .await
            .unwrap();
        assert!(answer.contains("Bitcoin"));
        assert!(answer.contains("$65,000.25"));
        assert_eq!(assistant.mode(), ExecutionMode::Mock);
    }
}
