use crypto_core::ExecutionMode;
use crypto_rag::CryptoAssistant;
use std::sync::Arc;
use std::time::Instant;

use crate::error::RpcError;
use crate::protocol::*;

/// Handler for RAG queries. Holds no per-connection state.
pub struct RagQueryHandler {
    assistant: Arc<CryptoAssistant>,
}

impl RagQueryHandler {
    pub fn new(assistant: Arc<CryptoAssistant>) -> Self {
        Self { assistant }
    }

    /// Handle a rag.query request
    pub async fn handle_query(&self, params: RagQueryRequest) -> Result<RagQueryResponse, RpcError> {
        let query_start = Instant::now();
        let top_k = self.resolve_top_k(params.top_k)?;

        tracing::debug!("Handling RAG query: query={:?}, top_k={}", params.query, top_k);

        let reply = self.assistant.respond(&params.query, top_k, &[]).await?;

        let query_duration = query_start.elapsed().as_millis() as u64;

        tracing::info!(
            "RAG query completed: market={:?}, posts={}, duration={}ms",
            reply.market_symbol,
            reply.posts_used,
            query_duration
        );

        let mode = self.assistant.mode();
        let runtime = |value| (mode == ExecutionMode::Live).then_some(value);

        Ok(RagQueryResponse {
            query: params.query.trim().to_string(),
            answer: reply.answer,
            metadata: Metadata {
                query_duration_ms: runtime(query_duration),
                embedding_duration_ms: runtime(reply.metrics.embedding_latency_ms),
                retrieval_duration_ms: runtime(reply.metrics.retrieval_latency_ms),
                market_symbol: reply.market_symbol,
                posts_used: reply.posts_used,
                similarity_max: reply.metrics.similarity_max,
                embedding_cache_hit: (mode == ExecutionMode::Live)
                    .then_some(reply.metrics.embedding_cache_hit),
                mode: mode.to_string(),
            },
        })
    }

    /// Handle a rag.batch request
    pub async fn handle_batch(&self, params: RagBatchRequest) -> Result<RagBatchResponse, RpcError> {
        if params.queries.is_empty() {
            return Err(RpcError::InvalidParams("queries must not be empty".to_string()));
        }
        if params.queries.len() > MAX_BATCH_QUERIES {
            return Err(RpcError::InvalidParams(format!(
                "at most {} queries per batch, got {}",
                MAX_BATCH_QUERIES,
                params.queries.len()
            )));
        }
        let top_k = self.resolve_top_k(params.top_k)?;

        let entries = self.assistant.batch_with_top_k(&params.queries, top_k).await;
        let answered = entries.iter().filter(|e| e.is_answered()).count();

        tracing::info!(
            "RAG batch completed: {} answered, {} failed",
            answered,
            entries.len() - answered
        );

        Ok(RagBatchResponse {
            failed: entries.len() - answered,
            answered,
            entries,
        })
    }

    fn resolve_top_k(&self, requested: Option<usize>) -> Result<usize, RpcError> {
        let top_k = requested.unwrap_or_else(|| self.assistant.default_top_k());
        if top_k > MAX_TOP_K {
            return Err(RpcError::InvalidParams(format!(
                "top_k must be at most {}, got {}",
                MAX_TOP_K, top_k
            )));
        }
        Ok(top_k)
    }
}
