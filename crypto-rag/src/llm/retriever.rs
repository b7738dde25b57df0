use crypto_core::{
    rank_posts, AssetKey, ExecutionMode, MarketRecord, RagError, RetrievalResult, ScoredPost,
    UpstreamStage,
};
use crypto_data_services::{fixtures, Embedder, HashingEmbedder, MarketStore, PostStore};
use moka::future::Cache;
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use super::lineage::LineageTrail;
use super::metrics::{MetricsTimer, RetrievalMetrics};

/// Extra candidates fetched beyond `k` for small k
const MIN_EXTRA_CANDIDATES: usize = 10;

/// Configuration for the retriever
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Posts returned when the caller does not ask for a specific k
    pub top_k: usize,
    /// Candidates must score strictly above this to be kept
    pub min_similarity: f32,
    /// Query embeddings kept in memory
    pub embedding_cache_capacity: u64,
    /// Candidates requested from the post store per wanted post
    pub candidate_factor: usize,
    /// Upper bound on candidates requested while widening past similarity ties
    pub max_candidates: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_similarity: 0.0,
            embedding_cache_capacity: 256,
            candidate_factor: 4,
            max_candidates: 1000,
        }
    }
}

/// Finds the market record and the discussion posts relevant to a question
pub struct Retriever {
    market_store: Arc<dyn MarketStore>,
    post_store: Arc<dyn PostStore>,
    embedder: Arc<dyn Embedder>,
    embedding_cache: Cache<String, Arc<Vec<f32>>>,
    config: RetrieverConfig,
    mode: ExecutionMode,
}

#[derive(Default)]
struct PostSearch {
    posts: Vec<ScoredPost>,
    candidates: usize,
    filtered_out: usize,
    cache_hit: bool,
    embedding_latency: Duration,
    search_latency: Duration,
}

impl Retriever {
    /// Create a retriever over live (or caller-supplied) stores
    pub fn new(
        market_store: Arc<dyn MarketStore>,
        post_store: Arc<dyn PostStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrieverConfig,
    ) -> Self {
        tracing::info!(
            "Initializing retriever: embedder={} ({} dims), top_k={}, min_similarity={}",
            embedder.model_name(),
            embedder.dimension(),
            config.top_k,
            config.min_similarity
        );

        Self {
            market_store,
            post_store,
            embedder,
            embedding_cache: Cache::new(config.embedding_cache_capacity),
            config,
            mode: ExecutionMode::Live,
        }
    }

    /// Retriever over the built-in fixture set. No network access.
    pub fn mock(config: RetrieverConfig) -> Result<Self, RagError> {
        let embedder = HashingEmbedder::default();
        let (market, posts) = fixtures::mock_stores(&embedder)?;

        let mut retriever = Self::new(Arc::new(market), Arc::new(posts), Arc::new(embedder), config);
        retriever.mode = ExecutionMode::Mock;
        Ok(retriever)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Retrieve evidence for `query`, at most `k` posts
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RagError> {
        self.retrieve_with_metrics(query, k)
            .await
            .map(|(result, _)| result)
    }

    /// Like [`Retriever::retrieve`], also returning timings and similarity stats
    pub async fn retrieve_with_metrics(
        &self,
        query: &str,
        k: usize,
    ) -> Result<(RetrievalResult, RetrievalMetrics), RagError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::MalformedInput(
                "query must not be empty".to_string(),
            ));
        }

        tracing::debug!("Retrieving for query={:?}, k={}, mode={}", query, k, self.mode);

        let total_timer = MetricsTimer::start();

        // Structured lookup and embed-and-search are independent
        let (market, search) = tokio::join!(self.lookup_market(query), self.search_posts(query, k));
        let (market, lookup_latency) = market?;
        let search = search?;

        let mut metrics = RetrievalMetrics::new();
        metrics.set_lookup_latency(lookup_latency);
        metrics.set_embedding_latency(search.embedding_latency);
        metrics.set_search_latency(search.search_latency);
        metrics.embedding_cache_hit = search.cache_hit;
        metrics.market_hit = market.is_some();
        metrics.candidates = search.candidates;
        metrics.filtered_out = search.filtered_out;
        metrics.set_similarity_scores(search.posts.iter().map(|p| p.similarity).collect());

        let mut lineage = LineageTrail::new();
        lineage.record(
            "market_lookup",
            "market_records",
            market
                .as_ref()
                .map(|m| m.symbol.clone())
                .unwrap_or_else(|| "none".to_string()),
            usize::from(market.is_some()),
        );
        lineage.record("vector_search", "discussion_posts", "retrieval_result", search.posts.len());
        metrics.lineage = lineage;

        metrics.set_retrieval_latency(total_timer.stop());
        metrics.report();

        let result = RetrievalResult {
            query: query.to_string(),
            market,
            posts: search.posts,
        };

        Ok((result, metrics))
    }

    async fn lookup_market(
        &self,
        query: &str,
    ) -> Result<(Option<MarketRecord>, Duration), RagError> {
        let timer = MetricsTimer::start();

        let keys = self
            .market_store
            .asset_keys()
            .await
            .map_err(|e| RagError::upstream(UpstreamStage::AssetCatalogue, e))?;

        let record = match extract_asset(query, &keys) {
            Some(key) => {
                tracing::debug!("Query mentions {} ({})", key.name, key.symbol);
                self.market_store
                    .lookup_by_symbol_or_name(&key.symbol)
                    .await
                    .map_err(|e| RagError::upstream(UpstreamStage::MarketLookup, e))?
            }
            None => {
                tracing::debug!("No tracked asset mentioned in query");
                None
            }
        };

        Ok((record, timer.stop()))
    }

    async fn search_posts(&self, query: &str, k: usize) -> Result<PostSearch, RagError> {
        if k == 0 {
            return Ok(PostSearch::default());
        }

        let embed_timer = MetricsTimer::start();
        let (vector, cache_hit) = self.embed_query(query).await?;
        let embedding_latency = embed_timer.stop();

        let search_timer = MetricsTimer::start();
        let candidates = self.fetch_candidates(&vector, k).await?;
        let search_latency = search_timer.stop();

        let candidate_count = candidates.len();
        let mut posts: Vec<ScoredPost> = candidates
            .into_iter()
            .filter(|p| p.similarity.is_finite() && p.similarity > self.config.min_similarity)
            .collect();
        let filtered_out = candidate_count - posts.len();
        rank_posts(&mut posts, k);

        tracing::debug!(
            "Vector search: {} candidates, {} below similarity floor {}, {} kept",
            candidate_count,
            filtered_out,
            self.config.min_similarity,
            posts.len()
        );

        Ok(PostSearch {
            posts,
            candidates: candidate_count,
            filtered_out,
            cache_hit,
            embedding_latency,
            search_latency,
        })
    }

    /// Over-fetch so the store's similarity-only cut never decides between
    /// posts that tie on similarity at position k. Widens while the pool is
    /// full and still tied at its tail.
    async fn fetch_candidates(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPost>, RagError> {
        let max = self.config.max_candidates.max(k);
        let mut limit = k
            .saturating_mul(self.config.candidate_factor.max(1))
            .max(k.saturating_add(MIN_EXTRA_CANDIDATES))
            .min(max);

        loop {
            let candidates = self
                .post_store
                .nearest_neighbors(vector, limit)
                .await
                .map_err(|e| RagError::upstream(UpstreamStage::VectorSearch, e))?;

            if candidates.len() < limit || limit >= max || !tied_at_tail(&candidates, k) {
                return Ok(candidates);
            }

            tracing::debug!("Similarity tie spans all {} candidates, widening search", limit);
            limit = limit.saturating_mul(2).min(max);
        }
    }

    async fn embed_query(&self, query: &str) -> Result<(Arc<Vec<f32>>, bool), RagError> {
        if let Some(cached) = self.embedding_cache.get(query).await {
            return Ok((cached, true));
        }

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| RagError::upstream(UpstreamStage::Embedding, e))?;

        if vector.len() != self.embedder.dimension() {
            return Err(RagError::upstream(
                UpstreamStage::Embedding,
                format!(
                    "expected {} dimensions, got {}",
                    self.embedder.dimension(),
                    vector.len()
                ),
            ));
        }

        let vector = Arc::new(vector);
        self.embedding_cache
            .insert(query.to_string(), Arc::clone(&vector))
            .await;
        Ok((vector, false))
    }
}

/// Whether the k-th best similarity equals the worst one in the pool
fn tied_at_tail(candidates: &[ScoredPost], k: usize) -> bool {
    let mut similarities: Vec<f32> = candidates.iter().map(|p| p.similarity).collect();
    similarities.sort_by(|a, b| b.total_cmp(a));

    match (k.checked_sub(1).and_then(|i| similarities.get(i)), similarities.last()) {
        (Some(kth), Some(last)) => kth == last,
        _ => false,
    }
}

/// Pick the tracked asset the query is about.
///
/// Names match as case-insensitive substrings, symbols only as whole tokens.
/// Earliest match wins; ties go to the longer match, then the smaller symbol.
pub fn extract_asset(query: &str, keys: &[AssetKey]) -> Option<AssetKey> {
    let lowered = query.to_lowercase();
    let tokens = token_spans(&lowered);

    let mut candidates: Vec<(usize, Reverse<usize>, &AssetKey)> = Vec::new();

    for key in keys {
        let name = key.name.trim().to_lowercase();
        if !name.is_empty() {
            if let Some(pos) = lowered.find(&name) {
                candidates.push((pos, Reverse(name.len()), key));
            }
        }

        let symbol = key.symbol.trim().to_lowercase();
        if !symbol.is_empty() {
            if let Some((pos, _)) = tokens.iter().find(|(_, token)| *token == symbol) {
                candidates.push((*pos, Reverse(symbol.len()), key));
            }
        }
    }

    candidates
        .into_iter()
        .min_by(|a, b| (a.0, a.1, a.2.symbol.as_str()).cmp(&(b.0, b.1, b.2.symbol.as_str())))
        .map(|(_, _, key)| key.clone())
}

/// Byte offset and text of each alphanumeric run
fn token_spans(text: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            spans.push((s, &text[s..i]));
        }
    }
    if let Some(s) = start {
        spans.push((s, &text[s..]));
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<AssetKey> {
        fixtures::market_records()
            .iter()
            .map(|r| r.asset_key())
            .collect()
    }

    fn symbol_of(query: &str) -> Option<String> {
        extract_asset(query, &keys()).map(|k| k.symbol)
    }

    #[test]
    fn test_extract_by_name() {
        assert_eq!(symbol_of("What's the current price of Bitcoin?"), Some("BTC".to_string()));
        assert_eq!(symbol_of("tell me about POLYGON"), Some("MATIC".to_string()));
    }

    #[test]
    fn test_extract_symbol_whole_token_only() {
        assert_eq!(symbol_of("is sol cheap?"), Some("SOL".to_string()));
        assert_eq!(symbol_of("BTC's dominance"), Some("BTC".to_string()));
        // "sol" inside "solution", "arb" inside "arbitrage"
        assert_eq!(symbol_of("a solution for arbitrage"), None);
    }

    #[test]
    fn test_earliest_match_wins() {
        assert_eq!(symbol_of("Ethereum vs Bitcoin"), Some("ETH".to_string()));
        assert_eq!(symbol_of("btc or eth?"), Some("BTC".to_string()));
    }

    #[test]
    fn test_longer_match_breaks_position_tie() {
        let keys = vec![
            AssetKey {
                symbol: "ETH".to_string(),
                name: "Ethereum".to_string(),
            },
            AssetKey {
                symbol: "ETC".to_string(),
                name: "Ethereum Classic".to_string(),
            },
        ];
        let key = extract_asset("ethereum classic outlook", &keys).unwrap();
        assert_eq!(key.symbol, "ETC");
    }

    #[test]
    fn test_no_asset() {
        assert_eq!(symbol_of("what do people think about regulation?"), None);
        assert_eq!(symbol_of(""), None);
    }

    fn tie(id: &str, similarity: f32) -> ScoredPost {
        ScoredPost {
            post: crypto_core::DiscussionPost {
                post_id: id.to_string(),
                title: id.to_string(),
                body: String::new(),
                score: 0,
                num_comments: 0,
                created_at: chrono::Utc::now(),
            },
            similarity,
        }
    }

    #[test]
    fn test_tied_at_tail() {
        let pool = vec![tie("a", 0.9), tie("b", 0.8), tie("c", 0.8)];
        assert!(tied_at_tail(&pool, 2));
        assert!(!tied_at_tail(&pool, 1));
        assert!(!tied_at_tail(&pool, 5));
        assert!(!tied_at_tail(&pool, 0));
    }

    #[test]
    fn test_token_spans() {
        let spans = token_spans("hi, sol-usd");
        assert_eq!(spans, vec![(0, "hi"), (4, "sol"), (8, "usd")]);
    }
}
