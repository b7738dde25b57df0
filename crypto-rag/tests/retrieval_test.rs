/// Retrieval integration tests
///
/// These run the retriever against the fixture stores and against hand-written
/// fakes of the store and embedder traits. No external services are needed.
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use crypto_core::{AssetKey, DiscussionPost, MarketRecord, RagError, ScoredPost, UpstreamStage};
use crypto_data_services::{fixtures, Embedder, InMemoryMarketStore, MarketStore, PostStore};
use crypto_rag::{Retriever, RetrieverConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct FixedEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for FixedEmbedder {
    fn dimension(&self) -> usize {
        2
    }

    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1.0, 0.0])
    }
}

/// Returns its candidates exactly in the order given
struct CannedPostStore {
    candidates: Vec<ScoredPost>,
    calls: AtomicUsize,
}

#[async_trait]
impl PostStore for CannedPostStore {
    async fn nearest_neighbors(&self, _vector: &[f32], _k: usize) -> Result<Vec<ScoredPost>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.clone())
    }
}

/// Cuts at the requested limit by similarity alone, keeping insertion order on ties
struct SimilarityCutStore {
    posts: Vec<ScoredPost>,
    limits: std::sync::Mutex<Vec<usize>>,
}

impl SimilarityCutStore {
    fn new(posts: Vec<ScoredPost>) -> Arc<Self> {
        Arc::new(Self {
            posts,
            limits: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn limits(&self) -> Vec<usize> {
        self.limits.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostStore for SimilarityCutStore {
    async fn nearest_neighbors(&self, _vector: &[f32], k: usize) -> Result<Vec<ScoredPost>> {
        self.limits.lock().unwrap().push(k);
        let mut hits = self.posts.clone();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        Ok(hits)
    }
}

struct FailingPostStore;

#[async_trait]
impl PostStore for FailingPostStore {
    async fn nearest_neighbors(&self, _vector: &[f32], _k: usize) -> Result<Vec<ScoredPost>> {
        Err(anyhow!("connection refused"))
    }
}

struct FailingMarketStore;

#[async_trait]
impl MarketStore for FailingMarketStore {
    async fn asset_keys(&self) -> Result<Vec<AssetKey>> {
        Err(anyhow!("environment closed"))
    }

    async fn lookup_by_symbol_or_name(&self, _text: &str) -> Result<Option<MarketRecord>> {
        Err(anyhow!("environment closed"))
    }
}

fn scored(id: &str, score: i64, day: u32, similarity: f32) -> ScoredPost {
    ScoredPost {
        post: DiscussionPost {
            post_id: id.to_string(),
            title: format!("Post {}", id),
            body: "body".to_string(),
            score,
            num_comments: 0,
            created_at: Utc.with_ymd_and_hms(2025, 2, day, 0, 0, 0).unwrap(),
        },
        similarity,
    }
}

fn candidates() -> Vec<ScoredPost> {
    vec![
        scored("d", 10, 1, 0.5),
        scored("b", 50, 1, 0.9),
        scored("a", 50, 1, 0.9),
        scored("c", 50, 5, 0.9),
        scored("e", 99, 9, 0.9),
        scored("f", 1, 1, -0.2),
    ]
}

fn fixture_market() -> Arc<InMemoryMarketStore> {
    Arc::new(InMemoryMarketStore::from_records(fixtures::market_records()).unwrap())
}

fn retriever_over(candidates: Vec<ScoredPost>) -> (Retriever, Arc<CannedPostStore>, Arc<FixedEmbedder>) {
    let posts = Arc::new(CannedPostStore {
        candidates,
        calls: AtomicUsize::new(0),
    });
    let embedder = Arc::new(FixedEmbedder {
        calls: AtomicUsize::new(0),
    });
    let retriever = Retriever::new(
        fixture_market(),
        posts.clone(),
        embedder.clone(),
        RetrieverConfig::default(),
    );
    (retriever, posts, embedder)
}

#[tokio::test]
async fn test_ranking_independent_of_store_order() {
    let mut reversed = candidates();
    reversed.reverse();

    let (forward, _, _) = retriever_over(candidates());
    let (backward, _, _) = retriever_over(reversed);

    let a = forward.retrieve("what is new?", 10).await.unwrap();
    let b = backward.retrieve("what is new?", 10).await.unwrap();

    let ids = |r: &crypto_core::RetrievalResult| {
        r.posts.iter().map(|p| p.post.post_id.clone()).collect::<Vec<_>>()
    };
    // similarity, then score, then recency, then id; negative similarity dropped
    assert_eq!(ids(&a), vec!["e", "c", "a", "b", "d"]);
    assert_eq!(ids(&a), ids(&b));
}

#[tokio::test]
async fn test_top_k_truncates_after_ranking() {
    let (retriever, _, _) = retriever_over(candidates());
    let result = retriever.retrieve("what is new?", 2).await.unwrap();
    let ids: Vec<_> = result.posts.iter().map(|p| p.post.post_id.as_str()).collect();
    assert_eq!(ids, vec!["e", "c"]);
}

fn retriever_with(store: Arc<SimilarityCutStore>) -> Retriever {
    Retriever::new(
        fixture_market(),
        store,
        Arc::new(FixedEmbedder {
            calls: AtomicUsize::new(0),
        }),
        RetrieverConfig::default(),
    )
}

#[tokio::test]
async fn test_similarity_tie_at_cutoff_goes_to_higher_score() {
    let store = SimilarityCutStore::new(vec![scored("low", 1, 1, 0.9), scored("high", 500, 1, 0.9)]);
    let retriever = retriever_with(store.clone());

    let result = retriever.retrieve("what is new?", 1).await.unwrap();
    assert_eq!(result.posts.len(), 1);
    assert_eq!(result.posts[0].post.post_id, "high");
    assert!(store.limits()[0] > 1);
}

#[tokio::test]
async fn test_search_widens_while_tie_fills_pool() {
    // 30 posts tied on similarity, the best-scored one inserted last
    let posts: Vec<ScoredPost> = (0..30)
        .map(|i| scored(&format!("p{:02}", i), i, 1, 0.7))
        .collect();
    let store = SimilarityCutStore::new(posts);
    let retriever = retriever_with(store.clone());

    let result = retriever.retrieve("what is new?", 1).await.unwrap();
    assert_eq!(result.posts[0].post.post_id, "p29");

    let limits = store.limits();
    assert!(limits.len() > 1);
    assert!(limits.windows(2).all(|w| w[0] < w[1]));
    assert!(*limits.last().unwrap() > 30);
}

#[tokio::test]
async fn test_min_similarity_is_strict() {
    let posts = Arc::new(CannedPostStore {
        candidates: candidates(),
        calls: AtomicUsize::new(0),
    });
    let retriever = Retriever::new(
        fixture_market(),
        posts,
        Arc::new(FixedEmbedder {
            calls: AtomicUsize::new(0),
        }),
        RetrieverConfig {
            min_similarity: 0.5,
            ..Default::default()
        },
    );

    let (result, metrics) = retriever.retrieve_with_metrics("anything", 10).await.unwrap();
    assert_eq!(result.posts.len(), 4);
    assert!(result.posts.iter().all(|p| p.similarity > 0.5));
    assert_eq!(metrics.candidates, 6);
    assert_eq!(metrics.filtered_out, 2);
}

#[tokio::test]
async fn test_k_zero_skips_search() {
    let (retriever, posts, embedder) = retriever_over(candidates());

    let result = retriever.retrieve("Bitcoin outlook", 0).await.unwrap();
    assert!(result.posts.is_empty());
    assert_eq!(result.market.unwrap().symbol, "BTC");
    assert_eq!(posts.calls.load(Ordering::SeqCst), 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_query_embedding_is_cached() {
    let (retriever, posts, embedder) = retriever_over(candidates());

    let (_, first) = retriever.retrieve_with_metrics("solana news", 3).await.unwrap();
    let (_, second) = retriever.retrieve_with_metrics("solana news", 3).await.unwrap();

    assert!(!first.embedding_cache_hit);
    assert!(second.embedding_cache_hit);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(posts.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_empty_query_rejected() {
    let retriever = Retriever::mock(RetrieverConfig::default()).unwrap();
    let err = retriever.retrieve("   ", 3).await.unwrap_err();
    assert!(matches!(err, RagError::MalformedInput(_)));
}

#[tokio::test]
async fn test_mock_retrieval_is_idempotent() {
    let retriever = Retriever::mock(RetrieverConfig::default()).unwrap();

    let first = retriever.retrieve("Ethereum vs Bitcoin", 3).await.unwrap();
    let second = retriever.retrieve("Ethereum vs Bitcoin", 3).await.unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.market.as_ref().unwrap().symbol, "ETH");
    assert!(first.posts.len() <= 3);
}

#[tokio::test]
async fn test_mock_retrieval_finds_discussions() {
    let retriever = Retriever::mock(RetrieverConfig::default()).unwrap();
    let (result, metrics) = retriever
        .retrieve_with_metrics("solana growth", 3)
        .await
        .unwrap();

    assert_eq!(result.market.as_ref().unwrap().symbol, "SOL");
    assert!(!result.posts.is_empty());
    assert!(result.posts.iter().all(|p| p.similarity > 0.0));
    assert!(metrics.market_hit);
    assert_eq!(metrics.num_posts, result.posts.len());
    assert_eq!(metrics.lineage.edges().len(), 2);
}

#[tokio::test]
async fn test_vector_search_failure_names_stage() {
    let retriever = Retriever::new(
        fixture_market(),
        Arc::new(FailingPostStore),
        Arc::new(FixedEmbedder {
            calls: AtomicUsize::new(0),
        }),
        RetrieverConfig::default(),
    );

    match retriever.retrieve("bitcoin", 3).await {
        Err(RagError::UpstreamUnavailable { stage, message }) => {
            assert_eq!(stage, UpstreamStage::VectorSearch);
            assert!(message.contains("connection refused"));
        }
        other => panic!("expected upstream failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_market_store_failure_names_stage() {
    let (_, posts, embedder) = retriever_over(candidates());
    let retriever = Retriever::new(
        Arc::new(FailingMarketStore),
        posts,
        embedder,
        RetrieverConfig::default(),
    );

    match retriever.retrieve("bitcoin", 3).await {
        Err(RagError::UpstreamUnavailable { stage, .. }) => {
            assert_eq!(stage, UpstreamStage::AssetCatalogue);
        }
        other => panic!("expected upstream failure, got {:?}", other),
    }
}
