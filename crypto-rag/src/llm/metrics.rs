//! Retrieval Performance Metrics
//!
//! Tracks, per query:
//! - Structured lookup, embedding and vector search latency
//! - Similarity distribution of the returned posts
//! - How many candidates the similarity floor removed

use serde::Serialize;
use std::time::{Duration, Instant};

use super::lineage::LineageTrail;

/// Metrics for one retrieval
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalMetrics {
    /// Time taken by the asset match and market lookup (milliseconds)
    pub lookup_latency_ms: u64,

    /// Time taken to embed the query (milliseconds)
    pub embedding_latency_ms: u64,

    /// Time taken by the nearest-neighbor search (milliseconds)
    pub search_latency_ms: u64,

    /// Wall-clock time of the whole retrieval (milliseconds)
    pub retrieval_latency_ms: u64,

    /// Whether the query embedding came from the cache
    pub embedding_cache_hit: bool,

    /// Whether a market record was attached
    pub market_hit: bool,

    /// Candidates returned by the post store before filtering
    pub candidates: usize,

    /// Candidates dropped by the similarity floor
    pub filtered_out: usize,

    /// Similarity scores of the returned posts, in rank order
    pub similarity_scores: Vec<f32>,

    pub similarity_min: Option<f32>,

    pub similarity_max: Option<f32>,

    pub similarity_median: Option<f32>,

    /// Number of posts returned
    pub num_posts: usize,

    /// Data flow of this retrieval
    pub lineage: LineageTrail,
}

impl RetrievalMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_lookup_latency(&mut self, duration: Duration) {
        self.lookup_latency_ms = duration.as_millis() as u64;
    }

    pub fn set_embedding_latency(&mut self, duration: Duration) {
        self.embedding_latency_ms = duration.as_millis() as u64;
    }

    pub fn set_search_latency(&mut self, duration: Duration) {
        self.search_latency_ms = duration.as_millis() as u64;
    }

    pub fn set_retrieval_latency(&mut self, duration: Duration) {
        self.retrieval_latency_ms = duration.as_millis() as u64;
    }

    /// Add similarity scores and compute statistics
    pub fn set_similarity_scores(&mut self, scores: Vec<f32>) {
        if scores.is_empty() {
            self.similarity_min = None;
            self.similarity_max = None;
            self.similarity_median = None;
            self.num_posts = 0;
        } else {
            self.similarity_min = scores.iter().copied().reduce(f32::min);
            self.similarity_max = scores.iter().copied().reduce(f32::max);

            let mut sorted = scores.clone();
            sorted.sort_by(f32::total_cmp);
            self.similarity_median = Some(percentile(&sorted, 50.0));
            self.num_posts = scores.len();
        }
        self.similarity_scores = scores;
    }

    /// Zero the fields that vary between identical runs: latencies and the
    /// embedding cache flag
    pub fn clear_runtime(&mut self) {
        self.lookup_latency_ms = 0;
        self.embedding_latency_ms = 0;
        self.search_latency_ms = 0;
        self.retrieval_latency_ms = 0;
        self.embedding_cache_hit = false;
    }

    /// Calculate average similarity score
    pub fn avg_similarity(&self) -> f32 {
        if self.similarity_scores.is_empty() {
            0.0
        } else {
            self.similarity_scores.iter().sum::<f32>() / self.similarity_scores.len() as f32
        }
    }

    /// Report metrics to tracing logs
    pub fn report(&self) {
        tracing::info!(
            "Retrieval Metrics: lookup={}ms, embedding={}ms (cached={}), search={}ms, total={}ms, market_hit={}, posts={}, filtered={}/{}, avg_sim={:.2}, sim_range=[{:?},{:?}], median={:?}",
            self.lookup_latency_ms,
            self.embedding_latency_ms,
            self.embedding_cache_hit,
            self.search_latency_ms,
            self.retrieval_latency_ms,
            self.market_hit,
            self.num_posts,
            self.filtered_out,
            self.candidates,
            self.avg_similarity(),
            self.similarity_min,
            self.similarity_max,
            self.similarity_median,
        );
    }
}

/// Timer helper for measuring operation latency
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}

/// Calculate percentile from sorted data
fn percentile(sorted_data: &[f32], p: f64) -> f32 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let len = sorted_data.len();
    let idx = (p / 100.0 * (len - 1) as f64).round() as usize;
    sorted_data[idx.min(len - 1)]
}
