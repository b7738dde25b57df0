use anyhow::Result;
use async_trait::async_trait;
use crypto_core::{AssetKey, MarketRecord, ScoredPost};

/// Exact-match store of the latest market metrics, keyed by symbol
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Every symbol/name pair the store can answer for
    async fn asset_keys(&self) -> Result<Vec<AssetKey>>;

    /// Point lookup by symbol or display name, case-insensitive.
    ///
    /// Returns `Ok(None)` when no row matches.
    async fn lookup_by_symbol_or_name(&self, text: &str) -> Result<Option<MarketRecord>>;
}

/// Nearest-neighbor store of embedded discussion posts
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Up to `k` posts closest to `vector`, each with its cosine similarity.
    ///
    /// No ordering is guaranteed; callers re-rank.
    async fn nearest_neighbors(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPost>>;
}

/// Result of writing one market record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Refreshed,
    /// Incoming row was older than the stored one and was not written
    Stale,
}
