use anyhow::Result;
use async_trait::async_trait;
use crypto_core::{AssetKey, EmbeddedPost, MarketRecord, RagError, ScoredPost};
use std::collections::BTreeMap;

use super::embedder::cosine_similarity;
use super::stores::{MarketStore, PostStore, UpsertOutcome};

/// Market records held in memory, keyed by upper-case symbol
#[derive(Debug, Default, Clone)]
pub struct InMemoryMarketStore {
    records: BTreeMap<String, MarketRecord>,
}

impl InMemoryMarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = MarketRecord>) -> Result<Self, RagError> {
        let mut store = Self::new();
        for record in records {
            store.upsert(record)?;
        }
        Ok(store)
    }

    pub fn upsert(&mut self, record: MarketRecord) -> Result<UpsertOutcome, RagError> {
        record.validate()?;
        let key = record.key();

        match self.records.get(&key) {
            Some(existing) if !existing.can_be_refreshed_by(&record) => Ok(UpsertOutcome::Stale),
            Some(_) => {
                self.records.insert(key, record);
                Ok(UpsertOutcome::Refreshed)
            }
            None => {
                self.records.insert(key, record);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    async fn asset_keys(&self) -> Result<Vec<AssetKey>> {
        Ok(self.records.values().map(MarketRecord::asset_key).collect())
    }

    async fn lookup_by_symbol_or_name(&self, text: &str) -> Result<Option<MarketRecord>> {
        let needle = text.trim();
        if let Some(record) = self.records.get(&needle.to_uppercase()) {
            return Ok(Some(record.clone()));
        }
        Ok(self
            .records
            .values()
            .find(|r| r.name.eq_ignore_ascii_case(needle))
            .cloned())
    }
}

/// Brute-force cosine search over embedded posts
#[derive(Debug, Clone)]
pub struct InMemoryPostStore {
    dimension: usize,
    posts: BTreeMap<String, EmbeddedPost>,
}

impl InMemoryPostStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            posts: BTreeMap::new(),
        }
    }

    /// Insert or replace by post id. The vector must match the store dimension.
    pub fn insert(&mut self, post: EmbeddedPost) -> Result<(), RagError> {
        if post.dimension() != self.dimension {
            return Err(RagError::InvalidRecord(format!(
                "post {}: embedding has {} dimensions, store expects {}",
                post.post.post_id,
                post.dimension(),
                self.dimension
            )));
        }
        self.posts.insert(post.post.post_id.clone(), post);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn nearest_neighbors(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPost>> {
        if vector.len() != self.dimension {
            anyhow::bail!(
                "query vector has {} dimensions, store expects {}",
                vector.len(),
                self.dimension
            );
        }

        let mut scored: Vec<ScoredPost> = self
            .posts
            .values()
            .map(|p| ScoredPost {
                post: p.post.clone(),
                similarity: cosine_similarity(vector, &p.embedding),
            })
            .collect();

        crypto_core::rank_posts(&mut scored, k);
        Ok(scored)
    }
}
