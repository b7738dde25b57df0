use anyhow::{Context, Result};
use crypto_core::{DiscussionPost, EmbeddedPost, MarketRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::embedder::Embedder;
use super::market_store::LmdbMarketStore;
use super::post_formatter::PostFormatter;
use super::stores::UpsertOutcome;
use super::vector_store::QdrantPostStore;

const BATCH_SIZE: usize = 100;

/// Rows and posts handed over by the collectors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub market_records: Vec<MarketRecord>,
    #[serde(default)]
    pub posts: Vec<DiscussionPost>,
}

impl Dataset {
    /// Load a JSON dataset file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        let dataset: Dataset = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse dataset {}", path.display()))?;

        tracing::info!(
            "Loaded dataset {}: {} market records, {} posts",
            path.display(),
            dataset.market_records.len(),
            dataset.posts.len()
        );
        Ok(dataset)
    }
}

/// Statistics from an ingestion run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub records_inserted: usize,
    pub records_refreshed: usize,
    pub records_stale: usize,
    pub records_invalid: usize,
    pub posts_skipped: usize,
    pub embeddings_generated: usize,
    pub points_uploaded: usize,
}

/// Ingestion pipeline that:
/// 1. Validates and upserts market records into LMDB
/// 2. Converts posts to embedding text
/// 3. Generates embeddings in batches
/// 4. Uploads posts to Qdrant
pub struct IngestionPipeline {
    market_store: Arc<LmdbMarketStore>,
    post_store: Arc<QdrantPostStore>,
    embedder: Arc<dyn Embedder>,
}

impl IngestionPipeline {
    pub async fn new(
        market_store: Arc<LmdbMarketStore>,
        post_store: Arc<QdrantPostStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        post_store
            .create_collection_if_not_exists(embedder.dimension() as u64)
            .await?;

        tracing::info!("Ingestion pipeline initialized successfully");

        Ok(Self {
            market_store,
            post_store,
            embedder,
        })
    }

    pub async fn run(&self, dataset: &Dataset) -> Result<IngestStats> {
        let mut stats = upsert_market_records(&self.market_store, &dataset.market_records)?;

        let embedded = embed_posts(self.embedder.as_ref(), &dataset.posts, &mut stats).await?;

        for batch in embedded.chunks(BATCH_SIZE) {
            stats.points_uploaded += self
                .post_store
                .upsert_posts(batch, self.embedder.model_name())
                .await?;
        }

        tracing::info!("Ingestion complete: {:?}", stats);
        Ok(stats)
    }
}

/// Write every valid record; invalid and stale ones are counted and skipped
pub fn upsert_market_records(store: &LmdbMarketStore, records: &[MarketRecord]) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    for record in records {
        if let Err(e) = record.validate() {
            tracing::warn!("Skipping market record: {}", e);
            stats.records_invalid += 1;
            continue;
        }

        match store.upsert(record)? {
            UpsertOutcome::Inserted => stats.records_inserted += 1,
            UpsertOutcome::Refreshed => stats.records_refreshed += 1,
            UpsertOutcome::Stale => stats.records_stale += 1,
        }
    }

    tracing::info!(
        "Market records: {} inserted, {} refreshed, {} stale, {} invalid",
        stats.records_inserted,
        stats.records_refreshed,
        stats.records_stale,
        stats.records_invalid
    );
    Ok(stats)
}

/// Embed posts in batches of 100; posts without an id or any text are skipped
pub async fn embed_posts(
    embedder: &dyn Embedder,
    posts: &[DiscussionPost],
    stats: &mut IngestStats,
) -> Result<Vec<EmbeddedPost>> {
    let usable: Vec<&DiscussionPost> = posts
        .iter()
        .filter(|p| {
            let ok = !p.post_id.trim().is_empty() && !p.to_embedding_text().is_empty();
            if !ok {
                tracing::warn!("Skipping post without id or text: {:?}", p.post_id);
            }
            ok
        })
        .collect();
    stats.posts_skipped += posts.len() - usable.len();

    let mut embedded = Vec::with_capacity(usable.len());
    for batch in usable.chunks(BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|p| p.to_embedding_text()).collect();

        tracing::info!("Generating embeddings for batch of {} posts...", texts.len());

        let vectors = embedder.embed_batch(&texts).await?;
        stats.embeddings_generated += vectors.len();

        for (post, vector) in batch.iter().zip(vectors) {
            embedded.push(EmbeddedPost::new((*post).clone(), vector));
        }
    }

    Ok(embedded)
}
