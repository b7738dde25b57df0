use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crypto_core::{DiscussionPost, EmbeddedPost, ScoredPost};
use qdrant_client::qdrant::{
    value::Kind, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::json;
use std::collections::HashMap;

use super::embedder::fnv1a_64;
use super::stores::PostStore;

/// Qdrant collection of embedded discussion posts
pub struct QdrantPostStore {
    client: Qdrant,
    collection_name: String,
}

impl QdrantPostStore {
    pub fn new(qdrant_url: &str, collection_name: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(qdrant_url).build()?;

        tracing::info!("Connecting to Qdrant at {}", qdrant_url);

        Ok(Self {
            client,
            collection_name: collection_name.into(),
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Create the cosine collection if it doesn't exist
    pub async fn create_collection_if_not_exists(&self, dimension: u64) -> Result<()> {
        if self.client.collection_exists(self.collection_name.clone()).await? {
            tracing::info!("Qdrant collection {} already exists", self.collection_name);
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection_name)
                    .vectors_config(VectorParamsBuilder::new(dimension, Distance::Cosine)),
            )
            .await?;

        tracing::info!("Created Qdrant collection: {}", self.collection_name);
        Ok(())
    }

    /// Upsert posts. Re-sending a post id overwrites the earlier point.
    pub async fn upsert_posts(&self, posts: &[EmbeddedPost], embedding_model: &str) -> Result<usize> {
        if posts.is_empty() {
            return Ok(0);
        }

        let points: Vec<PointStruct> = posts
            .iter()
            .map(|p| post_to_point(p, embedding_model))
            .collect();

        tracing::info!("Upserting {} points to Qdrant", points.len());

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await?;

        Ok(posts.len())
    }
}

#[async_trait]
impl PostStore for QdrantPostStore {
    async fn nearest_neighbors(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPost>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let search = SearchPointsBuilder::new(&self.collection_name, vector.to_vec(), k as u64)
            .with_payload(true);

        let response = self.client.search_points(search).await?;

        response
            .result
            .into_iter()
            .map(|point| {
                Ok(ScoredPost {
                    post: payload_to_post(&point.payload)?,
                    similarity: point.score,
                })
            })
            .collect()
    }
}

/// Stable point id for a post id
pub fn point_id_for(post_id: &str) -> u64 {
    fnv1a_64(post_id.as_bytes())
}

/// Build a Qdrant point carrying the full post as payload
pub fn post_to_point(embedded: &EmbeddedPost, embedding_model: &str) -> PointStruct {
    let post = &embedded.post;

    let mut payload = serde_json::Map::new();
    payload.insert("post_id".to_string(), json!(post.post_id));
    payload.insert("title".to_string(), json!(post.title));
    payload.insert("body".to_string(), json!(post.body));
    payload.insert("score".to_string(), json!(post.score));
    payload.insert("num_comments".to_string(), json!(post.num_comments));
    payload.insert("created_at".to_string(), json!(post.created_at.to_rfc3339()));

    // Provenance
    payload.insert("schema_version".to_string(), json!(1));
    payload.insert("embedding_model".to_string(), json!(embedding_model));
    payload.insert("embedding_dim".to_string(), json!(embedded.dimension()));

    PointStruct::new(
        point_id_for(&post.post_id),
        embedded.embedding.clone(),
        payload,
    )
}

fn payload_to_post(payload: &HashMap<String, Value>) -> Result<DiscussionPost> {
    let created_at = get_payload_string(payload, "created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| anyhow!("Invalid created_at {}: {}", created_at, e))?
        .with_timezone(&Utc);

    Ok(DiscussionPost {
        post_id: get_payload_string(payload, "post_id")?,
        title: get_payload_string(payload, "title")?,
        body: get_payload_string(payload, "body").unwrap_or_default(),
        score: get_payload_i64(payload, "score")?,
        num_comments: get_payload_i64(payload, "num_comments")?.max(0) as u64,
        created_at,
    })
}

fn get_payload_i64(payload: &HashMap<String, Value>, key: &str) -> Result<i64> {
    payload
        .get(key)
        .and_then(|v| v.kind.as_ref())
        .and_then(|kind| match kind {
            Kind::IntegerValue(i) => Some(*i),
            Kind::DoubleValue(d) => Some(*d as i64),
            _ => None,
        })
        .ok_or_else(|| anyhow!("Missing or invalid field: {}", key))
}

fn get_payload_string(payload: &HashMap<String, Value>, key: &str) -> Result<String> {
    payload
        .get(key)
        .and_then(|v| v.kind.as_ref())
        .and_then(|kind| match kind {
            Kind::StringValue(s) => Some(s.clone()),
            _ => None,
        })
        .ok_or_else(|| anyhow!("Missing or invalid field: {}", key))
}
