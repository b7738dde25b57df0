use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A captured social-media post. Immutable once scraped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionPost {
    pub post_id: String,
    pub title: String,
    pub body: String,
    /// Engagement score (upvotes minus downvotes, may be negative)
    pub score: i64,
    pub num_comments: u64,
    pub created_at: DateTime<Utc>,
}

/// A post together with its embedding vector, as held by vector stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedPost {
    pub post: DiscussionPost,
    pub embedding: Vec<f32>,
}

impl EmbeddedPost {
    pub fn new(post: DiscussionPost, embedding: Vec<f32>) -> Self {
        Self { post, embedding }
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}
