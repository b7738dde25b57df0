use super::{DiscussionPost, MarketRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A discussion post paired with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPost {
    pub post: DiscussionPost,
    pub similarity: f32, // cosine similarity, higher is closer
}

/// Evidence gathered for one query. Built per call, consumed by the composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: String,
    pub market: Option<MarketRecord>,
    /// Ranked by [`compare_ranked`], never longer than the requested k
    pub posts: Vec<ScoredPost>,
}

impl RetrievalResult {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            market: None,
            posts: Vec::new(),
        }
    }

    /// True when neither structured nor unstructured evidence was found
    pub fn is_empty(&self) -> bool {
        self.market.is_none() && self.posts.is_empty()
    }

    pub fn has_market(&self) -> bool {
        self.market.is_some()
    }

    pub fn max_similarity(&self) -> Option<f32> {
        self.posts.iter().map(|p| p.similarity).reduce(f32::max)
    }
}

/// Canonical ranking: similarity desc, engagement desc, recency desc.
///
/// Post id ascending is the final key so the order is total and independent
/// of the order in which a store returned its candidates.
pub fn compare_ranked(a: &ScoredPost, b: &ScoredPost) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| b.post.score.cmp(&a.post.score))
        .then_with(|| b.post.created_at.cmp(&a.post.created_at))
        .then_with(|| a.post.post_id.cmp(&b.post.post_id))
}

/// Sort in place by [`compare_ranked`] and keep at most `k` posts
pub fn rank_posts(posts: &mut Vec<ScoredPost>, k: usize) {
    posts.sort_by(compare_ranked);
    posts.truncate(k);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn scored(id: &str, similarity: f32, score: i64, day: u32) -> ScoredPost {
        ScoredPost {
            post: DiscussionPost {
                post_id: id.to_string(),
                title: format!("Post {}", id),
                body: String::new(),
                score,
                num_comments: 0,
                created_at: Utc.with_ymd_and_hms(2025, 3, day, 0, 0, 0).unwrap(),
            },
            similarity,
        }
    }

    fn ids(posts: &[ScoredPost]) -> Vec<&str> {
        posts.iter().map(|p| p.post.post_id.as_str()).collect()
    }

    #[test]
    fn test_similarity_is_primary_key() {
        let mut posts = vec![scored("a", 0.5, 900, 1), scored("b", 0.9, 1, 1)];
        rank_posts(&mut posts, 10);
        assert_eq!(ids(&posts), vec!["b", "a"]);
    }

    #[test]
    fn test_engagement_then_recency_break_ties() {
        let mut posts = vec![
            scored("old", 0.8, 50, 1),
            scored("popular", 0.8, 120, 1),
            scored("new", 0.8, 50, 20),
        ];
        rank_posts(&mut posts, 10);
        assert_eq!(ids(&posts), vec!["popular", "new", "old"]);
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let base = vec![
            scored("a", 0.7, 10, 3),
            scored("b", 0.7, 10, 3),
            scored("c", 0.9, 1, 1),
            scored("d", 0.7, 25, 2),
        ];
        let mut forward = base.clone();
        let mut reversed: Vec<ScoredPost> = base.into_iter().rev().collect();
        rank_posts(&mut forward, 4);
        rank_posts(&mut reversed, 4);
        assert_eq!(forward, reversed);
        assert_eq!(ids(&forward), vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn test_truncates_to_k() {
        let mut posts = vec![scored("a", 0.1, 0, 1), scored("b", 0.2, 0, 1)];
        rank_posts(&mut posts, 1);
        assert_eq!(ids(&posts), vec!["b"]);

        rank_posts(&mut posts, 0);
        assert!(posts.is_empty());
    }

    #[test]
    fn test_empty_result() {
        let result = RetrievalResult::empty("nothing");
        assert!(result.is_empty());
        assert_eq!(result.max_similarity(), None);
    }

    #[test]
    fn test_result_serializes_ranked_posts() {
        let mut posts = vec![scored("a", 0.2, 0, 1), scored("b", 0.6, 0, 1)];
        rank_posts(&mut posts, 2);
        let result = RetrievalResult {
            query: "eth".to_string(),
            market: None,
            posts,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["posts"][0]["post"]["post_id"], "b");
        assert!(json["market"].is_null());

        let back: RetrievalResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
