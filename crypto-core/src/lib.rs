pub mod error;
pub mod types;

pub use error::{RagError, UpstreamStage};
pub use types::{
    compare_ranked, rank_posts, AssetKey, ConversationTurn, DiscussionPost, EmbeddedPost,
    ExecutionMode, MarketRecord, RetrievalResult, Role, ScoredPost,
};
