pub mod conversation;
pub mod discussion_post;
pub mod market_record;
pub mod retrieval;

// Re-export common types
pub use conversation::{ConversationTurn, Role};
pub use discussion_post::{DiscussionPost, EmbeddedPost};
pub use market_record::{AssetKey, MarketRecord};
pub use retrieval::{compare_ranked, rank_posts, RetrievalResult, ScoredPost};

use serde::{Deserialize, Serialize};

/// Whether components talk to real backends or to the built-in fixtures.
///
/// Chosen once when a component is constructed, never re-checked per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Live,
    Mock,
}

impl ExecutionMode {
    pub fn is_mock(self) -> bool {
        matches!(self, ExecutionMode::Mock)
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Live => write!(f, "live"),
            ExecutionMode::Mock => write!(f, "mock"),
        }
    }
}
