use crypto_core::ExecutionMode;

use crate::llm::{ComposerConfig, LlmConfig, RetrieverConfig};

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "crypto_discussions";
pub const DEFAULT_LMDB_PATH: &str = "data/market.lmdb";

/// Everything needed to build a [`crate::CryptoAssistant`]
#[derive(Debug, Clone)]
pub struct RagSettings {
    /// Qdrant gRPC endpoint
    pub qdrant_url: String,

    /// Qdrant collection holding discussion posts
    pub collection: String,

    /// Directory of the LMDB market-record environment
    pub lmdb_path: String,

    /// Required in live mode
    pub openai_api_key: Option<String>,

    pub llm: LlmConfig,
    pub retriever: RetrieverConfig,
    pub composer: ComposerConfig,
    pub mode: ExecutionMode,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            lmdb_path: DEFAULT_LMDB_PATH.to_string(),
            openai_api_key: None,
            llm: LlmConfig::default(),
            retriever: RetrieverConfig::default(),
            composer: ComposerConfig::default(),
            mode: ExecutionMode::Live,
        }
    }
}

impl RagSettings {
    /// Fixture-backed settings, no external services
    pub fn mock() -> Self {
        Self {
            mode: ExecutionMode::Mock,
            ..Self::default()
        }
    }
}
