pub mod canned;
pub mod composer;
pub mod lineage;
pub mod llm_client;
pub mod metrics;
pub mod prompt_formatter;
pub mod retriever;

// Re-export commonly used items
pub use canned::{CannedRule, CannedRules, Predicate, Response};
pub use composer::{Composer, ComposerBackend, ComposerConfig, NO_INFORMATION_RESPONSE};
pub use lineage::{LineageEdge, LineageTrail};
pub use llm_client::{LanguageModel, LlmClient, LlmConfig, LlmProvider, LlmResponse};
pub use metrics::{MetricsTimer, RetrievalMetrics};
pub use prompt_formatter::LlmPromptFormatter;
pub use retriever::{extract_asset, Retriever, RetrieverConfig};
