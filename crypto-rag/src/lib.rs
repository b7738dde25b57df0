pub mod assistant;
pub mod config;
pub mod llm;

// Re-export commonly used items from llm module
pub use llm::{
    Composer, ComposerConfig, LanguageModel, LlmClient, LlmConfig, LlmPromptFormatter,
    LlmProvider, LlmResponse, RetrievalMetrics, Retriever, RetrieverConfig,
    NO_INFORMATION_RESPONSE,
};

// Re-export commonly used items from assistant module
pub use assistant::{AssistantReply, BatchEntry, BatchOutcome, ConversationSession, CryptoAssistant};
pub use config::RagSettings;
