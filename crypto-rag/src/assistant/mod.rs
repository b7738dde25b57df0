/// Question answering entry points: single query, batch and interactive sessions
pub mod crypto_assistant;
pub mod session;

pub use crypto_assistant::{AssistantReply, BatchEntry, BatchOutcome, CryptoAssistant};
pub use session::ConversationSession;
