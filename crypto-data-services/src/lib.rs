pub mod rag;

// Re-export commonly used items
pub use rag::{
    fixtures, Dataset, Embedder, FastEmbedEmbedder, HashingEmbedder, InMemoryMarketStore,
    InMemoryPostStore, IngestStats, IngestionPipeline, LmdbMarketStore, MarketStore,
    PostFormatter, PostStore, QdrantPostStore, UpsertOutcome,
};
