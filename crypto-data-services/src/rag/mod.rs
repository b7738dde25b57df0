pub mod embedder;
pub mod fixtures;
pub mod ingestion_pipeline;
pub mod market_store;
pub mod memory;
pub mod post_formatter;
pub mod stores;
pub mod vector_store;

// Re-export commonly used items
pub use embedder::{Embedder, FastEmbedEmbedder, HashingEmbedder};
pub use ingestion_pipeline::{Dataset, IngestStats, IngestionPipeline};
pub use market_store::LmdbMarketStore;
pub use memory::{InMemoryMarketStore, InMemoryPostStore};
pub use post_formatter::PostFormatter;
pub use stores::{MarketStore, PostStore, UpsertOutcome};
pub use vector_store::QdrantPostStore;
