//! Built-in dataset backing mock mode and `rag-ingest --fixtures`.
//!
//! Values are fixed so mock runs are reproducible.

use chrono::{DateTime, TimeZone, Utc};
use crypto_core::{DiscussionPost, EmbeddedPost, MarketRecord, RagError};

use super::embedder::{Embedder, HashingEmbedder};
use super::ingestion_pipeline::Dataset;
use super::memory::{InMemoryMarketStore, InMemoryPostStore};
use super::post_formatter::PostFormatter;

fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn market_records() -> Vec<MarketRecord> {
    let updated = at(3, 1, 12);
    vec![
        MarketRecord::new("BTC", "Bitcoin", 65000.25, 1.25e12, 30e9, 19.5e6, updated),
        MarketRecord::new("ETH", "Ethereum", 3500.45, 420e9, 15e9, 120e6, updated),
        MarketRecord::new("SOL", "Solana", 145.87, 68e9, 5.2e9, 465e6, updated),
        MarketRecord::new("BNB", "Binance", 600.75, 93e9, 3.5e9, 155e6, updated),
        MarketRecord::new("MATIC", "Polygon", 1.15, 10.5e9, 750e6, 9.2e9, updated),
        MarketRecord::new("ARB", "Arbitrum", 1.25, 3.95e9, 450e6, 3.15e9, updated),
    ]
}

pub fn posts() -> Vec<DiscussionPost> {
    let post = |id: &str, title: &str, body: &str, score: i64, comments: u64, created: DateTime<Utc>| {
        DiscussionPost {
            post_id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            score,
            num_comments: comments,
            created_at: created,
        }
    };

    vec![
        post(
            "mock1",
            "Bitcoin Discussion",
            "Bitcoin is the first and largest cryptocurrency by market cap, often referred to as digital gold.",
            412,
            87,
            at(2, 26, 14),
        ),
        post(
            "mock2",
            "Bitcoin vs Ethereum",
            "Comparing Bitcoin and Ethereum. Bitcoin is more of a store of value while Ethereum offers smart contract capabilities.",
            256,
            143,
            at(2, 27, 9),
        ),
        post(
            "mock3",
            "Bitcoin's Price Movement",
            "Bitcoin has been showing strong support levels after the recent halving event with institutional adoption increasing.",
            198,
            64,
            at(2, 28, 18),
        ),
        post(
            "mock4",
            "Ethereum Discussion",
            "Ethereum is a great blockchain platform with smart contracts. Gas fees dropped after the latest upgrade.",
            305,
            92,
            at(2, 25, 11),
        ),
        post(
            "mock5",
            "Solana Discussion",
            "Solana is a high-throughput blockchain platform with low fees.",
            221,
            58,
            at(2, 24, 16),
        ),
        post(
            "mock6",
            "Solana's Recent Growth",
            "Solana has seen massive adoption recently due to its high throughput and low fees.",
            174,
            41,
            at(2, 27, 20),
        ),
        post(
            "mock7",
            "Crypto regulation roundup",
            "The SEC keeps debating which tokens count as securities. Singapore and Switzerland already have clearer compliance frameworks.",
            133,
            210,
            at(2, 23, 8),
        ),
        post(
            "mock8",
            "Is home mining still worth it?",
            "After the halving, miners with older rigs are struggling. Cheap electricity and mining pools are the only way to stay profitable.",
            89,
            77,
            at(2, 22, 19),
        ),
        post(
            "mock9",
            "NFT market after the boom",
            "NFT trading volume is down, but gaming and music NFTs keep growing. Many collections moved to Polygon for cheaper minting.",
            -12,
            35,
            at(2, 21, 13),
        ),
    ]
}

pub fn dataset() -> Dataset {
    Dataset {
        market_records: market_records(),
        posts: posts(),
    }
}

/// In-memory stores loaded with the fixture dataset, posts embedded by `embedder`
pub fn mock_stores(
    embedder: &HashingEmbedder,
) -> Result<(InMemoryMarketStore, InMemoryPostStore), RagError> {
    let market = InMemoryMarketStore::from_records(market_records())?;

    let mut post_store = InMemoryPostStore::new(embedder.dimension());
    for post in posts() {
        let embedding = embedder.embed_sync(&post.to_embedding_text());
        post_store.insert(EmbeddedPost::new(post, embedding))?;
    }

    Ok((market, post_store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fixture_records_are_valid() {
        let records = market_records();
        assert_eq!(records.len(), 6);
        for record in &records {
            record.validate().unwrap();
        }
        let symbols: HashSet<_> = records.iter().map(|r| r.symbol.clone()).collect();
        assert_eq!(symbols.len(), records.len());
    }

    #[test]
    fn test_fixture_post_ids_unique() {
        let posts = posts();
        let ids: HashSet<_> = posts.iter().map(|p| p.post_id.clone()).collect();
        assert_eq!(ids.len(), posts.len());
    }

    #[test]
    fn test_mock_stores_loaded() {
        let embedder = HashingEmbedder::default();
        let (market, posts) = mock_stores(&embedder).unwrap();
        assert_eq!(market.len(), 6);
        assert_eq!(posts.len(), 9);
        assert_eq!(posts.dimension(), embedder.dimension());
    }
}
