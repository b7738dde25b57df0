use crate::error::RagError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest market metrics for one tracked asset. One row per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    // ═══════════════════════════════════════════════════
    // IDENTIFICATION
    // ═══════════════════════════════════════════════════
    pub symbol: String, // Unique key, stored upper-case (e.g. "BTC")
    pub name: String,   // Display name (e.g. "Bitcoin")

    // ═══════════════════════════════════════════════════
    // METRICS (USD)
    // ═══════════════════════════════════════════════════
    pub price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub circulating_supply: f64,

    pub last_updated: DateTime<Utc>,
}

impl MarketRecord {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        price: f64,
        market_cap: f64,
        volume_24h: f64,
        circulating_supply: f64,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into().trim().to_uppercase(),
            name: name.into().trim().to_string(),
            price,
            market_cap,
            volume_24h,
            circulating_supply,
            last_updated,
        }
    }

    /// Check the row invariants enforced at ingestion time
    pub fn validate(&self) -> Result<(), RagError> {
        if self.symbol.trim().is_empty() {
            return Err(RagError::InvalidRecord("symbol must not be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(RagError::InvalidRecord(format!(
                "{}: name must not be empty",
                self.symbol
            )));
        }

        let metrics = [
            ("price", self.price),
            ("market_cap", self.market_cap),
            ("volume_24h", self.volume_24h),
            ("circulating_supply", self.circulating_supply),
        ];
        for (field, value) in metrics {
            if !value.is_finite() || value < 0.0 {
                return Err(RagError::InvalidRecord(format!(
                    "{}: {} must be a non-negative number, got {}",
                    self.symbol, field, value
                )));
            }
        }

        Ok(())
    }

    /// Key used by exact-match stores
    pub fn key(&self) -> String {
        self.symbol.to_uppercase()
    }

    pub fn asset_key(&self) -> AssetKey {
        AssetKey {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
        }
    }

    /// A refresh may replace this row only if it is not older
    pub fn can_be_refreshed_by(&self, incoming: &MarketRecord) -> bool {
        incoming.last_updated >= self.last_updated
    }
}

/// Symbol/name pair enumerated by a structured store for query matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetKey {
    pub symbol: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bitcoin() -> MarketRecord {
        MarketRecord::new(
            "btc",
            "Bitcoin",
            65000.25,
            1_250_000_000_000.0,
            30_000_000_000.0,
            19_500_000.0,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_symbol_is_normalized() {
        let record = bitcoin();
        assert_eq!(record.symbol, "BTC");
        assert_eq!(record.key(), "BTC");
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_negative_metrics_rejected() {
        let mut record = bitcoin();
        record.volume_24h = -1.0;
        let err = record.validate().unwrap_err();
        assert!(err.to_string().contains("volume_24h"));

        let mut record = bitcoin();
        record.price = f64::NAN;
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_refresh_must_not_go_backwards() {
        let current = bitcoin();
        let mut older = bitcoin();
        older.last_updated = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let mut newer = bitcoin();
        newer.last_updated = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();

        assert!(!current.can_be_refreshed_by(&older));
        assert!(current.can_be_refreshed_by(&newer));
        assert!(current.can_be_refreshed_by(&current.clone()));
    }
}
