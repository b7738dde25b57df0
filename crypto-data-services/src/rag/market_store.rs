use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use crypto_core::{AssetKey, MarketRecord};
use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use std::path::Path;

use super::stores::{MarketStore, UpsertOutcome};

const DB_NAME: &str = "market_records";
const MAP_SIZE: usize = 64 * 1024 * 1024;

/// LMDB-backed market table.
///
/// Database structure:
/// - market_records: one row per asset
///
/// Key format: upper-case symbol (e.g. "BTC")
/// Value format: JSON serialized [`MarketRecord`]
pub struct LmdbMarketStore {
    env: Environment,
    db: Database,
}

impl LmdbMarketStore {
    /// Open (creating if needed) the environment at `db_path`
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();

        std::fs::create_dir_all(db_path)
            .with_context(|| format!("Failed to create LMDB directory {}", db_path.display()))?;

        tracing::info!("Opening LMDB market store at: {}", db_path.display());

        let env = Environment::new()
            .set_max_dbs(4)
            .set_map_size(MAP_SIZE)
            .open(db_path)
            .context("Failed to open LMDB environment")?;

        let db = env
            .create_db(Some(DB_NAME), DatabaseFlags::empty())
            .context("Failed to open market_records database")?;

        Ok(Self { env, db })
    }

    fn make_key(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    /// Insert or refresh a row. Older refreshes are skipped.
    pub fn upsert(&self, record: &MarketRecord) -> Result<UpsertOutcome> {
        record.validate()?;
        let key = Self::make_key(&record.symbol);

        let mut txn = self
            .env
            .begin_rw_txn()
            .context("Failed to begin write transaction")?;

        let existing: Option<MarketRecord> = match txn.get(self.db, &key) {
            Ok(bytes) => Some(
                serde_json::from_slice(bytes).context("Failed to deserialize market record")?,
            ),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(anyhow!("LMDB read error: {}", e)),
        };

        let outcome = match &existing {
            Some(current) if !current.can_be_refreshed_by(record) => {
                tracing::warn!(
                    "Skipping stale refresh for {}: stored {} is newer than {}",
                    key,
                    current.last_updated,
                    record.last_updated
                );
                txn.abort();
                return Ok(UpsertOutcome::Stale);
            }
            Some(_) => UpsertOutcome::Refreshed,
            None => UpsertOutcome::Inserted,
        };

        let bytes = serde_json::to_vec(record)?;
        txn.put(self.db, &key, &bytes, WriteFlags::empty())
            .context("Failed to write market record")?;
        txn.commit().context("Failed to commit market record")?;

        tracing::debug!("Upserted {} ({:?})", key, outcome);
        Ok(outcome)
    }

    fn get(&self, key: &str) -> Result<Option<MarketRecord>> {
        let txn = self
            .env
            .begin_ro_txn()
            .context("Failed to begin read transaction")?;

        match txn.get(self.db, &key) {
            Ok(bytes) => {
                let record = serde_json::from_slice(bytes)
                    .context("Failed to deserialize market record")?;
                Ok(Some(record))
            }
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(anyhow!("LMDB read error: {}", e)),
        }
    }

    /// All rows in key order
    pub fn records(&self) -> Result<Vec<MarketRecord>> {
        let txn = self
            .env
            .begin_ro_txn()
            .context("Failed to begin read transaction")?;

        let mut records = Vec::new();
        {
            let mut cursor = txn
                .open_ro_cursor(self.db)
                .context("Failed to open LMDB cursor")?;
            for (_key, value) in cursor.iter() {
                let record: MarketRecord = serde_json::from_slice(value)
                    .context("Failed to deserialize market record")?;
                records.push(record);
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl MarketStore for LmdbMarketStore {
    async fn asset_keys(&self) -> Result<Vec<AssetKey>> {
        Ok(self.records()?.iter().map(MarketRecord::asset_key).collect())
    }

    async fn lookup_by_symbol_or_name(&self, text: &str) -> Result<Option<MarketRecord>> {
        if let Some(record) = self.get(&Self::make_key(text))? {
            return Ok(Some(record));
        }

        let needle = text.trim();
        Ok(self
            .records()?
            .into_iter()
            .find(|r| r.name.eq_ignore_ascii_case(needle)))
    }
}
