//! Storage collaborators
//!
//! The pipeline hands every decoded record to a [`Store`] together with the
//! table it belongs to. Stores create tables lazily and key them on the unix
//! timestamp, so storing the same record twice is harmless.

mod jsonl;

pub use jsonl::JsonLinesStore;

use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::Result;
use crate::types::NavigationRecord;

/// Async sink for navigation records.
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    /// Insert `record` into `table`, creating the table if needed.
    async fn store(&self, table: &str, record: &NavigationRecord) -> Result<()>;

    /// Flush and release resources. Called once after the last `store`.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory store keyed like the on-disk tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, BTreeMap<i64, NavigationRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table names, sorted.
    pub async fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Records of one table in timestamp order.
    pub async fn records(&self, table: &str) -> Vec<NavigationRecord> {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Total records across all tables.
    pub async fn len(&self) -> usize {
        self.tables.lock().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn store(&self, table: &str, record: &NavigationRecord) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table.to_string()).or_insert_with(|| {
            debug!("Created table {}", table);
            BTreeMap::new()
        });
        if rows.contains_key(&record.unix_ts) {
            trace!("Duplicate {} in {}, ignored", record.unix_ts, table);
        } else {
            rows.insert(record.unix_ts, record.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_record(unix_ts: i64, sv_id: u8) -> NavigationRecord {
    use crate::types::AUTHENTICITY_UNRESOLVED;

    NavigationRecord {
        reception_time: unix_ts + 3,
        unix_ts,
        gal_tow: 379_328,
        gal_wno: 1073,
        leap_s: 18,
        raw_hex: "0213".to_string(),
        galileo_data: "0776".to_string(),
        auth_bits: 0,
        sv_id,
        num_words: 9,
        ck_b: 124,
        ck_a: 74,
        time_ck_a: 163,
        time_ck_b: 239,
        authenticity: AUTHENTICITY_UNRESOLVED,
        galileo_ts: 649_329_725,
    }
}
