//! One JSON-lines file per table

use std::collections::{BTreeSet, HashMap};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use super::Store;
use crate::types::NavigationRecord;
use crate::{ReaderError, Result};

/// Timestamps remembered per table for duplicate detection.
const RECENT_KEYS: usize = 64;

/// Bytes read back from the end of an existing table file on reopen.
const TAIL_BYTES: u64 = 64 * 1024;

/// Appends records to `<directory>/<table>.jsonl`.
///
/// Each line is a JSON object keyed by the storage column names. Files are
/// created on the first insert into their table. Timestamps only grow within a
/// table, so a retried insert repeats one of the latest keys: each table keeps
/// the most recent [`RECENT_KEYS`] timestamps, seeded from the tail of an
/// existing file, and skips records matching one of them.
#[derive(Debug)]
pub struct JsonLinesStore {
    directory: PathBuf,
    tables: Mutex<HashMap<String, TableFile>>,
}

#[derive(Debug)]
struct TableFile {
    file: File,
    recent: RecentKeys,
}

/// Bounded set of the latest timestamps written to a table.
#[derive(Debug, Default)]
struct RecentKeys {
    keys: BTreeSet<i64>,
}

impl RecentKeys {
    fn contains(&self, key: i64) -> bool {
        self.keys.contains(&key)
    }

    fn insert(&mut self, key: i64) {
        self.keys.insert(key);
        while self.keys.len() > RECENT_KEYS {
            self.keys.pop_first();
        }
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl JsonLinesStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into(), tables: Mutex::new(HashMap::new()) }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.directory.join(format!("{}.jsonl", table))
    }

    async fn open_table(&self, table: &str) -> Result<TableFile> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| ReaderError::file_error(&self.directory, e))?;

        let path = self.table_path(table);
        let recent = load_recent_keys(&path).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ReaderError::file_error(&path, e))?;

        if recent.is_empty() {
            info!("Created table {}", table);
        } else {
            debug!("Reopened table {} with {} recent records", table, recent.len());
        }
        Ok(TableFile { file, recent })
    }
}

async fn load_recent_keys(path: &Path) -> Result<RecentKeys> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RecentKeys::default()),
        Err(e) => return Err(ReaderError::file_error(path, e)),
    };

    let len = file.metadata().await.map_err(|e| ReaderError::file_error(path, e))?.len();
    let start = len.saturating_sub(TAIL_BYTES);
    file.seek(SeekFrom::Start(start)).await.map_err(|e| ReaderError::file_error(path, e))?;

    let mut lines = BufReader::new(file).lines();
    if start > 0 {
        // Partial line cut by the seek.
        lines.next_line().await.map_err(|e| ReaderError::file_error(path, e))?;
    }

    let mut recent = RecentKeys::default();
    while let Some(line) = lines.next_line().await.map_err(|e| ReaderError::file_error(path, e))? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<NavigationRecord>(&line) {
            Ok(record) => recent.insert(record.unix_ts),
            Err(e) => warn!("Skipping unreadable line in {}: {}", path.display(), e),
        }
    }
    Ok(recent)
}

#[async_trait::async_trait]
impl Store for JsonLinesStore {
    async fn store(&self, table: &str, record: &NavigationRecord) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.contains_key(table) {
            let opened = self.open_table(table).await?;
            tables.insert(table.to_string(), opened);
        }
        let Some(entry) = tables.get_mut(table) else {
            return Err(ReaderError::storage_failed(table, "table handle missing after open"));
        };

        if entry.recent.contains(record.unix_ts) {
            trace!("Duplicate {} in {}, ignored", record.unix_ts, table);
            return Ok(());
        }

        let mut line = serde_json::to_vec(record).map_err(|e| {
            ReaderError::storage_failed_with_source(table, "serialize record", Box::new(e))
        })?;
        line.push(b'\n');

        entry.file.write_all(&line).await.map_err(|e| {
            ReaderError::storage_failed_with_source(table, "append record", Box::new(e))
        })?;
        entry.recent.insert(record.unix_ts);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut tables = self.tables.lock().await;
        for (name, table) in tables.iter_mut() {
            table.file.flush().await.map_err(|e| {
                ReaderError::storage_failed_with_source(name.as_str(), "flush", Box::new(e))
            })?;
            table.file.sync_all().await.map_err(|e| {
                ReaderError::storage_failed_with_source(name.as_str(), "sync", Box::new(e))
            })?;
        }
        debug!("Closed {} tables in {}", tables.len(), self.directory.display());
        tables.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sample_record;
    use crate::types::{COLUMNS, PRIMARY_KEY};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ublox-store-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn appends_one_line_per_record_with_column_names() {
        let dir = scratch_dir("append");
        let store = JsonLinesStore::new(&dir);

        store.store("2020_ITA_18", &sample_record(1, 18)).await.unwrap();
        store.store("2020_ITA_18", &sample_record(2, 18)).await.unwrap();
        store.store("2020_ITA_18", &sample_record(2, 18)).await.unwrap();
        store.close().await.unwrap();

        let rows = read_lines(&store.table_path("2020_ITA_18"));
        assert_eq!(rows.len(), 2);
        for column in COLUMNS {
            assert!(rows[0].get(column).is_some(), "missing column {}", column);
        }
        assert_eq!(rows[1][PRIMARY_KEY], 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn reopened_table_skips_known_timestamps() {
        let dir = scratch_dir("reopen");

        let first = JsonLinesStore::new(&dir);
        first.store("2020_ITA_7", &sample_record(10, 7)).await.unwrap();
        first.close().await.unwrap();

        let second = JsonLinesStore::new(&dir);
        second.store("2020_ITA_7", &sample_record(10, 7)).await.unwrap();
        second.store("2020_ITA_7", &sample_record(11, 7)).await.unwrap();
        second.close().await.unwrap();

        let rows = read_lines(&second.table_path("2020_ITA_7"));
        assert_eq!(rows.len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn recent_keys_keep_only_the_latest_timestamps() {
        let mut recent = RecentKeys::default();
        for ts in 0..(RECENT_KEYS as i64 * 3) {
            recent.insert(ts);
        }
        assert_eq!(recent.len(), RECENT_KEYS);
        assert!(!recent.contains(0));
        assert!(recent.contains(RECENT_KEYS as i64 * 3 - 1));
        assert!(recent.contains(RECENT_KEYS as i64 * 2));
    }

    #[tokio::test]
    async fn long_table_reopens_from_its_tail() {
        let dir = scratch_dir("tail");
        let table = "2020_ITA_3";
        let total = 1_000i64;

        let first = JsonLinesStore::new(&dir);
        for ts in 0..total {
            first.store(table, &sample_record(ts, 3)).await.unwrap();
        }
        first.close().await.unwrap();
        assert!(std::fs::metadata(first.table_path(table)).unwrap().len() > TAIL_BYTES);

        let second = JsonLinesStore::new(&dir);
        second.store(table, &sample_record(total - 1, 3)).await.unwrap();
        second.store(table, &sample_record(total, 3)).await.unwrap();
        {
            let tables = second.tables.lock().await;
            assert_eq!(tables[table].recent.len(), RECENT_KEYS);
        }
        second.close().await.unwrap();

        let rows = read_lines(&second.table_path(table));
        assert_eq!(rows.len(), total as usize + 1);
        assert_eq!(rows[total as usize][PRIMARY_KEY], total);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn tables_map_to_separate_files() {
        let dir = scratch_dir("split");
        let store = JsonLinesStore::new(&dir);

        store.store("2020_ITA_18", &sample_record(1, 18)).await.unwrap();
        store.store("2020_ITA_7", &sample_record(1, 7)).await.unwrap();
        store.close().await.unwrap();

        assert!(store.table_path("2020_ITA_18").exists());
        assert!(store.table_path("2020_ITA_7").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
