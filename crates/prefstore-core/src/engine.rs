//! Record engine: RAM table plus journal.
//!
//! **Read path**: RAM only, concurrent readers via RwLock
//! **Write path**: journal append first, then RAM, both under the writer lock
//!
//! Holding the writer lock across both steps keeps the journal order and the
//! RAM order identical for concurrent upserts of one key.

use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::StoreResult;
use crate::format::{check_limits, table_key, JournalEntry};
use crate::journal::{self, JournalWriter, JOURNAL_FILE};
use crate::record::{Record, RecordStore, TableId};

/// Record storage engine.
///
/// All methods take `&self`; share it behind an `Arc`.
pub struct RecordEngine {
    /// Table-prefixed key → value
    data: RwLock<HashMap<Vec<u8>, String>>,
    /// Writer lock; `None` for in-memory engines
    journal: Mutex<Option<JournalWriter>>,
    path: Option<PathBuf>,
    config: Config,
}

impl RecordEngine {
    /// Open or create a journal-backed engine in `path`.
    ///
    /// Replays the journal into RAM and compacts it when enough of it is
    /// superseded entries.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> StoreResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let replay = journal::replay(&path.join(JOURNAL_FILE))?;
        let data = apply(&replay.entries);
        let mut writer = JournalWriter::open(&path, &replay, config.durable_writes)?;

        if !data.is_empty() || replay.skipped > 0 {
            info!(
                recovered = data.len(),
                entries = replay.entries.len(),
                skipped = replay.skipped,
                path = %path.display(),
                "replayed preference journal"
            );
        }

        if needs_compaction(writer.entries(), data.len(), &config) {
            writer.rewrite(data.iter().map(|(k, v)| (k.as_slice(), v.as_bytes())))?;
        }

        Ok(Self {
            data: RwLock::new(data),
            journal: Mutex::new(Some(writer)),
            path: Some(path),
            config,
        })
    }

    /// Engine without a journal. Same semantics, nothing survives the process.
    pub fn in_memory(config: Config) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            journal: Mutex::new(None),
            path: None,
            config,
        }
    }

    /// Insert or update a value. Journal first; if that fails RAM is untouched.
    pub fn upsert(&self, table: TableId, key: &str, value: &str) -> StoreResult<()> {
        let stored = table_key(table, key);
        check_limits(&stored, value.as_bytes())?;

        let mut journal = self.journal.lock();
        if let Some(writer) = journal.as_mut() {
            writer.append(&stored, value.as_bytes())?;
        }
        self.data.write().insert(stored, value.to_string());
        Ok(())
    }

    /// Read a value from RAM.
    pub fn get(&self, table: TableId, key: &str) -> Option<String> {
        self.data.read().get(&table_key(table, key)).cloned()
    }

    /// All `(key, value)` pairs of a table, sorted by key.
    pub fn scan(&self, table: TableId) -> Vec<Record> {
        let data = self.data.read();
        let mut records: Vec<Record> = data
            .iter()
            .filter(|(k, _)| k.first() == Some(&table))
            .map(|(k, v)| Record::new(String::from_utf8_lossy(&k[1..]), v.clone()))
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    /// Rewrite the journal with live records only. No-op in memory.
    pub fn compact(&self) -> StoreResult<()> {
        let mut journal = self.journal.lock();
        if let Some(writer) = journal.as_mut() {
            let data = self.data.read();
            writer.rewrite(data.iter().map(|(k, v)| (k.as_slice(), v.as_bytes())))?;
        }
        Ok(())
    }

    /// Records across all tables.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Entries in the journal (0 in memory).
    pub fn journal_entries(&self) -> usize {
        self.journal.lock().as_ref().map_or(0, JournalWriter::entries)
    }

    /// Store directory, `None` in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Fold journal entries into the RAM table, last write wins.
fn apply(entries: &[JournalEntry]) -> HashMap<Vec<u8>, String> {
    let mut data = HashMap::with_capacity(entries.len());
    for entry in entries {
        if entry.key.len() < 2 || std::str::from_utf8(&entry.key[1..]).is_err() {
            warn!(len = entry.key.len(), "skipping journal entry with invalid key");
            continue;
        }
        match String::from_utf8(entry.value.clone()) {
            Ok(value) => {
                data.insert(entry.key.clone(), value);
            }
            Err(_) => warn!("skipping journal entry with non-UTF-8 value"),
        }
    }
    data
}

fn needs_compaction(entries: usize, live: usize, config: &Config) -> bool {
    if entries < config.compaction_min_entries || entries == 0 {
        return false;
    }
    let dead = entries.saturating_sub(live) as f64 / entries as f64;
    dead > config.compaction_trigger_ratio
}

impl RecordStore for RecordEngine {
    fn upsert_by_key(&self, table: TableId, record: &Record) -> StoreResult<()> {
        self.upsert(table, &record.key, &record.value)
    }

    fn find_by_key(&self, table: TableId, key: &str) -> StoreResult<Option<Record>> {
        Ok(self.get(table, key).map(|value| Record::new(key, value)))
    }

    fn find_all(&self, table: TableId) -> StoreResult<Vec<Record>> {
        Ok(self.scan(table))
    }
}

impl std::fmt::Debug for RecordEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordEngine")
            .field("path", &self.path)
            .field("records", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::format::MAX_VALUE_SIZE;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SYS: TableId = 0x01;
    const USR: TableId = 0x02;

    fn test_engine() -> (RecordEngine, TempDir) {
        let dir = TempDir::new().unwrap();
        let engine = RecordEngine::open(dir.path(), Config::ephemeral()).unwrap();
        (engine, dir)
    }

    #[test]
    fn test_open_empty() {
        let (engine, _dir) = test_engine();
        assert!(engine.is_empty());
        assert_eq!(engine.journal_entries(), 0);
        assert!(engine.path().is_some());
    }

    #[test]
    fn test_upsert_get() {
        let (engine, _dir) = test_engine();
        engine.upsert(SYS, "jwt_expires_in", "7d").unwrap();
        assert_eq!(engine.get(SYS, "jwt_expires_in"), Some("7d".to_string()));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_upsert_overwrites_in_place() {
        let (engine, _dir) = test_engine();
        engine.upsert(SYS, "k", "v1").unwrap();
        engine.upsert(SYS, "k", "v2").unwrap();
        assert_eq!(engine.get(SYS, "k"), Some("v2".to_string()));
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.journal_entries(), 2);
    }

    #[test]
    fn test_tables_are_isolated() {
        let (engine, _dir) = test_engine();
        engine.upsert(SYS, "shared", "sys").unwrap();
        engine.upsert(USR, "shared", "usr").unwrap();
        assert_eq!(engine.get(SYS, "shared"), Some("sys".to_string()));
        assert_eq!(engine.get(USR, "shared"), Some("usr".to_string()));
        assert_eq!(engine.scan(SYS).len(), 1);
    }

    #[test]
    fn test_scan_sorted() {
        let engine = RecordEngine::in_memory(Config::ephemeral());
        engine.upsert(SYS, "c", "3").unwrap();
        engine.upsert(SYS, "a", "1").unwrap();
        engine.upsert(SYS, "b", "2").unwrap();
        engine.upsert(USR, "x", "9").unwrap();

        let records = engine.scan(SYS);
        let keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_oversized_value_rejected_without_write() {
        let engine = RecordEngine::in_memory(Config::ephemeral());
        let big = "x".repeat(MAX_VALUE_SIZE + 1);
        let result = engine.upsert(SYS, "k", &big);
        assert!(matches!(result, Err(StoreError::OversizedEntry { component: "value", .. })));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_crash_recovery() {
        let dir = TempDir::new().unwrap();
        {
            let engine = RecordEngine::open(dir.path(), Config::ephemeral()).unwrap();
            engine.upsert(SYS, "jwt_secret", "s3cret").unwrap();
            engine.upsert(SYS, "jwt_expires_in", "7d").unwrap();
            engine.upsert(SYS, "jwt_expires_in", "14d").unwrap();
        }
        {
            let engine = RecordEngine::open(dir.path(), Config::ephemeral()).unwrap();
            assert_eq!(engine.get(SYS, "jwt_secret"), Some("s3cret".to_string()));
            assert_eq!(engine.get(SYS, "jwt_expires_in"), Some("14d".to_string()));
            assert_eq!(engine.len(), 2);
        }
    }

    #[test]
    fn test_open_compacts_superseded_entries() {
        let dir = TempDir::new().unwrap();
        let config = Config::ephemeral();
        {
            let engine = RecordEngine::open(dir.path(), config.clone()).unwrap();
            for i in 0..config.compaction_min_entries * 2 {
                engine.upsert(SYS, "bcrypt_strength", &i.to_string()).unwrap();
            }
        }
        let engine = RecordEngine::open(dir.path(), config.clone()).unwrap();
        assert_eq!(engine.journal_entries(), 1);
        let last = (config.compaction_min_entries * 2 - 1).to_string();
        assert_eq!(engine.get(SYS, "bcrypt_strength"), Some(last));
    }

    #[test]
    fn test_concurrent_upserts_single_record() {
        let (engine, dir) = test_engine();
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let e = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        e.upsert(SYS, "contended", &format!("{t}-{i}")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles { h.join().unwrap(); }

        assert_eq!(engine.scan(SYS).len(), 1);
        let in_ram = engine.get(SYS, "contended");
        drop(engine);

        // Journal order matches RAM order
        let reopened = RecordEngine::open(dir.path(), Config::ephemeral()).unwrap();
        assert_eq!(reopened.get(SYS, "contended"), in_ram);
    }

    #[test]
    fn test_record_store_trait() {
        let engine: Arc<dyn RecordStore> = Arc::new(RecordEngine::in_memory(Config::ephemeral()));
        engine.upsert_by_key(SYS, &Record::new("k", "v")).unwrap();
        assert_eq!(engine.find_by_key(SYS, "k").unwrap(), Some(Record::new("k", "v")));
        assert_eq!(engine.find_by_key(SYS, "missing").unwrap(), None);
        assert_eq!(engine.find_all(SYS).unwrap(), vec![Record::new("k", "v")]);
    }
}
