//! Time-bounded read cache in front of a [`RecordStore`].
//!
//! Found records are served from memory for up to `ttl`. Misses are never
//! cached, so a record written by another caller becomes visible on the next
//! lookup. Upserts go through to the inner store and drop the cached copy,
//! so the next read fetches the new value.
//!
//! Every upsert and invalidation bumps a write epoch. A reader only caches
//! what it fetched if the epoch is unchanged since before its inner read, so
//! a slow read never replaces a newer value written meanwhile. Concurrent
//! upserts never race on the cache since neither inserts into it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::error::StoreResult;
use crate::format::table_key;
use crate::record::{Record, RecordStore, TableId};

/// Hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct Slots {
    records: HashMap<Vec<u8>, (Instant, Record)>,
    /// Bumped under the lock by every write through the cache
    epoch: u64,
}

pub struct CachedStore<S> {
    inner: S,
    ttl: Duration,
    slots: Mutex<Slots>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: RecordStore> CachedStore<S> {
    /// Wrap `inner`; a zero `ttl` disables caching.
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            slots: Mutex::new(Slots::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Drop one cached record.
    pub fn invalidate(&self, table: TableId, key: &str) {
        let mut slots = self.slots.lock();
        slots.epoch += 1;
        slots.records.remove(&table_key(table, key));
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Cache records read from the inner store, unless a write went
    /// through since `epoch`.
    fn remember_read(&self, table: TableId, records: &[Record], epoch: u64) {
        if self.ttl.is_zero() || records.is_empty() {
            return;
        }
        let mut slots = self.slots.lock();
        if slots.epoch != epoch {
            return;
        }
        let now = Instant::now();
        for record in records {
            slots.records.insert(table_key(table, &record.key), (now, record.clone()));
        }
    }

    fn epoch(&self) -> u64 {
        self.slots.lock().epoch
    }
}

impl<S: RecordStore> RecordStore for CachedStore<S> {
    fn upsert_by_key(&self, table: TableId, record: &Record) -> StoreResult<()> {
        self.inner.upsert_by_key(table, record)?;
        self.invalidate(table, &record.key);
        Ok(())
    }

    fn find_by_key(&self, table: TableId, key: &str) -> StoreResult<Option<Record>> {
        let epoch = {
            let mut slots = self.slots.lock();
            if !self.ttl.is_zero() {
                let cache_key = table_key(table, key);
                let cached = slots
                    .records
                    .get(&cache_key)
                    .map(|(stored_at, record)| (stored_at.elapsed() < self.ttl, record.clone()));
                match cached {
                    Some((true, record)) => {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(Some(record));
                    }
                    Some((false, _)) => {
                        slots.records.remove(&cache_key);
                    }
                    None => {}
                }
            }
            slots.epoch
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        let found = self.inner.find_by_key(table, key)?;
        if let Some(record) = &found {
            self.remember_read(table, std::slice::from_ref(record), epoch);
        }
        Ok(found)
    }

    fn find_all(&self, table: TableId) -> StoreResult<Vec<Record>> {
        let epoch = self.epoch();
        let records = self.inner.find_all(table)?;
        self.remember_read(table, &records, epoch);
        Ok(records)
    }
}
