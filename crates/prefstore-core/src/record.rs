//! Persisted records and the store interface consumed by the preference layer.

use std::sync::Arc;

use crate::error::StoreResult;

/// Table identifier: one byte prefixed to every stored key, giving each
/// preference domain its own namespace.
pub type TableId = u8;

/// One persisted row. The value is always text; typed values are encoded
/// above this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: String,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Key/value record storage with insert-or-update semantics.
///
/// Implementations must make `upsert_by_key` atomic per `(table, key)`: two
/// concurrent upserts of the same key leave exactly one record holding one
/// of the two values, never a duplicate.
pub trait RecordStore: Send + Sync {
    /// Insert the record, or replace the value of the existing record with
    /// the same key.
    fn upsert_by_key(&self, table: TableId, record: &Record) -> StoreResult<()>;

    /// Look up a single record.
    fn find_by_key(&self, table: TableId, key: &str) -> StoreResult<Option<Record>>;

    /// Every record of `table`, sorted by key.
    fn find_all(&self, table: TableId) -> StoreResult<Vec<Record>>;
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn upsert_by_key(&self, table: TableId, record: &Record) -> StoreResult<()> {
        (**self).upsert_by_key(table, record)
    }

    fn find_by_key(&self, table: TableId, key: &str) -> StoreResult<Option<Record>> {
        (**self).find_by_key(table, key)
    }

    fn find_all(&self, table: TableId) -> StoreResult<Vec<Record>> {
        (**self).find_all(table)
    }
}
