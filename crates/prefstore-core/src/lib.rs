//! prefstore-core: crash-safe record store for server preferences
//!
//! A small key/value store where RAM is the read surface and an append-only,
//! CRC32C-checked journal provides durability.
//!
//! # Architecture
//!
//! - **Read path**: RAM hash table behind an RwLock, optionally fronted by a
//!   time-bounded [`CachedStore`]
//! - **Write path**: journal append (and fsync) first, then RAM, under one
//!   writer lock, giving atomic insert-or-update per key
//! - **Tables**: every key is prefixed with a one-byte [`TableId`] so
//!   independent preference domains share one journal
//!
//! Typed values, defaults and key sets live in the `prefstore` crate.

pub mod cache;
pub mod config;
pub mod durability;
pub mod engine;
pub mod error;
pub mod format;
pub mod journal;
pub mod record;

// Re-export key types for convenience
pub use cache::{CacheStats, CachedStore};
pub use config::Config;
pub use engine::RecordEngine;
pub use error::{StoreError, StoreResult};
pub use record::{Record, RecordStore, TableId};
