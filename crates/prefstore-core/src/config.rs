//! Configuration management for the record store
//!
//! Provides presets for persistent servers and throwaway stores, plus
//! validation for hand-built configurations.

use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Record store configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Sync each journal append to persistent media before acknowledging it
    pub durable_writes: bool,
    /// How long a found record may be served from the read cache
    pub cache_ttl: Duration,
    /// Compact the journal on open when dead entries exceed this ratio
    pub compaction_trigger_ratio: f64,
    /// Journals with fewer entries than this are never compacted
    pub compaction_min_entries: usize,
}

impl Config {
    /// Long-running server: every write is durable, reads may be up to a
    /// minute stale.
    pub fn server() -> Self {
        Self {
            durable_writes: true,
            cache_ttl: Duration::from_secs(60),
            compaction_trigger_ratio: 0.5,
            compaction_min_entries: 64,
        }
    }

    /// Tests and short-lived tools: no fsync, one-second cache.
    pub fn ephemeral() -> Self {
        Self {
            durable_writes: false,
            cache_ttl: Duration::from_secs(1),
            compaction_trigger_ratio: 0.5,
            compaction_min_entries: 16,
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StoreResult<()> {
        if self.cache_ttl > Duration::from_secs(3600) {
            return Err(StoreError::InvalidConfig("cache_ttl must be <= 1h".into()));
        }
        if self.compaction_trigger_ratio <= 0.0 || self.compaction_trigger_ratio >= 1.0 {
            return Err(StoreError::InvalidConfig(
                "compaction_trigger_ratio must be in (0.0, 1.0)".into(),
            ));
        }
        if self.compaction_min_entries == 0 {
            return Err(StoreError::InvalidConfig("compaction_min_entries must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self { Self::server() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_valid() {
        assert!(Config::server().validate().is_ok());
        assert!(Config::ephemeral().validate().is_ok());
    }

    #[test]
    fn test_server_cache_window_is_one_minute() {
        assert_eq!(Config::default().cache_ttl, Duration::from_secs(60));
        assert!(Config::default().durable_writes);
    }

    #[test]
    fn test_bad_ratio_rejected() {
        let mut config = Config::server();
        config.compaction_trigger_ratio = 1.0;
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));
    }
}
