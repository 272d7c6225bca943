//! Error types for record store operations
//!
//! Every failure of the journal, the RAM table or the cache is reported as a
//! [`StoreError`]. The enum is `Clone` so a single failure can be handed to
//! several waiting callers.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Record store error types with detailed context
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O operation failed
    #[error("I/O error{}: {message} ({kind})", in_path(.path))]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
        /// The original error, shared so the enum stays `Clone`
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Journal content is structurally invalid at the given offset
    #[error("journal corrupted in {} at offset {offset}: {reason}", .path.display())]
    JournalCorrupted {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    /// CRC32C of an entry payload does not match its header
    #[error("checksum mismatch in {} at offset {offset}: expected 0x{expected:08x}, got 0x{actual:08x}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: u32,
        actual: u32,
        offset: u64,
    },

    /// Entry header promises more bytes than are available
    #[error("torn write in {} at offset {offset}: expected {expected_size} bytes, only {available_bytes} available", .path.display())]
    TornWrite {
        path: PathBuf,
        expected_size: u32,
        available_bytes: u64,
        offset: u64,
    },

    /// Key or value exceeds the journal entry limits
    #[error("entry {component} too large: {entry_size} bytes exceeds limit of {max_size} bytes")]
    OversizedEntry {
        entry_size: u64,
        max_size: u64,
        /// `"key"` or `"value"`
        component: &'static str,
    },

    /// Magic bytes not found where an entry should start
    #[error("magic bytes not found in {} at offset {offset}: found {:02x}{:02x}{:02x}{:02x}",
        .path.display(), .found_bytes[0], .found_bytes[1], .found_bytes[2], .found_bytes[3])]
    NoMagicFound {
        path: PathBuf,
        offset: u64,
        found_bytes: [u8; 4],
    },

    /// A configuration parameter is out of range
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Wrap an I/O error with the file it happened on and what was attempted.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error, action: &str) -> Self {
        StoreError::Io {
            path: Some(path.into()),
            kind: err.kind(),
            message: format!("{action}: {err}"),
            source: Arc::new(err),
        }
    }
}

/// Convert std::io::Error to StoreError::Io
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
            source: Arc::new(err),
        }
    }
}

fn in_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

/// Result type alias for record store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::ChecksumMismatch {
            path: PathBuf::from("/tmp/prefs.journal"),
            expected: 0x12345678,
            actual: 0x87654321,
            offset: 1024,
        };

        let display = err.to_string();
        assert!(display.contains("checksum mismatch"));
        assert!(display.contains("0x12345678"));
        assert!(display.contains("0x87654321"));
    }

    #[test]
    fn test_io_display_with_and_without_path() {
        let denied = || std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let with_path = StoreError::io("/var/lib/prefs", denied(), "open journal");
        assert!(with_path.to_string().contains("in /var/lib/prefs"));
        assert!(with_path.to_string().contains("open journal"));

        let without: StoreError = denied().into();
        assert!(without.to_string().starts_with("I/O error: denied"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();

        match store_err {
            StoreError::Io { kind, .. } => assert_eq!(kind, std::io::ErrorKind::NotFound),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_io_cause_preserved() {
        use std::error::Error as _;

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = StoreError::io("/var/lib/prefs", io_err, "journal write failed");
        let source = err.source().expect("I/O error keeps its cause");
        assert_eq!(source.to_string(), "disk gone");

        let io = source.downcast_ref::<Arc<std::io::Error>>().expect("cause is the io::Error");
        assert_eq!(io.kind(), std::io::ErrorKind::Other);
        assert!(err.clone().source().is_some());
    }
}
