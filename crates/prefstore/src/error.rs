//! Error type of the preference layer
//!
//! [`PrefError`] is `Clone` because a single failed materialization is
//! reported to every caller that waited on it.

use std::sync::Arc;
use std::time::Duration;

use prefstore_core::StoreError;
use thiserror::Error;

use crate::value::ValueType;

#[derive(Debug, Clone, Error)]
pub enum PrefError {
    /// Key is not part of the preference domain
    #[error("unknown {domain} preference key `{key}`")]
    UnknownKey { domain: &'static str, key: String },

    /// Value and declared type disagree
    #[error("preference `{key}` is declared {expected} but got {found}")]
    TypeMismatch {
        key: String,
        expected: ValueType,
        /// The offending type, or a description of a malformed stored value
        found: String,
    },

    /// The record store failed
    #[error("preference storage failed: {0}")]
    Storage(#[from] StoreError),

    /// At least one key of `get_all` failed; no partial result is returned
    #[error("could not read all preferences: {failed} of {total} failed")]
    IncompletePreferences { failed: usize, total: usize },

    /// Computing or persisting a default failed
    #[error("default materialization for `{key}` failed: {reason}")]
    MaterializationFailure {
        key: String,
        reason: String,
        #[source]
        cause: Option<Arc<PrefError>>,
    },

    /// A default table was built without an entry for every key
    #[error("no default registered for {domain} preference `{key}`")]
    MissingDefault { domain: &'static str, key: &'static str },

    /// This caller stopped waiting; materialization carries on for others
    #[error("gave up waiting for preference `{key}` after {waited:?}")]
    Timeout { key: String, waited: Duration },
}

impl PrefError {
    pub(crate) fn materialization(key: impl Into<String>, cause: PrefError) -> Self {
        PrefError::MaterializationFailure {
            key: key.into(),
            reason: cause.to_string(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Text safe to show outside the process. The detailed error belongs in
    /// the log.
    pub fn public_message(&self) -> &'static str {
        match self {
            PrefError::UnknownKey { .. } | PrefError::TypeMismatch { .. } => "Invalid preference",
            PrefError::Storage(_)
            | PrefError::IncompletePreferences { .. }
            | PrefError::MaterializationFailure { .. }
            | PrefError::MissingDefault { .. }
            | PrefError::Timeout { .. } => "Could not read or write configuration",
        }
    }
}

pub type PrefResult<T> = Result<T, PrefError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_storage_cause_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = PrefError::from(StoreError::from(io));
        let source = err.source().expect("storage error keeps its cause");
        assert!(source.to_string().contains("disk gone"));
        assert_eq!(err.public_message(), "Could not read or write configuration");
    }

    #[test]
    fn test_materialization_chains_cause() {
        let cause = PrefError::TypeMismatch {
            key: "jwt_secret".into(),
            expected: ValueType::String,
            found: "number".into(),
        };
        let err = PrefError::materialization("jwt_secret", cause);
        assert!(err.to_string().contains("jwt_secret"));
        assert!(err.source().unwrap().to_string().contains("declared string"));
    }
}
