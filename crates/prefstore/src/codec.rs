//! Validation between loosely typed records and typed preferences.
//!
//! [`validate_and_unpack`] guards the read path, [`validate_pref`] the write
//! path; both fail with `TypeMismatch` instead of coercing.

use prefstore_core::Record;

use crate::error::{PrefError, PrefResult};
use crate::registry::{validate_key, PrefKey};
use crate::value::{PrefValue, ValueType};

/// A validated preference as handed to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPreference<K> {
    pub key: K,
    pub value: PrefValue,
}

impl<K: PrefKey> DecodedPreference<K> {
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }
}

/// Decode a stored string as the type declared for `key`.
pub fn decode<K: PrefKey>(key: K, raw: &str) -> PrefResult<PrefValue> {
    let expected = key.value_type();
    PrefValue::decode(raw, expected).ok_or_else(|| PrefError::TypeMismatch {
        key: key.as_str().to_string(),
        expected,
        found: format!("malformed stored value {raw:?}"),
    })
}

/// Key validation then type decode of a persisted record.
pub fn validate_and_unpack<K: PrefKey>(record: &Record) -> PrefResult<DecodedPreference<K>> {
    let key = validate_key::<K>(&record.key)?;
    let value = decode(key, &record.value)?;
    Ok(DecodedPreference { key, value })
}

/// Check that `value` has the type declared for `key`.
pub fn check_type<K: PrefKey>(key: K, value: &PrefValue) -> PrefResult<()> {
    let expected = key.value_type();
    let found = value.value_type();
    if found != expected {
        return Err(PrefError::TypeMismatch {
            key: key.as_str().to_string(),
            expected,
            found: found.to_string(),
        });
    }
    if let PrefValue::Number(n) = value {
        if !n.is_finite() {
            return Err(PrefError::TypeMismatch {
                key: key.as_str().to_string(),
                expected,
                found: format!("non-finite number {n}"),
            });
        }
    }
    Ok(())
}

/// Validate a candidate write and produce the record to persist.
pub fn validate_pref<K: PrefKey>(raw_key: &str, value: &PrefValue) -> PrefResult<(K, Record)> {
    let key = validate_key::<K>(raw_key)?;
    check_type(key, value)?;
    Ok((key, Record::new(key.as_str(), value.encode())))
}
