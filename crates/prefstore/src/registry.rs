//! Preference key registry.
//!
//! Each preference domain is a closed enum. Its variants, their storage
//! names and their value types are fixed at compile time; the string form is
//! only used at the boundary (callers, records).

use std::fmt;
use std::hash::Hash;

use prefstore_core::TableId;

use crate::error::{PrefError, PrefResult};
use crate::value::ValueType;

/// A key of one preference domain.
pub trait PrefKey: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Domain name used in errors and logs
    const DOMAIN: &'static str;
    /// Record store table holding this domain
    const TABLE: TableId;
    /// Every key, in declaration order
    const ALL: &'static [Self];

    /// Storage name of the key
    fn as_str(self) -> &'static str;

    fn value_type(self) -> ValueType;
}

/// Resolve `raw` to a key of domain `K`.
pub fn validate_key<K: PrefKey>(raw: &str) -> PrefResult<K> {
    K::ALL
        .iter()
        .copied()
        .find(|key| key.as_str() == raw)
        .ok_or_else(|| PrefError::UnknownKey { domain: K::DOMAIN, key: raw.to_string() })
}

/// Declared type of `raw` in domain `K`, `None` for unknown keys.
pub fn type_of<K: PrefKey>(raw: &str) -> Option<ValueType> {
    validate_key::<K>(raw).ok().map(PrefKey::value_type)
}

/// Server-wide preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SysPreference {
    /// HMAC secret for session tokens
    JwtSecret,
    /// Token lifetime, e.g. `"7d"`
    JwtExpiresIn,
    /// Password hashing cost
    BcryptStrength,
    AllowGuestUploads,
}

impl PrefKey for SysPreference {
    const DOMAIN: &'static str = "sys";
    const TABLE: TableId = 0x01;
    const ALL: &'static [Self] = &[
        SysPreference::JwtSecret,
        SysPreference::JwtExpiresIn,
        SysPreference::BcryptStrength,
        SysPreference::AllowGuestUploads,
    ];

    fn as_str(self) -> &'static str {
        match self {
            SysPreference::JwtSecret => "jwt_secret",
            SysPreference::JwtExpiresIn => "jwt_expires_in",
            SysPreference::BcryptStrength => "bcrypt_strength",
            SysPreference::AllowGuestUploads => "allow_guest_uploads",
        }
    }

    fn value_type(self) -> ValueType {
        match self {
            SysPreference::JwtSecret | SysPreference::JwtExpiresIn => ValueType::String,
            SysPreference::BcryptStrength => ValueType::Number,
            SysPreference::AllowGuestUploads => ValueType::Boolean,
        }
    }
}

impl fmt::Display for SysPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-account preference defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsrPreference {
    /// Keep the uploaded original next to converted derivatives
    KeepOriginal,
    GalleryPageSize,
}

impl PrefKey for UsrPreference {
    const DOMAIN: &'static str = "usr";
    const TABLE: TableId = 0x02;
    const ALL: &'static [Self] = &[UsrPreference::KeepOriginal, UsrPreference::GalleryPageSize];

    fn as_str(self) -> &'static str {
        match self {
            UsrPreference::KeepOriginal => "keep_original",
            UsrPreference::GalleryPageSize => "gallery_page_size",
        }
    }

    fn value_type(self) -> ValueType {
        match self {
            UsrPreference::KeepOriginal => ValueType::Boolean,
            UsrPreference::GalleryPageSize => ValueType::Number,
        }
    }
}

impl fmt::Display for UsrPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_known_keys() {
        assert_eq!(validate_key::<SysPreference>("jwt_secret").unwrap(), SysPreference::JwtSecret);
        assert_eq!(
            validate_key::<UsrPreference>("keep_original").unwrap(),
            UsrPreference::KeepOriginal
        );
    }

    #[test]
    fn test_unknown_key() {
        let err = validate_key::<SysPreference>("not_a_real_key").unwrap_err();
        assert!(matches!(err, PrefError::UnknownKey { domain: "sys", ref key } if key == "not_a_real_key"));
    }

    #[test]
    fn test_domains_are_disjoint() {
        assert!(validate_key::<UsrPreference>("jwt_secret").is_err());
        assert!(validate_key::<SysPreference>("keep_original").is_err());
        assert_ne!(SysPreference::TABLE, UsrPreference::TABLE);
    }

    #[test]
    fn test_type_of() {
        assert_eq!(type_of::<SysPreference>("jwt_expires_in"), Some(ValueType::String));
        assert_eq!(type_of::<SysPreference>("bcrypt_strength"), Some(ValueType::Number));
        assert_eq!(type_of::<SysPreference>("allow_guest_uploads"), Some(ValueType::Boolean));
        assert_eq!(type_of::<SysPreference>("nope"), None);
    }

    #[test]
    fn test_storage_names_unique() {
        let mut names: Vec<&str> = SysPreference::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SysPreference::ALL.len());
    }
}
