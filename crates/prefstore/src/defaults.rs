//! Default values for keys that have never been stored.
//!
//! A [`DefaultTable`] is built once at startup and shared with the store. It
//! refuses to build unless every key of the domain has an entry, so a
//! missing default surfaces at startup rather than on some later cold read.
//!
//! Default functions may have side effects. The store runs each at most once
//! per cold key per process; across restarts they only run again if nothing
//! was persisted the first time.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::warn;

use crate::config::{ConfiguredValues, JWT_EXPIRY_VAR, JWT_SECRET_VAR};
use crate::error::{PrefError, PrefResult};
use crate::registry::{PrefKey, SysPreference, UsrPreference};
use crate::value::PrefValue;

/// Length of a generated JWT secret
pub const GENERATED_SECRET_LEN: usize = 64;

/// Token lifetime when none is configured
pub const DEFAULT_JWT_EXPIRY: &str = "7d";

type DefaultFn = Box<dyn Fn() -> PrefValue + Send + Sync>;

/// Complete key → default function mapping for one domain.
pub struct DefaultTable<K: PrefKey> {
    entries: HashMap<K, DefaultFn>,
}

impl<K: PrefKey> DefaultTable<K> {
    pub fn builder() -> DefaultTableBuilder<K> {
        DefaultTableBuilder { entries: HashMap::new() }
    }

    /// Run the default function of `key`.
    ///
    /// Construction guarantees an entry per key; the error arm only exists
    /// to keep this path panic-free.
    pub fn compute(&self, key: K) -> PrefResult<PrefValue> {
        let default = self.entries.get(&key).ok_or(PrefError::MissingDefault {
            domain: K::DOMAIN,
            key: key.as_str(),
        })?;
        Ok(default())
    }
}

impl<K: PrefKey> fmt::Debug for DefaultTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultTable")
            .field("domain", &K::DOMAIN)
            .field("keys", &self.entries.len())
            .finish()
    }
}

pub struct DefaultTableBuilder<K: PrefKey> {
    entries: HashMap<K, DefaultFn>,
}

impl<K: PrefKey> DefaultTableBuilder<K> {
    /// Register (or replace) the default function of `key`.
    pub fn with<F>(mut self, key: K, default: F) -> Self
    where
        F: Fn() -> PrefValue + Send + Sync + 'static,
    {
        self.entries.insert(key, Box::new(default));
        self
    }

    /// Register a constant default.
    pub fn with_value(self, key: K, value: impl Into<PrefValue>) -> Self {
        let value = value.into();
        self.with(key, move || value.clone())
    }

    /// Fails with `MissingDefault` naming the first key without an entry.
    pub fn build(self) -> PrefResult<DefaultTable<K>> {
        if let Some(missing) = K::ALL.iter().find(|key| !self.entries.contains_key(*key)) {
            return Err(PrefError::MissingDefault { domain: K::DOMAIN, key: missing.as_str() });
        }
        Ok(DefaultTable { entries: self.entries })
    }
}

/// Random alphanumeric string of `len` characters.
pub fn generate_secret(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Production defaults of the server-wide domain.
pub fn sys_defaults(source: Arc<dyn ConfiguredValues>) -> PrefResult<DefaultTable<SysPreference>> {
    let secret_source = Arc::clone(&source);
    DefaultTable::builder()
        .with(SysPreference::JwtSecret, move || {
            let secret = secret_source.configured_value(JWT_SECRET_VAR).unwrap_or_else(|| {
                warn!("Since no JWT secret was provided, a random one will be generated and saved");
                generate_secret(GENERATED_SECRET_LEN)
            });
            PrefValue::String(secret)
        })
        .with(SysPreference::JwtExpiresIn, move || {
            let expiry = source
                .configured_value(JWT_EXPIRY_VAR)
                .unwrap_or_else(|| DEFAULT_JWT_EXPIRY.to_string());
            PrefValue::String(expiry)
        })
        .with_value(SysPreference::BcryptStrength, 12)
        .with_value(SysPreference::AllowGuestUploads, false)
        .build()
}

/// Production defaults of the per-account domain.
pub fn usr_defaults() -> PrefResult<DefaultTable<UsrPreference>> {
    DefaultTable::builder()
        .with_value(UsrPreference::KeepOriginal, false)
        .with_value(UsrPreference::GalleryPageSize, 24)
        .build()
}
