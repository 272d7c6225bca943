//! The preference store facade.
//!
//! Reads are total: a key that was never written is materialized from the
//! [`DefaultTable`], persisted, and returned. Concurrent cold reads of one
//! key share a single materialization (see [`crate::flight`]).

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use prefstore_core::{CachedStore, Record, RecordEngine, RecordStore};
use tracing::{debug, error, info, warn};

use crate::codec::{check_type, decode, validate_and_unpack, validate_pref, DecodedPreference};
use crate::config::StoreOptions;
use crate::defaults::DefaultTable;
use crate::error::{PrefError, PrefResult};
use crate::flight::{Probe, SingleFlight};
use crate::registry::{validate_key, PrefKey, SysPreference, UsrPreference};
use crate::value::{PrefValue, ValueType};

pub type SysPreferenceStore = PreferenceStore<SysPreference>;
pub type UsrPreferenceStore = PreferenceStore<UsrPreference>;

/// Record store for a preference layer on top of `engine`: the engine
/// fronted by a read cache with the engine's configured TTL.
pub fn cached_records(engine: Arc<RecordEngine>) -> Arc<dyn RecordStore> {
    let ttl = engine.config().cache_ttl;
    Arc::new(CachedStore::new(engine, ttl))
}

struct Inner<K: PrefKey> {
    records: Arc<dyn RecordStore>,
    defaults: Arc<DefaultTable<K>>,
    options: StoreOptions,
}

impl<K: PrefKey> Inner<K> {
    fn fetch(&self, key: K) -> PrefResult<Probe<DecodedPreference<K>>> {
        match self.records.find_by_key(K::TABLE, key.as_str())? {
            Some(record) => Ok(Probe::Found(validate_and_unpack::<K>(&record)?)),
            None => Ok(Probe::Miss),
        }
    }

    fn persist(&self, key: K, record: &Record, value: PrefValue) -> PrefResult<DecodedPreference<K>> {
        self.records.upsert_by_key(K::TABLE, record)?;
        Ok(DecodedPreference { key, value })
    }

    /// Compute, check and persist the default of `key`. Any failure is
    /// reported as `MaterializationFailure`.
    fn materialize(&self, key: K) -> PrefResult<DecodedPreference<K>> {
        let outcome = self.defaults.compute(key).and_then(|value| {
            check_type(key, &value)?;
            let record = Record::new(key.as_str(), value.encode());
            self.persist(key, &record, value)
        });

        match outcome {
            Ok(pref) => {
                info!(domain = K::DOMAIN, key = %key, "stored default preference");
                Ok(pref)
            }
            Err(e) => {
                error!(domain = K::DOMAIN, key = %key, error = %e, "could not materialize default");
                Err(PrefError::materialization(key.as_str(), e))
            }
        }
    }
}

/// Typed get/set over one preference domain.
///
/// Cheap to clone; clones share the record store and the in-flight
/// materializations.
pub struct PreferenceStore<K: PrefKey> {
    inner: Arc<Inner<K>>,
    flights: SingleFlight<K, DecodedPreference<K>>,
}

impl<K: PrefKey> Clone for PreferenceStore<K> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), flights: self.flights.clone() }
    }
}

impl<K: PrefKey> fmt::Debug for PreferenceStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("domain", &K::DOMAIN)
            .field("options", &self.inner.options)
            .field("in_flight", &self.flights.in_flight())
            .finish()
    }
}

impl<K: PrefKey> PreferenceStore<K> {
    pub fn new(records: Arc<dyn RecordStore>, defaults: Arc<DefaultTable<K>>) -> Self {
        Self::with_options(records, defaults, StoreOptions::default())
    }

    pub fn with_options(
        records: Arc<dyn RecordStore>,
        defaults: Arc<DefaultTable<K>>,
        options: StoreOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner { records, defaults, options }),
            flights: SingleFlight::new(K::DOMAIN),
        }
    }

    /// Read `key`, materializing its default on first access.
    pub fn get_preference(&self, key: &str) -> PrefResult<DecodedPreference<K>> {
        let key = validate_key::<K>(key)?;
        self.get(key)
    }

    /// Typed-key variant of [`get_preference`](Self::get_preference).
    pub fn get(&self, key: K) -> PrefResult<DecodedPreference<K>> {
        let reader = Arc::clone(&self.inner);
        let writer = Arc::clone(&self.inner);
        self.flights.run(
            key,
            move || reader.fetch(key),
            move || writer.materialize(key),
            self.inner.options.materialize_wait,
        )
    }

    /// Validate and store `value` under `key`. Nothing is written when
    /// validation fails.
    pub fn set_preference(
        &self,
        key: &str,
        value: impl Into<PrefValue>,
    ) -> PrefResult<DecodedPreference<K>> {
        let value = value.into();
        let (key, record) = validate_pref::<K>(key, &value)?;
        let pref = self.inner.persist(key, &record, value)?;
        debug!(domain = K::DOMAIN, key = %key, "preference updated");
        Ok(pref)
    }

    /// Typed-key variant of [`set_preference`](Self::set_preference).
    pub fn set(&self, key: K, value: impl Into<PrefValue>) -> PrefResult<DecodedPreference<K>> {
        self.set_preference(key.as_str(), value)
    }

    /// Every key of the domain in declaration order.
    ///
    /// Stored records are fetched in one batch; missing keys are
    /// materialized. If any key fails, each failure is logged and the whole
    /// call fails with `IncompletePreferences`.
    pub fn get_all_preferences(&self) -> PrefResult<Vec<DecodedPreference<K>>> {
        let total = K::ALL.len();
        let stored = match self.inner.records.find_all(K::TABLE) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(domain = K::DOMAIN, error = %e, "could not list preferences");
                return Err(PrefError::IncompletePreferences { failed: total, total });
            }
        };
        let by_key: HashMap<&str, &str> =
            stored.iter().map(|r| (r.key.as_str(), r.value.as_str())).collect();

        let mut prefs = Vec::with_capacity(total);
        let mut failed = 0;
        for &key in K::ALL {
            let result = match by_key.get(key.as_str()) {
                Some(raw) => decode(key, raw).map(|value| DecodedPreference { key, value }),
                None => self.get(key),
            };
            match result {
                Ok(pref) => prefs.push(pref),
                Err(e) => {
                    warn!(domain = K::DOMAIN, key = %key, error = %e, "could not read preference");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(PrefError::IncompletePreferences { failed, total });
        }
        Ok(prefs)
    }

    pub fn get_string(&self, key: &str) -> PrefResult<String> {
        let pref = self.get_preference(key)?;
        match pref.value {
            PrefValue::String(s) => Ok(s),
            other => Err(drift(pref.key, ValueType::String, &other)),
        }
    }

    pub fn get_number(&self, key: &str) -> PrefResult<f64> {
        let pref = self.get_preference(key)?;
        match pref.value {
            PrefValue::Number(n) => Ok(n),
            other => Err(drift(pref.key, ValueType::Number, &other)),
        }
    }

    pub fn get_boolean(&self, key: &str) -> PrefResult<bool> {
        let pref = self.get_preference(key)?;
        match pref.value {
            PrefValue::Boolean(b) => Ok(b),
            other => Err(drift(pref.key, ValueType::Boolean, &other)),
        }
    }

    /// Materializations started by this store and its clones.
    pub fn materializations(&self) -> u64 {
        self.flights.episodes()
    }
}

/// The accessor's pinned type disagrees with the value read.
fn drift<K: PrefKey>(key: K, expected: ValueType, found: &PrefValue) -> PrefError {
    PrefError::TypeMismatch {
        key: key.as_str().to_string(),
        expected,
        found: found.value_type().to_string(),
    }
}
