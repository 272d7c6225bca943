//! prefstore: typed server preferences
//!
//! Server-wide (`sys`) and per-account default (`usr`) preferences stored as
//! text records in a [`prefstore_core::RecordStore`], exposed as typed values.
//!
//! # Architecture
//!
//! - Each domain is a closed key enum ([`SysPreference`], [`UsrPreference`])
//!   that fixes every key's [`ValueType`] and its record table
//! - Reads never come back empty: a missing key is filled from the domain's
//!   [`DefaultTable`], persisted, then returned
//! - Concurrent cold reads of one key share a single default computation,
//!   so a generated secret is created once and every caller sees it
//! - Writes are validated against the declared type before anything is
//!   stored
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use prefstore::{cached_records, sys_defaults, EnvConfig, JwtSettings, PreferenceStore};
//! use prefstore_core::{Config, RecordEngine};
//!
//! let engine = Arc::new(RecordEngine::open("/var/lib/picsur", Config::server())?);
//! let defaults = sys_defaults(Arc::new(EnvConfig))?;
//! let prefs = PreferenceStore::new(cached_records(engine), Arc::new(defaults));
//!
//! let jwt = JwtSettings::load(&prefs)?;
//! let cost = prefs.get_number("bcrypt_strength")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod config;
pub mod defaults;
pub mod error;
pub mod flight;
pub mod jwt;
pub mod registry;
pub mod store;
pub mod value;

pub use codec::DecodedPreference;
pub use config::{ConfiguredValues, EnvConfig, StaticConfig, StoreOptions};
pub use defaults::{generate_secret, sys_defaults, usr_defaults, DefaultTable};
pub use error::{PrefError, PrefResult};
pub use jwt::JwtSettings;
pub use registry::{PrefKey, SysPreference, UsrPreference};
pub use store::{cached_records, PreferenceStore, SysPreferenceStore, UsrPreferenceStore};
pub use value::{PrefValue, ValueType};
