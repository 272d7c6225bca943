//! Externally configured values and store options.
//!
//! Defaults may consult deployment configuration (for example a JWT secret
//! provided through the environment) through [`ConfiguredValues`].

use std::env;
use std::time::Duration;

use hashbrown::HashMap;
use tracing::debug;

/// Environment variable holding a fixed JWT secret
pub const JWT_SECRET_VAR: &str = "PICSUR_JWT_SECRET";

/// Environment variable holding the JWT lifetime
pub const JWT_EXPIRY_VAR: &str = "PICSUR_JWT_EXPIRY";

/// Source of deployment-provided values.
pub trait ConfiguredValues: Send + Sync {
    /// Value configured under `name`; `None` when unset or empty.
    fn configured_value(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvConfig;

impl ConfiguredValues for EnvConfig {
    fn configured_value(&self, name: &str) -> Option<String> {
        match env::var(name) {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
            Ok(_) => {
                debug!("{name} is set but empty, ignoring");
                None
            }
            Err(_) => None,
        }
    }
}

/// Fixed values, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct StaticConfig {
    values: HashMap<String, String>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl ConfiguredValues for StaticConfig {
    fn configured_value(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

/// Options of a [`PreferenceStore`](crate::PreferenceStore).
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a caller waits for a cold key to be materialized. `None`
    /// waits until the default is persisted or fails.
    pub materialize_wait: Option<Duration>,
}

impl StoreOptions {
    pub fn with_materialize_wait(mut self, wait: Option<Duration>) -> Self {
        self.materialize_wait = wait;
        self
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { materialize_wait: Some(Duration::from_secs(30)) }
    }
}
