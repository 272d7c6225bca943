//! Session token settings read from the system preferences.

use std::fmt;
use std::time::Duration;

use crate::error::PrefResult;
use crate::store::SysPreferenceStore;

/// JWT signing settings. The first load on a fresh deployment generates and
/// persists the secret.
#[derive(Clone)]
pub struct JwtSettings {
    secret: String,
    expires_in: String,
}

impl JwtSettings {
    pub fn load(store: &SysPreferenceStore) -> PrefResult<Self> {
        Ok(Self {
            secret: store.get_string("jwt_secret")?,
            expires_in: store.get_string("jwt_expires_in")?,
        })
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Lifetime as configured, e.g. `"7d"`.
    pub fn expires_in(&self) -> &str {
        &self.expires_in
    }

    /// Lifetime as a duration. Accepts plain seconds or a number followed
    /// by one of `s`, `m`, `h`, `d`, `w`, `y`; `None` for anything else.
    pub fn lifetime(&self) -> Option<Duration> {
        parse_lifetime(&self.expires_in)
    }
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

fn parse_lifetime(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (amount, unit) = raw.split_at(split);
    let amount: u64 = amount.parse().ok()?;
    let scale = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        "y" => 365 * 24 * 60 * 60,
        _ => return None,
    };
    amount.checked_mul(scale).map(Duration::from_secs)
}
