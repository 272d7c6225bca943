//! Preference value types and their canonical text encoding.

use std::fmt;

/// Declared type of a preference key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Number,
    Boolean,
}

impl ValueType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed preference value.
#[derive(Debug, Clone, PartialEq)]
pub enum PrefValue {
    String(String),
    /// Always finite
    Number(f64),
    Boolean(bool),
}

impl PrefValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            PrefValue::String(_) => ValueType::String,
            PrefValue::Number(_) => ValueType::Number,
            PrefValue::Boolean(_) => ValueType::Boolean,
        }
    }

    /// Canonical stored form: strings verbatim, `"true"`/`"false"`,
    /// shortest round-trip decimal for numbers.
    pub fn encode(&self) -> String {
        match self {
            PrefValue::String(s) => s.clone(),
            PrefValue::Number(n) => n.to_string(),
            PrefValue::Boolean(b) => b.to_string(),
        }
    }

    /// Parse a stored string as `expected`.
    ///
    /// Strict: only the exact form [`encode`](Self::encode) produces is
    /// accepted, so `"yes"`, `"TRUE"`, `" 12"`, `"1e3"` or `"12.0"` are
    /// rejected rather than coerced.
    pub fn decode(raw: &str, expected: ValueType) -> Option<PrefValue> {
        match expected {
            ValueType::String => Some(PrefValue::String(raw.to_string())),
            ValueType::Boolean => match raw {
                "true" => Some(PrefValue::Boolean(true)),
                "false" => Some(PrefValue::Boolean(false)),
                _ => None,
            },
            ValueType::Number => {
                let n: f64 = raw.parse().ok()?;
                (n.is_finite() && n.to_string() == raw).then_some(PrefValue::Number(n))
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrefValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PrefValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrefValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for PrefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        PrefValue::String(value.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(value: String) -> Self {
        PrefValue::String(value)
    }
}

impl From<f64> for PrefValue {
    fn from(value: f64) -> Self {
        PrefValue::Number(value)
    }
}

impl From<i32> for PrefValue {
    fn from(value: i32) -> Self {
        PrefValue::Number(f64::from(value))
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        PrefValue::Boolean(value)
    }
}
