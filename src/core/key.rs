use std::fmt;

use super::{MapError, Result};

/// Width of the `key` column in the backing table.
pub const MAX_KEY_LEN: usize = 100;

/// A validated collection key.
///
/// Keys are stored verbatim in a `VARCHAR(100)` primary-key column, so a key
/// is always held in its text form. Numeric keys become their decimal literal
/// (`42` and `"42"` address the same row).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Validate a text key.
    ///
    /// Empty keys fail with `InvalidKeyKind`; keys wider than the column fail
    /// with `Storage` before any statement is sent.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(MapError::InvalidKeyKind("key must not be empty".into()));
        }
        // Same failure the server reports for an over-wide key.
        if key.chars().count() > MAX_KEY_LEN {
            return Err(MapError::Storage(format!(
                "value too long for type character varying({})",
                MAX_KEY_LEN
            )));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Conversion into a [`Key`], rejecting anything that is not a non-empty
/// string or a number.
pub trait IntoKey {
    fn into_key(self) -> Result<Key>;
}

impl IntoKey for Key {
    fn into_key(self) -> Result<Key> {
        Ok(self)
    }
}

impl IntoKey for &Key {
    fn into_key(self) -> Result<Key> {
        Ok(self.clone())
    }
}

impl IntoKey for &str {
    fn into_key(self) -> Result<Key> {
        Key::new(self)
    }
}

impl IntoKey for String {
    fn into_key(self) -> Result<Key> {
        Key::new(self)
    }
}

impl IntoKey for &String {
    fn into_key(self) -> Result<Key> {
        Key::new(self.as_str())
    }
}

macro_rules! integer_keys {
    ($($ty:ty),*) => {
        $(
            impl IntoKey for $ty {
                fn into_key(self) -> Result<Key> {
                    Key::new(self.to_string())
                }
            }
        )*
    };
}

integer_keys!(i32, i64, u32, u64, usize);

impl IntoKey for f64 {
    fn into_key(self) -> Result<Key> {
        if !self.is_finite() {
            return Err(MapError::InvalidKeyKind(format!(
                "numeric key must be finite, got {}",
                self
            )));
        }
        // -0 and 0 address the same row.
        let n = if self == 0.0 { 0.0 } else { self };
        Key::new(n.to_string())
    }
}

impl IntoKey for &serde_json::Value {
    fn into_key(self) -> Result<Key> {
        match self {
            serde_json::Value::String(s) => Key::new(s.as_str()),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => i.into_key(),
                (_, Some(u), _) => u.into_key(),
                (_, _, Some(f)) => f.into_key(),
                _ => Key::new(n.to_string()),
            },
            other => Err(MapError::InvalidKeyKind(format!(
                "keys must be strings or numbers, got {}",
                json_kind(other)
            ))),
        }
    }
}

impl IntoKey for serde_json::Value {
    fn into_key(self) -> Result<Key> {
        (&self).into_key()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
