use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::fmt;

use super::Result;

/// A value held by a persistent collection.
///
/// Scalars are kept in their literal text form, exactly as they are stored.
/// Composite data (objects and arrays) is kept as a JSON tree and stored as
/// its serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    Structured(JsonValue),
}

impl Value {
    /// Serialize any `Serialize` type into a structured value.
    ///
    /// Types that serialize to a JSON scalar (numbers, strings, booleans)
    /// become [`Value::Scalar`].
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::from(serde_json::to_value(value)?))
    }

    /// Deserialize into `T`.
    ///
    /// Scalars are read as a JSON literal first (`"42"` into an integer,
    /// `"true"` into a bool) and otherwise as a plain string.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Self::Structured(json) => Ok(serde_json::from_value(json.clone())?),
            Self::Scalar(text) => Ok(serde_json::from_str(text)
                .or_else(|_| serde_json::from_value(JsonValue::String(text.clone())))?),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "SCALAR",
            Self::Structured(_) => "STRUCTURED",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::Structured(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Self::Structured(json) => Some(json),
            Self::Scalar(_) => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => f.write_str(s),
            Self::Structured(json) => write!(f, "{}", json),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Array(_) | JsonValue::Object(_) => Self::Structured(json),
            JsonValue::String(s) => Self::Scalar(s),
            other => Self::Scalar(other.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Scalar(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Scalar(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Scalar(b.to_string())
    }
}

macro_rules! numeric_values {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self::Scalar(n.to_string())
                }
            }
        )*
    };
}

numeric_values!(i32, i64, u32, u64, usize, f64);
