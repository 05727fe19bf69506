//! Foreign-side value representation.
//!
//! [`ForeignValue`] is the shape a dynamically typed host runtime hands across
//! the boundary: integers are arbitrary-width (modelled as `i128`, wide enough to
//! carry every value a host can pass for a `u64` parameter plus the ones just
//! outside it), objects are string-keyed maps, and binary payloads are byte
//! buffers. Native code converts these into typed values in the marshaling layer.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ForeignValue {
    #[default]
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<ForeignValue>),
    Object(BTreeMap<String, ForeignValue>),
}

impl ForeignValue {
    /// Build an object from `(key, value)` pairs.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ForeignValue)>,
    {
        Self::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Host-facing name of the value's type, used in binding diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ForeignValue> {
        match self {
            Self::Object(fields) => fields.get(key),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[ForeignValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert from JSON, the interchange format hosts typically speak.
    ///
    /// Integers that fit `i64`/`u64` stay integers; anything wider arrives from
    /// `serde_json` as a float and stays a float, so it cannot silently pass a
    /// later integer range check.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Self::Int(i128::from(u))
                } else if let Some(i) = n.as_i64() {
                    Self::Int(i128::from(i))
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(fields) => Self::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON. Bytes become an array of numbers; integers outside the
    /// `i64`/`u64` range and non-finite floats degrade to the nearest JSON shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => {
                if let Ok(u) = u64::try_from(*n) {
                    Value::Number(u.into())
                } else if let Ok(i) = i64::try_from(*n) {
                    Value::Number(i.into())
                } else {
                    Number::from_f64(*n as f64).map_or(Value::Null, Value::Number)
                }
            }
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Str(s) => Value::String(s.clone()),
            Self::Bytes(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

impl From<u64> for ForeignValue {
    fn from(value: u64) -> Self {
        Self::Int(i128::from(value))
    }
}

impl From<i64> for ForeignValue {
    fn from(value: i64) -> Self {
        Self::Int(i128::from(value))
    }
}

impl From<bool> for ForeignValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ForeignValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for ForeignValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<ForeignValue>> for ForeignValue {
    fn from(value: Vec<ForeignValue>) -> Self {
        Self::List(value)
    }
}
