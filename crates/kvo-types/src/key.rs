use serde_json::Value;

use crate::error::TypeError;
use crate::identifier::Identifier;
use crate::value::{kind_name, Record};

/// A caller-supplied lookup key, before normalization.
///
/// Either a bare scalar (`"42"`, `7`) or an associative structure naming
/// identifier fields (`{"dist": "a", "range": 5}`). Which shapes are accepted
/// for a given class is decided by the active identifier strategy.
#[derive(Clone, Debug, PartialEq)]
pub enum Key {
    Scalar(Value),
    Map(Record),
}

impl Key {
    /// Build a mapping key from `(field, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Key::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns `true` for the associative shape.
    pub fn is_map(&self) -> bool {
        matches!(self, Key::Map(_))
    }
}

impl TryFrom<Value> for Key {
    type Error = TypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Key::Map(map.into_iter().collect())),
            Value::Array(_) => Err(TypeError::InvalidKey(kind_name(&value))),
            scalar => Ok(Key::Scalar(scalar)),
        }
    }
}

impl From<Record> for Key {
    fn from(record: Record) -> Self {
        Key::Map(record)
    }
}

impl From<Identifier> for Key {
    fn from(id: Identifier) -> Self {
        match id {
            Identifier::Single(value) => Key::Scalar(value),
            Identifier::Composite(parts) => Key::Map(parts.into_iter().collect()),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Scalar(Value::String(s.to_string()))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Scalar(Value::String(s))
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Scalar(Value::Bool(b))
    }
}

macro_rules! key_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                fn from(n: $t) -> Self {
                    Key::Scalar(Value::from(n))
                }
            }
        )*
    };
}

key_from_int!(i32, i64, u32, u64);
