use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::value::{render_scalar, Record};

/// A normalized identifier, as handed to storage backends.
///
/// Single-field classes use [`Identifier::Single`]. Composite keys carry
/// `(field, value)` pairs in the class's declared identifier order, which is
/// what makes their hashes independent of the caller's input ordering.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Identifier {
    Single(Value),
    Composite(Vec<(String, Value)>),
}

impl Identifier {
    /// Returns `true` if the identifier carries no usable value.
    ///
    /// A composite identifier is empty when it has no parts or when any part
    /// is `null`.
    pub fn is_empty(&self) -> bool {
        match self {
            Identifier::Single(value) => value.is_null(),
            Identifier::Composite(parts) => {
                parts.is_empty() || parts.iter().any(|(_, v)| v.is_null())
            }
        }
    }

    /// Returns `true` for the composite shape.
    pub fn is_composite(&self) -> bool {
        matches!(self, Identifier::Composite(_))
    }

    /// Identifier values in order.
    pub fn values(&self) -> Vec<&Value> {
        match self {
            Identifier::Single(value) => vec![value],
            Identifier::Composite(parts) => parts.iter().map(|(_, v)| v).collect(),
        }
    }

    /// Value of one component of a composite identifier.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Identifier::Single(_) => None,
            Identifier::Composite(parts) => {
                parts.iter().find(|(name, _)| name == field).map(|(_, v)| v)
            }
        }
    }

    /// Render as a record. Single identifiers need the field name they were
    /// read from.
    pub fn to_record(&self, single_field: &str) -> Record {
        match self {
            Identifier::Single(value) => {
                let mut record = Record::new();
                record.insert(single_field.to_string(), value.clone());
                record
            }
            Identifier::Composite(parts) => parts.iter().cloned().collect(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Single(value) => write!(f, "{}", render_scalar(value)),
            Identifier::Composite(parts) => {
                write!(f, "{{")?;
                for (i, (name, value)) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<Value> for Identifier {
    fn from(value: Value) -> Self {
        Identifier::Single(value)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::Single(Value::String(s.to_string()))
    }
}

/// Comparable identity-map key computed from an [`Identifier`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IdHash(String);

impl IdHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
