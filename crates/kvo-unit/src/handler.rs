//! Identifier handling strategies.
//!
//! The unit of work picks one strategy at construction time from the
//! backend's composite-key capability and never branches on it again:
//!
//! - [`SingleIdHandler`] -- identifiers are bare scalars
//! - [`CompositeIdHandler`] -- identifiers are ordered field mappings
//!
//! Composite hashes are length-prefixed per component (see
//! [`kvo_store::encode_identifier`]), so values containing any separator-like
//! text cannot collide.

use kvo_mapping::{ClassDescriptor, Entity};
use kvo_store::encode_identifier;
use kvo_types::value::{is_scalar, kind_name};
use kvo_types::{IdHash, Identifier, Key, Value};

use crate::error::{UnitError, UnitResult};

/// Normalizes keys, reads identifiers off objects, and hashes identifiers.
pub trait IdHandler {
    /// Turn a caller-supplied key into the canonical identifier for `class`.
    fn normalize_id(&self, class: &ClassDescriptor, key: Key) -> UnitResult<Identifier>;

    /// Read the current identifier off a live object. The shape matches what
    /// [`IdHandler::normalize_id`] produces.
    fn get_identifier(&self, class: &ClassDescriptor, object: &dyn Entity) -> Identifier;

    /// Identity-map key for an identifier.
    fn hash(&self, id: &Identifier) -> IdHash;

    fn name(&self) -> &'static str;
}

fn invalid(class: &ClassDescriptor, reason: impl Into<String>) -> UnitError {
    UnitError::InvalidIdentifier {
        class: class.name().to_string(),
        reason: reason.into(),
    }
}

fn require_scalar(class: &ClassDescriptor, field: &str, value: Value) -> UnitResult<Value> {
    if is_scalar(&value) {
        Ok(value)
    } else {
        Err(invalid(
            class,
            format!("identifier field {field:?} must be a scalar, got {}", kind_name(&value)),
        ))
    }
}

/// Strategy for backends without composite-key support.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleIdHandler;

impl IdHandler for SingleIdHandler {
    fn normalize_id(&self, class: &ClassDescriptor, key: Key) -> UnitResult<Identifier> {
        if class.is_composite() {
            return Err(invalid(
                class,
                "composite identifiers are not supported by this backend",
            ));
        }
        let field = class.single_identifier();
        match key {
            Key::Scalar(value) => Ok(Identifier::Single(require_scalar(class, field, value)?)),
            Key::Map(mut map) => {
                let value = map
                    .remove(field)
                    .ok_or_else(|| invalid(class, format!("missing identifier field {field:?}")))?;
                Ok(Identifier::Single(require_scalar(class, field, value)?))
            }
        }
    }

    fn get_identifier(&self, class: &ClassDescriptor, object: &dyn Entity) -> Identifier {
        Identifier::Single(object.field(class.single_identifier()).unwrap_or(Value::Null))
    }

    fn hash(&self, id: &Identifier) -> IdHash {
        match id {
            // JSON text, so the string "1" and the number 1 stay distinct.
            Identifier::Single(value) => IdHash::new(value.to_string()),
            composite => IdHash::new(encode_identifier(composite)),
        }
    }

    fn name(&self) -> &'static str {
        "single"
    }
}

/// Strategy for backends with composite-key support.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositeIdHandler;

impl IdHandler for CompositeIdHandler {
    fn normalize_id(&self, class: &ClassDescriptor, key: Key) -> UnitResult<Identifier> {
        let fields = class.identifier();
        match key {
            Key::Scalar(value) => {
                if fields.len() > 1 {
                    return Err(invalid(
                        class,
                        format!(
                            "a key of {} fields cannot be given as a bare scalar",
                            fields.len()
                        ),
                    ));
                }
                let value = require_scalar(class, &fields[0], value)?;
                Ok(Identifier::Composite(vec![(fields[0].clone(), value)]))
            }
            Key::Map(mut map) => {
                let mut parts = Vec::with_capacity(fields.len());
                for field in fields {
                    let value = map.remove(field).ok_or_else(|| {
                        invalid(class, format!("missing identifier field {field:?}"))
                    })?;
                    parts.push((field.clone(), require_scalar(class, field, value)?));
                }
                Ok(Identifier::Composite(parts))
            }
        }
    }

    fn get_identifier(&self, class: &ClassDescriptor, object: &dyn Entity) -> Identifier {
        Identifier::Composite(
            class
                .identifier()
                .iter()
                .map(|field| (field.clone(), object.field(field).unwrap_or(Value::Null)))
                .collect(),
        )
    }

    fn hash(&self, id: &Identifier) -> IdHash {
        IdHash::new(encode_identifier(id))
    }

    fn name(&self) -> &'static str {
        "composite"
    }
}

/// Strategy matching a backend's composite-key capability.
pub fn handler_for(composite_keys: bool) -> Box<dyn IdHandler> {
    if composite_keys {
        Box::new(CompositeIdHandler)
    } else {
        Box::new(SingleIdHandler)
    }
}
