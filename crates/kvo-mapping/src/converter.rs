//! Identifier serialization hook.
//!
//! Backends that store keys in a transformed shape (encoded composite keys,
//! prefixed row keys) plug in an [`IdConverter`]. The insertion path calls
//! [`IdConverter::serialize`] on the normalized identifier; the hydration
//! path calls [`IdConverter::unserialize`] on raw stored data before fields
//! are assigned.

use kvo_types::{Identifier, Record};

use crate::descriptor::ClassDescriptor;

pub trait IdConverter {
    /// Transform a normalized identifier into its storage-ready form.
    fn serialize(&self, class: &ClassDescriptor, id: Identifier) -> Identifier;

    /// Reverse [`IdConverter::serialize`] on stored data.
    fn unserialize(&self, class: &ClassDescriptor, data: Record) -> Record;
}

/// The identity transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullIdConverter;

impl IdConverter for NullIdConverter {
    fn serialize(&self, _class: &ClassDescriptor, id: Identifier) -> Identifier {
        id
    }

    fn unserialize(&self, _class: &ClassDescriptor, data: Record) -> Record {
        data
    }
}
