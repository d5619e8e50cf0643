//! Class metadata and entity reflection for kvo.
//!
//! The unit of work never inspects Rust types directly. Instead it works
//! from two contracts defined here:
//!
//! - [`ClassDescriptor`] -- storage name, ordered identifier fields, mapped
//!   and transient fields, and the optional parent class
//! - [`Entity`] -- get/set access to fields by name on a live object
//!
//! [`MetadataRegistry`] maps type markers to descriptors and constructors,
//! and [`IdConverter`] is the hook for storage-specific key encodings.

pub mod converter;
pub mod descriptor;
pub mod entity;
pub mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod registry;

pub use converter::{IdConverter, NullIdConverter};
pub use descriptor::{default_storage_name, ClassDescriptor, ClassDescriptorBuilder, FieldDescriptor};
pub use entity::{decode_field, unknown_field, Entity, Managed, Mapped};
pub use error::{MappingError, MappingResult};
pub use registry::MetadataRegistry;
