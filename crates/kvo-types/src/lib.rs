//! Foundation types for kvo, the key-value object mapper.
//!
//! This crate provides the value, key, and identifier types shared by every
//! other kvo crate. It has no knowledge of storage backends or entities.
//!
//! # Key Types
//!
//! - [`Record`] -- Field-name to value map exchanged with storage backends
//! - [`Key`] -- Caller-supplied lookup key (bare scalar or field mapping)
//! - [`Identifier`] -- Normalized identifier handed to storage
//! - [`IdHash`] -- Comparable identity-map key derived from an identifier
//! - [`ObjectHandle`] -- Content-independent handle of a managed object

pub mod error;
pub mod handle;
pub mod identifier;
pub mod key;
pub mod value;

pub use error::TypeError;
pub use handle::ObjectHandle;
pub use identifier::{IdHash, Identifier};
pub use key::Key;
pub use value::{render_scalar, Record, TYPE_MARKER_FIELD};

/// Field values are plain JSON values. Their `PartialEq` is strict: `1`,
/// `1.0` and `"1"` are all distinct.
pub use serde_json::Value;
