//! Storage backend contract for kvo.
//!
//! The unit of work talks to storage only through the [`StorageBackend`]
//! trait: four CRUD primitives keyed by a storage container name and a
//! normalized identifier, plus capability flags that shape how it builds
//! identifiers and update payloads.
//!
//! # Backends
//!
//! - [`InMemoryBackend`] -- `HashMap`-based backend (`"array"`) for tests and embedding
//! - [`RecordingBackend`] -- decorator that records calls and injects failures
//!
//! # Contract Rules
//!
//! 1. `find` returns identifier fields again alongside the other fields.
//! 2. Not-found is `Ok(None)`, distinct from an empty record.
//! 3. `delete` of a missing record succeeds.
//! 4. `update` may upsert.
//! 5. Errors propagate unmodified; no retries at this layer.

pub mod error;
pub mod keys;
pub mod memory;
pub mod recording;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use keys::{encode_identifier, flatten_key};
pub use memory::InMemoryBackend;
pub use recording::{CallKind, RecordingBackend, StorageCall};
pub use traits::{Capabilities, StorageBackend};
