use kvo_types::{Identifier, Record};
use serde::Serialize;

use crate::error::StoreResult;

/// Capability flags a backend advertises to the unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// `update` may be called with only the changed fields.
    pub partial_updates: bool,
    /// Composite identifiers are accepted.
    pub composite_primary_keys: bool,
    /// Only composite identifiers are accepted.
    pub requires_composite_primary_keys: bool,
}

/// A key-value storage backend.
///
/// All implementations must satisfy these invariants:
/// - `find` returns the full stored field set, including the identifier
///   fields. The unit of work does not re-inject identifiers on hydration.
/// - A missing record is `Ok(None)` from `find`, never an empty record.
/// - `delete` of a missing record is a no-op, not an error.
/// - `update` creates the record if the backend cannot cheaply check for
///   existence (upsert semantics are acceptable).
/// - Behavior of `insert` on a duplicate identifier is backend-specific and
///   must be documented by each implementation.
/// - All I/O errors are propagated, never silently ignored. Retries,
///   pooling, and timeouts are the backend's concern.
pub trait StorageBackend: Send + Sync {
    /// When `false`, `update` always receives the full merged record.
    fn supports_partial_updates(&self) -> bool;

    /// Selects the identifier strategy the unit of work uses.
    fn supports_composite_primary_keys(&self) -> bool;

    /// Classes with single-field keys cannot be stored on this backend.
    fn requires_composite_primary_keys(&self) -> bool;

    /// Create a new record.
    fn insert(&self, storage_name: &str, id: &Identifier, data: &Record) -> StoreResult<()>;

    /// Update (or create) a record.
    fn update(&self, storage_name: &str, id: &Identifier, data: &Record) -> StoreResult<()>;

    /// Remove a record. Missing records are ignored.
    fn delete(&self, storage_name: &str, id: &Identifier) -> StoreResult<()>;

    /// Read a record by identifier.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    fn find(&self, storage_name: &str, id: &Identifier) -> StoreResult<Option<Record>>;

    /// Short machine-readable backend name, e.g. `"array"` or `"redis"`.
    fn name(&self) -> &str;

    /// The three capability flags together.
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            partial_updates: self.supports_partial_updates(),
            composite_primary_keys: self.supports_composite_primary_keys(),
            requires_composite_primary_keys: self.requires_composite_primary_keys(),
        }
    }
}
