use kvo_mapping::MappingError;
use kvo_store::StoreError;

/// Errors from unit-of-work operations.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    /// `find` targeted an identifier the backend does not have.
    #[error("{class} {id} not found")]
    NotFound { class: String, id: String },

    /// The key shape cannot be reconciled with the class's identifier.
    #[error("invalid identifier for {class}: {reason}")]
    InvalidIdentifier { class: String, reason: String },

    /// The object carries no usable identifier value.
    #[error("cannot persist {class} without an identifier")]
    MissingIdentifier { class: String },

    /// Another object with the same identity is already managed.
    #[error("{class} {id} is already managed by this unit of work")]
    DuplicateIdentifier { class: String, id: String },

    /// Only objects previously found or flushed can be removed.
    #[error("{class} object is not managed by this unit of work")]
    UnmanagedObject { class: String },

    /// Stored type marker is neither the requested class nor a subclass.
    #[error("stored record is a {found}, which is not a {requested}")]
    TypeMismatch { requested: String, found: String },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Backend failures propagate unmodified.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for unit-of-work operations.
pub type UnitResult<T> = Result<T, UnitError>;
