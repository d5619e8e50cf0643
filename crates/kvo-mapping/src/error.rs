/// Errors from building descriptors, registering classes, and reflective
/// field access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    /// Every mapped class needs at least one identifier field.
    #[error("class {class} declares no identifier field")]
    MissingIdentifier { class: String },

    #[error("field {field:?} declared twice on {class}")]
    DuplicateField { class: String, field: String },

    #[error("identifier field {field:?} on {class} cannot be transient")]
    TransientIdentifier { class: String, field: String },

    /// `Mapped::CLASS` and the descriptor it builds disagree.
    #[error("class name mismatch: type declares {declared}, descriptor says {described}")]
    ClassNameMismatch { declared: String, described: String },

    #[error("class {class} extends unregistered class {parent}")]
    UnknownParent { class: String, parent: String },

    /// Subclasses share their parent's container and identifier fields.
    #[error("class {class} does not match the {what} of its parent {parent}")]
    IncompatibleSubclass {
        class: String,
        parent: String,
        what: &'static str,
    },

    #[error("class {0} is not registered")]
    UnknownClass(String),

    #[error("class {class} has no field {field:?}")]
    UnknownField { class: String, field: String },

    /// A stored value could not be converted into the field's Rust type.
    #[error("cannot assign {field:?} on {class}: {reason}")]
    FieldConversion {
        class: String,
        field: String,
        reason: String,
    },
}

/// Result alias for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;
