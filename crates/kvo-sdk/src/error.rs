use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("class {class} has a single-field key, but backend {backend} requires composite primary keys")]
    CompositeKeyRequired { class: String, backend: String },

    #[error("class {class} has a composite key, which backend {backend} does not support")]
    CompositeKeyUnsupported { class: String, backend: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unit of work error: {0}")]
    Unit(#[from] kvo_unit::UnitError),

    #[error("mapping error: {0}")]
    Mapping(#[from] kvo_mapping::MappingError),

    #[error("store error: {0}")]
    Store(#[from] kvo_store::StoreError),
}

impl SdkError {
    /// Whether this is a find for an identifier that has no stored record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SdkError::Unit(kvo_unit::UnitError::NotFound { .. }))
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
