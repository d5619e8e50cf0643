/// Errors from storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failure reported by the backend itself (network, server, driver).
    #[error("{backend} backend error: {message}")]
    Backend { backend: String, message: String },

    /// A composite identifier was passed to a backend that only accepts
    /// single-field keys.
    #[error("backend {0} does not support composite primary keys")]
    CompositeKeyUnsupported(String),

    #[error("backend lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_names_its_backend() {
        let err = StoreError::backend("array", "disk full");
        assert_eq!(err.to_string(), "array backend error: disk full");
    }

    #[test]
    fn composite_key_error_display() {
        let err = StoreError::CompositeKeyUnsupported("array".into());
        assert_eq!(
            err.to_string(),
            "backend array does not support composite primary keys"
        );
    }
}
