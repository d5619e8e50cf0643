use thiserror::Error;

/// Errors produced by type conversions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("a key must be a scalar or an object, got {0}")]
    InvalidKey(&'static str),
}
