//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("Unknown subject status: {0}")]
    UnknownStatus(String),

    #[error("Invalid sequence key: {0}")]
    InvalidSequenceKey(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl ModelError {
    pub fn invalid_subject(msg: impl Into<String>) -> Self {
        Self::InvalidSubject(msg.into())
    }
}
