//! Generator error types.

use thiserror::Error;

pub type GeneratorResult<T> = Result<T, GeneratorError>;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generator request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Generator API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Generator returned no content")]
    EmptyResponse,

    #[error("Invalid generator payload: {0}")]
    InvalidPayload(String),
}

impl GeneratorError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }
}
