//! Worker error types.

use thiserror::Error;

use figures_generator::GeneratorError;
use figures_models::{ModelError, SubjectStatus};
use figures_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Cannot move subject {subject_id} from {from} to {to}")]
    InvalidTransition {
        subject_id: String,
        from: SubjectStatus,
        to: SubjectStatus,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Caller mistakes: rejected before any mutation.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            WorkerError::InvalidInput(_)
                | WorkerError::SubjectNotFound(_)
                | WorkerError::InvalidTransition { .. }
                | WorkerError::Model(_)
        )
    }

    /// Whether re-invoking later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Store(e) => e.is_retryable(),
            WorkerError::Generator(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(WorkerError::invalid_input("missing subjectId").is_input_error());
        assert!(WorkerError::SubjectNotFound("figure-001".into()).is_input_error());
        assert!(!WorkerError::config_error("bad").is_input_error());

        let store: WorkerError = StoreError::ServerError(503, "down".into()).into();
        assert!(store.is_retryable());
        assert!(!store.is_input_error());

        let generator: WorkerError = GeneratorError::EmptyResponse.into();
        assert!(generator.is_retryable());
    }

    #[test]
    fn test_transition_message() {
        let err = WorkerError::InvalidTransition {
            subject_id: "figure-001".into(),
            from: SubjectStatus::Available,
            to: SubjectStatus::Completed,
        };
        assert_eq!(
            err.to_string(),
            "Cannot move subject figure-001 from available to completed"
        );
    }
}
