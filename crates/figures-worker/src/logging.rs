//! Structured invocation logging.
//!
//! Every line emitted for one invocation carries the same `invocation_id` and
//! `operation` fields so a scheduler run can be traced end to end. The result
//! record printed on stdout is mirrored into the log as `result`.

use serde::Serialize;
use tracing::{error, info, Span};

use figures_models::InvocationId;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::invocation::Operation;

/// How a failed invocation should be treated by whoever scheduled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad event or impossible transition; re-sending the same event fails again.
    Input,
    /// Store or generator trouble; the next scheduled run may succeed.
    Retryable,
    Fatal,
}

impl FailureKind {
    pub fn classify(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<WorkerError>() {
            Some(e) if e.is_input_error() => FailureKind::Input,
            Some(e) if e.is_retryable() => FailureKind::Retryable,
            _ => FailureKind::Fatal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Input => "input",
            FailureKind::Retryable => "retryable",
            FailureKind::Fatal => "fatal",
        }
    }
}

/// Logger bound to a single invocation.
#[derive(Debug, Clone)]
pub struct InvocationLogger {
    invocation_id: String,
    operation: Operation,
}

impl InvocationLogger {
    pub fn new(invocation_id: &InvocationId, operation: Operation) -> Self {
        Self {
            invocation_id: invocation_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, config: &WorkerConfig) {
        info!(
            invocation_id = %self.invocation_id,
            operation = self.operation.as_str(),
            backend = ?config.store_backend,
            lease_secs = config.lease_duration.as_secs(),
            "Invocation started"
        );
    }

    /// Log the record that is about to be emitted.
    pub fn log_result<T: Serialize>(&self, record: &T) {
        let rendered = serde_json::to_string(record)
            .unwrap_or_else(|e| format!("<unserializable: {}>", e));
        info!(
            invocation_id = %self.invocation_id,
            operation = self.operation.as_str(),
            result = %rendered,
            "Invocation completed"
        );
    }

    pub fn log_failure(&self, err: &anyhow::Error) -> FailureKind {
        let kind = FailureKind::classify(err);
        error!(
            invocation_id = %self.invocation_id,
            operation = self.operation.as_str(),
            kind = kind.as_str(),
            "Invocation failed: {:#}", err
        );
        kind
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Span to wrap the whole invocation in.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "invocation",
            invocation_id = %self.invocation_id,
            operation = self.operation.as_str()
        )
    }
}
