//! JSON invocation handlers.
//!
//! Each handler takes the raw event of one scheduler-triggered invocation and
//! returns the structured record the scheduler branches on.

use serde::de::DeserializeOwned;
use serde_json::Value;

use figures_models::{
    now_millis, AccumulateRequest, AccumulateResponse, ActivateRequest, ClaimResponse, NewSubject,
    ReleaseRequest, ReleaseSummary, SeedSummary, Subject,
};

use crate::accumulator::SayingAccumulator;
use crate::catalog::{default_catalog, SubjectCatalog};
use crate::error::{WorkerError, WorkerResult};
use crate::lock_manager::SubjectLockManager;

/// Key under which a chained stage receives the previous stage's output.
const RESPONSE_PAYLOAD: &str = "responsePayload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Claim,
    Accumulate,
    Release,
    Seed,
    List,
    Activate,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Claim => "claim",
            Operation::Accumulate => "accumulate",
            Operation::Release => "release",
            Operation::Seed => "seed",
            Operation::List => "list",
            Operation::Activate => "activate",
        }
    }
}

/// Parse a raw event. Blank input is an empty event.
pub fn parse_event(raw: &str) -> WorkerResult<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw)
        .map_err(|e| WorkerError::invalid_input(format!("event is not valid JSON: {}", e)))
}

/// Unwrap a `responsePayload` envelope unless the event already carries the
/// request fields itself.
pub fn unwrap_payload(event: Value) -> Value {
    match event {
        Value::Object(mut map) if !map.contains_key("subjectId") && map.contains_key(RESPONSE_PAYLOAD) => {
            map.remove(RESPONSE_PAYLOAD).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(event: Value, what: &str) -> WorkerResult<T> {
    serde_json::from_value(event)
        .map_err(|e| WorkerError::invalid_input(format!("invalid {} event: {}", what, e)))
}

pub async fn handle_claim(locks: &SubjectLockManager) -> WorkerResult<ClaimResponse> {
    Ok(match locks.claim_next().await? {
        Some(subject) => ClaimResponse::claimed(subject.id, subject.display_name),
        None => ClaimResponse::none_available(),
    })
}

pub async fn handle_accumulate(
    accumulator: &SayingAccumulator,
    event: Value,
) -> WorkerResult<AccumulateResponse> {
    let event = unwrap_payload(event);
    if let Some(message) = event.get("message").and_then(Value::as_str) {
        if event.get("subjectId").is_none() {
            return Err(WorkerError::invalid_input(format!(
                "upstream stage reported '{}', nothing to accumulate",
                message
            )));
        }
    }

    let request: AccumulateRequest = decode(event, "accumulate")?;
    accumulator
        .accumulate(&request.subject_id, &request.display_name)
        .await
}

pub async fn handle_release(
    locks: &SubjectLockManager,
    event: Value,
) -> WorkerResult<ReleaseSummary> {
    let request: ReleaseRequest = match event {
        Value::Null => ReleaseRequest::default(),
        other => decode(other, "release")?,
    };
    locks
        .release_expired(request.now.unwrap_or_else(now_millis))
        .await
}

pub async fn handle_activate(catalog: &SubjectCatalog, event: Value) -> WorkerResult<Subject> {
    let request: ActivateRequest = decode(event, "activate")?;
    catalog.activate(&request.subject_id).await
}

/// Seed from an array of subjects, or the built-in catalog for an empty event.
pub async fn handle_seed(catalog: &SubjectCatalog, event: Value) -> WorkerResult<SeedSummary> {
    let inputs: Vec<NewSubject> = match event {
        Value::Null => default_catalog(),
        other => decode(other, "seed")?,
    };
    catalog.seed(inputs).await
}

pub async fn handle_list(catalog: &SubjectCatalog) -> WorkerResult<Vec<Subject>> {
    catalog.list().await
}
