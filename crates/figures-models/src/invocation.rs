//! Invocation request/response records.
//!
//! Each pipeline operation is triggered independently with a small JSON event
//! and answers with a small JSON record, so an external scheduler can branch on
//! the outcome without parsing log output.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::subject::SubjectId;
use crate::time::EpochMillis;

/// Message returned when no subject could be claimed.
pub const NO_SUBJECT_AVAILABLE: &str = "no subject available";

/// Unique identifier for a single invocation (used for log correlation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct InvocationId(pub String);

impl InvocationId {
    /// Generate a new random invocation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a claim invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ClaimResponse {
    #[serde(rename_all = "camelCase")]
    Claimed {
        subject_id: SubjectId,
        display_name: String,
    },
    NoneAvailable { message: String },
}

impl ClaimResponse {
    pub fn claimed(subject_id: SubjectId, display_name: impl Into<String>) -> Self {
        Self::Claimed {
            subject_id,
            display_name: display_name.into(),
        }
    }

    pub fn none_available() -> Self {
        Self::NoneAvailable {
            message: NO_SUBJECT_AVAILABLE.to_string(),
        }
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimResponse::Claimed { .. })
    }
}

/// Input of an accumulate invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccumulateRequest {
    pub subject_id: SubjectId,
    pub display_name: String,
}

/// Terminal state of an accumulate invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccumulateStatus {
    Completed,
    Partial,
}

/// Result of an accumulate invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccumulateResponse {
    pub status: AccumulateStatus,
    pub count: usize,
    /// Present only for partial completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<usize>,
}

impl AccumulateResponse {
    pub fn completed(count: usize) -> Self {
        Self {
            status: AccumulateStatus::Completed,
            count,
            target: None,
        }
    }

    pub fn partial(count: usize, target: usize) -> Self {
        Self {
            status: AccumulateStatus::Partial,
            count,
            target: Some(target),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AccumulateStatus::Completed
    }
}

/// Input of a release sweep. `now` overrides the wall clock for testing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    #[serde(default)]
    pub now: Option<EpochMillis>,
}

/// Result of a release sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSummary {
    /// Locked subjects whose lease had elapsed
    pub examined: usize,
    /// Subjects moved back to `available`
    pub released: usize,
    /// Raced subjects left untouched
    pub skipped: usize,
}

/// Input of an activate invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub subject_id: SubjectId,
}

/// Result of a catalog seed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeedSummary {
    pub added: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claim_response_shapes() {
        let claimed = ClaimResponse::claimed(SubjectId::from_ordinal(1), "Nobunaga");
        assert_eq!(
            serde_json::to_value(&claimed).unwrap(),
            json!({"subjectId": "figure-001", "displayName": "Nobunaga"})
        );

        let none = ClaimResponse::none_available();
        assert_eq!(
            serde_json::to_value(&none).unwrap(),
            json!({"message": "no subject available"})
        );
    }

    #[test]
    fn test_claim_response_parses_back() {
        let parsed: ClaimResponse =
            serde_json::from_value(json!({"subjectId": "figure-002", "displayName": "Hideyoshi"})).unwrap();
        assert!(parsed.is_claimed());

        let parsed: ClaimResponse = serde_json::from_value(json!({"message": "no subject available"})).unwrap();
        assert!(!parsed.is_claimed());
    }

    #[test]
    fn test_accumulate_response_shapes() {
        assert_eq!(
            serde_json::to_value(AccumulateResponse::completed(30)).unwrap(),
            json!({"status": "completed", "count": 30})
        );
        assert_eq!(
            serde_json::to_value(AccumulateResponse::partial(12, 30)).unwrap(),
            json!({"status": "partial", "count": 12, "target": 30})
        );
    }

    #[test]
    fn test_release_request_defaults() {
        let req: ReleaseRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.now, None);
        let req: ReleaseRequest = serde_json::from_value(json!({"now": 5})).unwrap();
        assert_eq!(req.now, Some(5));
    }
}
