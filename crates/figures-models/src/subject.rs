//! Subject (catalog figure) models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::{ModelError, ModelResult};
use crate::time::EpochMillis;

/// Prefix shared by every subject identifier.
pub const SUBJECT_ID_PREFIX: &str = "figure-";

/// Stable identifier of a subject. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Build the canonical id for a catalog ordinal, e.g. `figure-007`.
    pub fn from_ordinal(ordinal: u32) -> Self {
        Self(format!("{}{:03}", SUBJECT_ID_PREFIX, ordinal))
    }

    /// Parse the catalog ordinal back out of a canonical id.
    ///
    /// Ids that were not produced by [`SubjectId::from_ordinal`] yield `None`.
    pub fn ordinal(&self) -> Option<u32> {
        self.0
            .strip_prefix(SUBJECT_ID_PREFIX)
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lease status of a subject.
///
/// `ready → available → locked → {completed | available}`. Only `available`
/// subjects are eligible for claiming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubjectStatus {
    /// Registered in the catalog but not yet released into the pool
    #[default]
    Ready,
    /// Eligible for claiming
    Available,
    /// Claimed by a worker until `locked_until`
    Locked,
    /// Saying set is complete
    Completed,
}

impl SubjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectStatus::Ready => "ready",
            SubjectStatus::Available => "available",
            SubjectStatus::Locked => "locked",
            SubjectStatus::Completed => "completed",
        }
    }

    /// Whether a worker may claim a subject in this status.
    pub fn is_claimable(&self) -> bool {
        matches!(self, SubjectStatus::Available)
    }
}

impl fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubjectStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(SubjectStatus::Ready),
            "available" => Ok(SubjectStatus::Available),
            "locked" => Ok(SubjectStatus::Locked),
            "completed" => Ok(SubjectStatus::Completed),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}

/// A catalog subject as stored in the subjects collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    /// Unique subject id
    pub id: SubjectId,

    /// Human-readable label used in prompts and output metadata
    pub display_name: String,

    /// Lease status
    #[serde(default)]
    pub status: SubjectStatus,

    /// Lease deadline, present only while `status = locked`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<EpochMillis>,

    /// Last mutation time (observability only)
    pub updated_at: EpochMillis,

    /// Registration time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<EpochMillis>,

    /// Title used when publishing the rendered video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_title: Option<String>,

    /// Short biography used as prompt context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    /// Free-form catalog tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Subject {
    /// Create a subject in the given status with no lease.
    pub fn new(
        id: SubjectId,
        display_name: impl Into<String>,
        status: SubjectStatus,
        now: EpochMillis,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            status,
            locked_until: None,
            updated_at: now,
            created_at: Some(now),
            youtube_title: None,
            bio: None,
            tags: Vec::new(),
        }
    }

    /// Whether the lease on this subject has elapsed at `now`.
    pub fn lease_expired(&self, now: EpochMillis) -> bool {
        self.status == SubjectStatus::Locked
            && self.locked_until.map(|until| until < now).unwrap_or(false)
    }
}

/// Input for registering a new subject in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    #[validate(length(min = 1, max = 32, message = "displayName must be 1-32 characters"))]
    pub display_name: String,

    #[validate(length(min = 1, max = 100, message = "youtubeTitle must be 1-100 characters"))]
    #[serde(default)]
    pub youtube_title: Option<String>,

    /// Initial status; only `ready` and `available` are accepted
    #[serde(default)]
    pub status: Option<SubjectStatus>,

    #[serde(default)]
    pub bio: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewSubject {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            youtube_title: None,
            status: None,
            bio: None,
            tags: Vec::new(),
        }
    }

    /// Validate the input and resolve the initial status.
    pub fn checked_status(&self) -> ModelResult<SubjectStatus> {
        self.validate()?;
        if self.display_name.trim().is_empty() {
            return Err(ModelError::invalid_subject("displayName must not be blank"));
        }
        match self.status.unwrap_or_default() {
            status @ (SubjectStatus::Ready | SubjectStatus::Available) => Ok(status),
            other => Err(ModelError::invalid_subject(format!(
                "new subjects cannot start as {}",
                other
            ))),
        }
    }

    /// Materialize into a stored subject with the assigned id.
    pub fn into_subject(self, id: SubjectId, now: EpochMillis) -> ModelResult<Subject> {
        let status = self.checked_status()?;
        Ok(Subject {
            id,
            display_name: self.display_name.trim().to_string(),
            status,
            locked_until: None,
            updated_at: now,
            created_at: Some(now),
            youtube_title: self.youtube_title,
            bio: self.bio,
            tags: self.tags,
        })
    }
}
