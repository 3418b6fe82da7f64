//! Shared data models for the figures sayings pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Subjects (catalog figures) and their lease status
//! - Sayings and their per-subject sequence keys
//! - Invocation request/response records for claim, accumulate and release
//! - Epoch-millisecond time helpers

pub mod error;
pub mod invocation;
pub mod saying;
pub mod subject;
pub mod time;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use invocation::{
    AccumulateRequest, AccumulateResponse, AccumulateStatus, ActivateRequest, ClaimResponse,
    InvocationId, ReleaseRequest, ReleaseSummary, SeedSummary, NO_SUBJECT_AVAILABLE,
};
pub use saying::{Saying, SequenceKey};
pub use subject::{NewSubject, Subject, SubjectId, SubjectStatus};
pub use time::{now_millis, EpochMillis};
