//! Persistence contracts shared by the Firestore and in-memory backends.
//!
//! Subject rows are mutated only through [`SubjectStore::compare_and_set`]:
//! a single conditional write that lands only if the row still matches what
//! the caller observed. Saying rows are append-only.

use async_trait::async_trait;

use figures_models::{EpochMillis, Saying, Subject, SubjectId, SubjectStatus};

use crate::error::StoreResult;

/// What a subject row must look like for a conditional write to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    /// Acceptable current statuses.
    pub statuses: Vec<SubjectStatus>,
    /// If set, `lockedUntil` must currently equal this deadline.
    pub locked_until: Option<EpochMillis>,
}

impl Precondition {
    pub fn status(status: SubjectStatus) -> Self {
        Self {
            statuses: vec![status],
            locked_until: None,
        }
    }

    pub fn status_in(statuses: &[SubjectStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            locked_until: None,
        }
    }

    /// Additionally require the lease deadline to be exactly `deadline`.
    pub fn with_locked_until(mut self, deadline: EpochMillis) -> Self {
        self.locked_until = Some(deadline);
        self
    }

    pub fn matches(&self, subject: &Subject) -> bool {
        if !self.statuses.contains(&subject.status) {
            return false;
        }
        match self.locked_until {
            Some(expected) => subject.locked_until == Some(expected),
            None => true,
        }
    }
}

/// New values for the lease fields of a subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectUpdate {
    pub status: SubjectStatus,
    /// `None` removes the field.
    pub locked_until: Option<EpochMillis>,
    pub updated_at: EpochMillis,
}

impl SubjectUpdate {
    pub fn lock(deadline: EpochMillis, now: EpochMillis) -> Self {
        Self {
            status: SubjectStatus::Locked,
            locked_until: Some(deadline),
            updated_at: now,
        }
    }

    /// Transition to `status` and drop any lease deadline.
    pub fn unlocked(status: SubjectStatus, now: EpochMillis) -> Self {
        Self {
            status,
            locked_until: None,
            updated_at: now,
        }
    }

    pub fn apply_to(&self, subject: &mut Subject) {
        subject.status = self.status;
        subject.locked_until = self.locked_until;
        subject.updated_at = self.updated_at;
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The write landed; carries the subject as now stored.
    Applied(Subject),
    /// The row no longer matched. `current` is the status that was observed
    /// when known; `None` when the row changed between read and write.
    Conflict { current: Option<SubjectStatus> },
    /// No such subject.
    Missing,
}

impl CasOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CasOutcome::Applied(_))
    }

    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CasOutcome::Applied(_) => "applied",
            CasOutcome::Conflict { .. } => "conflict",
            CasOutcome::Missing => "missing",
        }
    }
}

/// Subject table: primary key `id`, secondary lookup by `status`.
#[async_trait]
pub trait SubjectStore: Send + Sync {
    async fn get(&self, id: &SubjectId) -> StoreResult<Option<Subject>>;

    /// Every subject, ordered by id.
    async fn list(&self) -> StoreResult<Vec<Subject>>;

    /// Subjects with the given status, ordered by id, at most `limit` of them.
    async fn query_by_status(
        &self,
        status: SubjectStatus,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Subject>>;

    /// Insert-if-absent. An existing id yields `StoreError::AlreadyExists`.
    async fn insert(&self, subject: &Subject) -> StoreResult<()>;

    /// Apply `update` only if the stored row satisfies `expected`.
    async fn compare_and_set(
        &self,
        id: &SubjectId,
        expected: &Precondition,
        update: &SubjectUpdate,
    ) -> StoreResult<CasOutcome>;
}

/// Saying table: primary key `(subjectId, sequenceKey)`, append-only.
#[async_trait]
pub trait SayingStore: Send + Sync {
    /// All sayings of a subject in sequence-key order.
    async fn load_all(&self, subject_id: &SubjectId) -> StoreResult<Vec<Saying>>;

    /// Insert-if-absent on `(subjectId, sequenceKey)`.
    async fn append(&self, saying: &Saying) -> StoreResult<()>;
}

/// Order sayings by parsed sequence key; unparseable keys sort last, by raw text.
pub fn sort_sayings(sayings: &mut [Saying]) {
    sayings.sort_by(|a, b| match (a.parsed_key(), b.parsed_key()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.sequence_key.cmp(&b.sequence_key),
    });
}
