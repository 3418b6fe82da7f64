//! Subject leasing.
//!
//! Every transition of a subject's `status`/`lockedUntil` goes through a single
//! conditional write on the store, keyed by what was last observed. Losing a
//! race is a normal outcome, never an error.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use figures_models::{now_millis, EpochMillis, ReleaseSummary, Subject, SubjectId, SubjectStatus};
use figures_store::{CasOutcome, Precondition, SubjectStore, SubjectUpdate};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics::{record_claim, record_release};

/// Conditional writes re-read and re-attempted when the row changed between
/// read and write without the precondition being violated.
const MAX_WRITE_RACE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct SubjectLockManager {
    store: Arc<dyn SubjectStore>,
    lease: Duration,
}

impl SubjectLockManager {
    pub fn new(store: Arc<dyn SubjectStore>, lease: Duration) -> Self {
        Self { store, lease }
    }

    fn lease_millis(&self) -> EpochMillis {
        i64::try_from(self.lease.as_millis()).unwrap_or(i64::MAX)
    }

    /// Claim one available subject, or `None` if nothing could be claimed.
    pub async fn claim_next(&self) -> WorkerResult<Option<Subject>> {
        self.claim_next_at(now_millis()).await
    }

    /// Claim with an explicit clock. A lost race yields `None`; the caller
    /// tries again on its next invocation.
    pub async fn claim_next_at(&self, now: EpochMillis) -> WorkerResult<Option<Subject>> {
        let candidates = self
            .store
            .query_by_status(SubjectStatus::Available, Some(1))
            .await?;

        let Some(candidate) = candidates
            .into_iter()
            .find(|subject| subject.status.is_claimable())
        else {
            debug!("No available subjects");
            record_claim("none_available");
            return Ok(None);
        };

        let deadline = now.saturating_add(self.lease_millis());
        let outcome = self
            .store
            .compare_and_set(
                &candidate.id,
                &Precondition::status(SubjectStatus::Available),
                &SubjectUpdate::lock(deadline, now),
            )
            .await?;

        match outcome {
            CasOutcome::Applied(subject) => {
                info!(
                    subject_id = %subject.id,
                    locked_until = deadline,
                    "Claimed subject"
                );
                record_claim("claimed");
                Ok(Some(subject))
            }
            other => {
                info!(
                    subject_id = %candidate.id,
                    outcome = other.label(),
                    "Claim raced by another worker"
                );
                record_claim("conflict");
                Ok(None)
            }
        }
    }

    /// Move a subject to `completed`. Idempotent for already-completed subjects.
    pub async fn mark_completed(&self, id: &SubjectId) -> WorkerResult<Subject> {
        self.transition(
            id,
            &[SubjectStatus::Locked, SubjectStatus::Completed],
            SubjectStatus::Completed,
        )
        .await
    }

    /// Release a `ready` subject into the claimable pool.
    pub async fn activate(&self, id: &SubjectId) -> WorkerResult<Subject> {
        self.transition(id, &[SubjectStatus::Ready], SubjectStatus::Available)
            .await
    }

    async fn transition(
        &self,
        id: &SubjectId,
        from: &[SubjectStatus],
        to: SubjectStatus,
    ) -> WorkerResult<Subject> {
        if id.is_empty() {
            return Err(WorkerError::invalid_input("subjectId is required"));
        }

        let expected = Precondition::status_in(from);
        for attempt in 1..=MAX_WRITE_RACE_ATTEMPTS {
            let update = SubjectUpdate::unlocked(to, now_millis());
            match self.store.compare_and_set(id, &expected, &update).await? {
                CasOutcome::Applied(subject) => {
                    info!(subject_id = %id, status = %to, "Subject transitioned");
                    return Ok(subject);
                }
                CasOutcome::Missing => {
                    return Err(WorkerError::SubjectNotFound(id.to_string()));
                }
                CasOutcome::Conflict {
                    current: Some(current),
                } => {
                    return Err(WorkerError::InvalidTransition {
                        subject_id: id.to_string(),
                        from: current,
                        to,
                    });
                }
                CasOutcome::Conflict { current: None } => {
                    debug!(subject_id = %id, attempt, "Subject changed during write, re-reading");
                }
            }
        }

        // Still racing: report whatever the row holds now.
        match self.store.get(id).await? {
            Some(subject) if subject.status == to => Ok(subject),
            Some(subject) => Err(WorkerError::InvalidTransition {
                subject_id: id.to_string(),
                from: subject.status,
                to,
            }),
            None => Err(WorkerError::SubjectNotFound(id.to_string())),
        }
    }

    /// Return every locked subject whose lease ended before `now` to `available`.
    pub async fn release_expired(&self, now: EpochMillis) -> WorkerResult<ReleaseSummary> {
        let locked = self
            .store
            .query_by_status(SubjectStatus::Locked, None)
            .await?;

        let mut summary = ReleaseSummary::default();
        for subject in locked.into_iter().filter(|s| s.lease_expired(now)) {
            summary.examined += 1;

            // lease_expired guarantees the deadline is present
            let Some(observed) = subject.locked_until else {
                continue;
            };
            let expected = Precondition::status(SubjectStatus::Locked).with_locked_until(observed);
            let update = SubjectUpdate::unlocked(SubjectStatus::Available, now);

            match self.store.compare_and_set(&subject.id, &expected, &update).await? {
                CasOutcome::Applied(_) => {
                    info!(subject_id = %subject.id, locked_until = observed, "Released expired lease");
                    summary.released += 1;
                }
                other => {
                    info!(
                        subject_id = %subject.id,
                        outcome = other.label(),
                        "Expired lease already handled elsewhere, skipping"
                    );
                    summary.skipped += 1;
                }
            }
        }

        record_release("released", summary.released);
        record_release("skipped", summary.skipped);
        Ok(summary)
    }
}
