//! In-memory store with the same conditional-write semantics as Firestore.
//!
//! Backs `FIGURES_STORE=memory` runs and the worker test suites. Each
//! operation holds the table lock for its whole duration, so a
//! compare-and-set is atomic with respect to every other caller.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use figures_models::{Saying, Subject, SubjectId, SubjectStatus};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_conditional_write;
use crate::store::{sort_sayings, CasOutcome, Precondition, SayingStore, SubjectStore, SubjectUpdate};

#[derive(Default)]
pub struct InMemoryStore {
    subjects: Mutex<BTreeMap<SubjectId, Subject>>,
    sayings: Mutex<HashMap<SubjectId, BTreeMap<String, Saying>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with subjects, replacing any duplicates by id.
    pub fn with_subjects(subjects: impl IntoIterator<Item = Subject>) -> Self {
        let table = subjects.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self {
            subjects: Mutex::new(table),
            sayings: Mutex::new(HashMap::new()),
        }
    }

    /// Number of sayings stored for a subject.
    pub async fn saying_count(&self, subject_id: &SubjectId) -> usize {
        self.sayings
            .lock()
            .await
            .get(subject_id)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SubjectStore for InMemoryStore {
    async fn get(&self, id: &SubjectId) -> StoreResult<Option<Subject>> {
        Ok(self.subjects.lock().await.get(id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Subject>> {
        Ok(self.subjects.lock().await.values().cloned().collect())
    }

    async fn query_by_status(
        &self,
        status: SubjectStatus,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Subject>> {
        let subjects = self.subjects.lock().await;
        Ok(subjects
            .values()
            .filter(|s| s.status == status)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn insert(&self, subject: &Subject) -> StoreResult<()> {
        let mut subjects = self.subjects.lock().await;
        if subjects.contains_key(&subject.id) {
            return Err(StoreError::AlreadyExists(subject.id.to_string()));
        }
        subjects.insert(subject.id.clone(), subject.clone());
        Ok(())
    }

    async fn compare_and_set(
        &self,
        id: &SubjectId,
        expected: &Precondition,
        update: &SubjectUpdate,
    ) -> StoreResult<CasOutcome> {
        let mut subjects = self.subjects.lock().await;
        let outcome = match subjects.get_mut(id) {
            None => CasOutcome::Missing,
            Some(current) if !expected.matches(current) => CasOutcome::Conflict {
                current: Some(current.status),
            },
            Some(current) => {
                update.apply_to(current);
                CasOutcome::Applied(current.clone())
            }
        };
        record_conditional_write(outcome.label());
        Ok(outcome)
    }
}

#[async_trait]
impl SayingStore for InMemoryStore {
    async fn load_all(&self, subject_id: &SubjectId) -> StoreResult<Vec<Saying>> {
        let sayings = self.sayings.lock().await;
        let mut loaded: Vec<Saying> = sayings
            .get(subject_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        sort_sayings(&mut loaded);
        Ok(loaded)
    }

    async fn append(&self, saying: &Saying) -> StoreResult<()> {
        let mut sayings = self.sayings.lock().await;
        let rows = sayings.entry(saying.subject_id.clone()).or_default();
        if rows.contains_key(&saying.sequence_key) {
            return Err(StoreError::AlreadyExists(format!(
                "{}/{}",
                saying.subject_id, saying.sequence_key
            )));
        }
        rows.insert(saying.sequence_key.clone(), saying.clone());
        Ok(())
    }
}
