//! Firestore-backed subject table.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info};

use figures_models::{Subject, SubjectId, SubjectStatus};

use crate::client::FirestoreClient;
use crate::retry::WriteAttempt;
use crate::error::{StoreError, StoreResult};
use crate::metrics::record_conditional_write;
use crate::store::{CasOutcome, Precondition, SubjectStore, SubjectUpdate};
use crate::types::{
    CollectionSelector, Cursor, Document, Filter, FromFirestoreValue, Order, StructuredQuery,
    ToFirestoreValue, Value,
};

/// Default subject collection.
pub const DEFAULT_SUBJECTS_COLLECTION: &str = "figures";

/// Page size for status-index scans.
const STATUS_PAGE_SIZE: usize = 100;

/// Fields touched by a lease transition.
const LEASE_FIELDS: [&str; 3] = ["status", "lockedUntil", "updatedAt"];

/// Repository for subject documents.
pub struct FirestoreSubjectStore {
    client: FirestoreClient,
    collection: String,
}

impl FirestoreSubjectStore {
    pub fn new(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Full resource name used as a `__name__` cursor value.
    fn resource_name(&self, id: &SubjectId) -> String {
        let config = self.client.config();
        format!(
            "projects/{}/databases/{}/documents/{}/{}",
            config.project_id,
            config.database_id,
            self.collection,
            id.as_str()
        )
    }

    fn status_query(&self, status: SubjectStatus, limit: usize, after: Option<&SubjectId>) -> StructuredQuery {
        StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: self.collection.clone(),
                all_descendants: None,
            }],
            r#where: Some(Filter::field(
                "status",
                "EQUAL",
                Value::StringValue(status.as_str().to_string()),
            )),
            order_by: Some(vec![Order::ascending("__name__")]),
            start_at: after.map(|id| Cursor {
                values: vec![Value::ReferenceValue(self.resource_name(id))],
                before: Some(false),
            }),
            limit: Some(limit as i32),
        }
    }
}

#[async_trait]
impl SubjectStore for FirestoreSubjectStore {
    async fn get(&self, id: &SubjectId) -> StoreResult<Option<Subject>> {
        let doc = self
            .client
            .read_with_retry("get_subject", || {
                self.client.get_document(&self.collection, id.as_str())
            })
            .await?;

        doc.map(|d| document_to_subject(&d)).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<Subject>> {
        let docs = self.client.list_all_documents(&self.collection).await?;
        let mut subjects = docs
            .iter()
            .map(document_to_subject)
            .collect::<StoreResult<Vec<_>>>()?;
        subjects.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(subjects)
    }

    async fn query_by_status(
        &self,
        status: SubjectStatus,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Subject>> {
        let mut subjects: Vec<Subject> = Vec::new();

        loop {
            let remaining = limit.map(|l| l.saturating_sub(subjects.len()));
            if remaining == Some(0) {
                break;
            }
            let page_size = remaining.unwrap_or(STATUS_PAGE_SIZE).min(STATUS_PAGE_SIZE);
            let after = subjects.last().map(|s| s.id.clone());
            let query = self.status_query(status, page_size, after.as_ref());

            let docs = self
                .client
                .read_with_retry("query_subjects_by_status", || {
                    self.client.run_query("", query.clone())
                })
                .await?;

            let fetched = docs.len();
            for doc in &docs {
                subjects.push(document_to_subject(doc)?);
            }

            if fetched < page_size {
                break;
            }
        }

        debug!(status = %status, count = subjects.len(), "Queried subjects by status");
        Ok(subjects)
    }

    async fn insert(&self, subject: &Subject) -> StoreResult<()> {
        let fields = subject_to_fields(subject);
        let attempt = self
            .client
            .write_with_retry("create_subject", || {
                self.client
                    .create_document(&self.collection, subject.id.as_str(), fields.clone())
            })
            .await?;

        match attempt {
            WriteAttempt::Done(_) => {}
            WriteAttempt::Rejected(e) => return Err(e),
            WriteAttempt::Ambiguous(e) => {
                // Our interrupted create may be the document that now exists.
                let ours = self.get(&subject.id).await?.is_some_and(|stored| {
                    stored.display_name == subject.display_name && stored.status == subject.status
                });
                if !ours {
                    return Err(e);
                }
            }
        }
        info!(subject_id = %subject.id, status = %subject.status, "Inserted subject");
        Ok(())
    }

    async fn compare_and_set(
        &self,
        id: &SubjectId,
        expected: &Precondition,
        update: &SubjectUpdate,
    ) -> StoreResult<CasOutcome> {
        let doc = self
            .client
            .read_with_retry("get_subject", || {
                self.client.get_document(&self.collection, id.as_str())
            })
            .await?;

        let Some(doc) = doc else {
            record_conditional_write("missing");
            return Ok(CasOutcome::Missing);
        };

        let mut current = document_to_subject(&doc)?;
        if !expected.matches(&current) {
            record_conditional_write("conflict");
            return Ok(CasOutcome::Conflict {
                current: Some(current.status),
            });
        }

        let update_time = doc.update_time.as_deref().ok_or_else(|| {
            StoreError::invalid_document(format!("{}/{} has no updateTime", self.collection, id))
        })?;

        // Masked fields absent from the body are deleted, which is how a
        // transition drops lockedUntil.
        let fields = update_to_fields(update);
        let result = self
            .client
            .write_with_retry("update_subject", || {
                self.client.update_document_with_precondition(
                    &self.collection,
                    id.as_str(),
                    fields.clone(),
                    Some(LEASE_FIELDS.iter().map(|f| f.to_string()).collect()),
                    Some(update_time),
                )
            })
            .await;

        let outcome = match result {
            Ok(WriteAttempt::Done(_)) => {
                update.apply_to(&mut current);
                CasOutcome::Applied(current)
            }
            Ok(WriteAttempt::Rejected(_)) => {
                debug!(subject_id = %id, "Subject changed between read and write");
                CasOutcome::Conflict { current: None }
            }
            Ok(WriteAttempt::Ambiguous(_)) => match self.get(id).await? {
                // The interrupted attempt landed if the row carries our exact update.
                Some(stored) if carries(&stored, update) => CasOutcome::Applied(stored),
                Some(_) => CasOutcome::Conflict { current: None },
                None => CasOutcome::Missing,
            },
            Err(StoreError::NotFound(_)) => CasOutcome::Missing,
            Err(e) => return Err(e),
        };
        record_conditional_write(outcome.label());
        Ok(outcome)
    }
}

// =============================================================================
// Document mapping
// =============================================================================

fn carries(subject: &Subject, update: &SubjectUpdate) -> bool {
    subject.status == update.status
        && subject.locked_until == update.locked_until
        && subject.updated_at == update.updated_at
}

fn update_to_fields(update: &SubjectUpdate) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("status".to_string(), update.status.as_str().to_firestore_value());
    fields.insert("updatedAt".to_string(), update.updated_at.to_firestore_value());
    if let Some(deadline) = update.locked_until {
        fields.insert("lockedUntil".to_string(), deadline.to_firestore_value());
    }
    fields
}

fn subject_to_fields(subject: &Subject) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), subject.id.as_str().to_firestore_value());
    fields.insert("displayName".to_string(), subject.display_name.to_firestore_value());
    fields.insert("status".to_string(), subject.status.as_str().to_firestore_value());
    fields.insert("updatedAt".to_string(), subject.updated_at.to_firestore_value());

    if let Some(deadline) = subject.locked_until {
        fields.insert("lockedUntil".to_string(), deadline.to_firestore_value());
    }
    if let Some(created_at) = subject.created_at {
        fields.insert("createdAt".to_string(), created_at.to_firestore_value());
    }
    if let Some(title) = &subject.youtube_title {
        fields.insert("youtubeTitle".to_string(), title.to_firestore_value());
    }
    if let Some(bio) = &subject.bio {
        fields.insert("bio".to_string(), bio.to_firestore_value());
    }
    if !subject.tags.is_empty() {
        fields.insert("tags".to_string(), subject.tags.to_firestore_value());
    }
    fields
}

fn document_to_subject(doc: &Document) -> StoreResult<Subject> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| StoreError::InvalidResponse("Document has no fields".to_string()))?;

    let get_string = |key: &str| fields.get(key).and_then(String::from_firestore_value);
    let get_i64 = |key: &str| fields.get(key).and_then(i64::from_firestore_value);

    let id = get_string("id")
        .or_else(|| doc.doc_id().map(str::to_string))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StoreError::invalid_document("subject has no id"))?;

    let raw_status = get_string("status").unwrap_or_default();
    let status: SubjectStatus = raw_status.parse().map_err(|_| {
        StoreError::invalid_document(format!("subject {} has unknown status '{}'", id, raw_status))
    })?;

    Ok(Subject {
        id: SubjectId::from_string(id),
        display_name: get_string("displayName").unwrap_or_default(),
        status,
        // A deadline only means something while locked.
        locked_until: get_i64("lockedUntil").filter(|_| status == SubjectStatus::Locked),
        updated_at: get_i64("updatedAt").unwrap_or(0),
        created_at: get_i64("createdAt"),
        youtube_title: get_string("youtubeTitle"),
        bio: get_string("bio"),
        tags: fields
            .get("tags")
            .and_then(Vec::<String>::from_firestore_value)
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_fields_round_trip() {
        let mut subject = Subject::new(
            SubjectId::from_ordinal(3),
            "坂本龍馬",
            SubjectStatus::Locked,
            1_700_000_000_000,
        );
        subject.locked_until = Some(1_700_003_600_000);
        subject.tags = vec!["bakumatsu".to_string()];

        let mut doc = Document::new(subject_to_fields(&subject));
        doc.name = Some("projects/p/databases/(default)/documents/figures/figure-003".to_string());

        assert_eq!(document_to_subject(&doc).unwrap(), subject);
    }

    #[test]
    fn test_document_without_id_field_uses_name() {
        let mut fields = HashMap::new();
        fields.insert("displayName".to_string(), "徳川家康".to_firestore_value());
        fields.insert("status".to_string(), "available".to_firestore_value());
        let mut doc = Document::new(fields);
        doc.name = Some("projects/p/databases/(default)/documents/figures/figure-009".to_string());

        let subject = document_to_subject(&doc).unwrap();
        assert_eq!(subject.id.as_str(), "figure-009");
        assert_eq!(subject.status, SubjectStatus::Available);
        assert_eq!(subject.locked_until, None);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), "figure-001".to_firestore_value());
        fields.insert("status".to_string(), "archived".to_firestore_value());
        let err = document_to_subject(&Document::new(fields)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
    }

    #[test]
    fn test_release_update_omits_deadline() {
        let fields = update_to_fields(&SubjectUpdate::unlocked(SubjectStatus::Available, 5));
        assert!(!fields.contains_key("lockedUntil"));
        assert_eq!(fields.get("status"), Some(&Value::StringValue("available".into())));

        let fields = update_to_fields(&SubjectUpdate::lock(99, 5));
        assert_eq!(fields.get("lockedUntil"), Some(&Value::IntegerValue("99".into())));
    }
}
