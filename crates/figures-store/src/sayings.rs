//! Firestore-backed saying table.
//!
//! Sayings live in a sub-collection of their subject
//! (`figures/{subjectId}/sayings/{sequenceKey}`), so the document id doubles
//! as the `(subjectId, sequenceKey)` primary key.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use figures_models::{Saying, SubjectId};

use crate::client::FirestoreClient;
use crate::error::{StoreError, StoreResult};
use crate::retry::WriteAttempt;
use crate::store::{sort_sayings, SayingStore};
use crate::types::{Document, FromFirestoreValue, ToFirestoreValue, Value};

/// Default saying sub-collection name.
pub const DEFAULT_SAYINGS_COLLECTION: &str = "sayings";

pub struct FirestoreSayingStore {
    client: FirestoreClient,
    subjects_collection: String,
    sayings_collection: String,
}

impl FirestoreSayingStore {
    pub fn new(
        client: FirestoreClient,
        subjects_collection: impl Into<String>,
        sayings_collection: impl Into<String>,
    ) -> Self {
        Self {
            client,
            subjects_collection: subjects_collection.into(),
            sayings_collection: sayings_collection.into(),
        }
    }

    fn collection(&self, subject_id: &SubjectId) -> String {
        format!(
            "{}/{}/{}",
            self.subjects_collection,
            subject_id.as_str(),
            self.sayings_collection
        )
    }
}

#[async_trait]
impl SayingStore for FirestoreSayingStore {
    async fn load_all(&self, subject_id: &SubjectId) -> StoreResult<Vec<Saying>> {
        let docs = self.client.list_all_documents(&self.collection(subject_id)).await?;

        let mut sayings = docs
            .iter()
            .map(|doc| document_to_saying(doc, subject_id))
            .collect::<StoreResult<Vec<_>>>()?;

        sort_sayings(&mut sayings);
        debug!(subject_id = %subject_id, count = sayings.len(), "Loaded sayings");
        Ok(sayings)
    }

    async fn append(&self, saying: &Saying) -> StoreResult<()> {
        let collection = self.collection(&saying.subject_id);
        let fields = saying_to_fields(saying);
        let attempt = self
            .client
            .write_with_retry("create_saying", || {
                self.client
                    .create_document(&collection, &saying.sequence_key, fields.clone())
            })
            .await?;

        match attempt {
            WriteAttempt::Done(_) => Ok(()),
            WriteAttempt::Rejected(e) => Err(e),
            WriteAttempt::Ambiguous(e) => {
                // Settled by whatever now sits under our sequence key.
                let stored = self
                    .client
                    .read_with_retry("get_saying", || {
                        self.client.get_document(&collection, &saying.sequence_key)
                    })
                    .await?
                    .map(|doc| document_to_saying(&doc, &saying.subject_id))
                    .transpose()?;
                match stored {
                    Some(stored) if stored.text == saying.text => {
                        debug!(sequence_key = %saying.sequence_key, "Interrupted append had landed");
                        Ok(())
                    }
                    _ => Err(e),
                }
            }
        }
    }
}

fn saying_to_fields(saying: &Saying) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("subjectId".to_string(), saying.subject_id.as_str().to_firestore_value());
    fields.insert("sequenceKey".to_string(), saying.sequence_key.to_firestore_value());
    fields.insert("text".to_string(), saying.text.to_firestore_value());
    fields.insert("fingerprint".to_string(), saying.fingerprint.to_firestore_value());
    fields.insert("createdAt".to_string(), saying.created_at.to_firestore_value());
    if let Some(name) = &saying.display_name {
        fields.insert("displayName".to_string(), name.to_firestore_value());
    }
    fields
}

fn document_to_saying(doc: &Document, subject_id: &SubjectId) -> StoreResult<Saying> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| StoreError::InvalidResponse("Document has no fields".to_string()))?;

    let get_string = |key: &str| fields.get(key).and_then(String::from_firestore_value);

    let sequence_key = get_string("sequenceKey")
        .or_else(|| doc.doc_id().map(str::to_string))
        .ok_or_else(|| StoreError::invalid_document("saying has no sequence key"))?;

    let text = get_string("text").ok_or_else(|| {
        StoreError::invalid_document(format!("saying {} has no text", sequence_key))
    })?;

    Ok(Saying {
        subject_id: subject_id.clone(),
        sequence_key,
        text,
        // Recomputed by the accumulator on load; stored value is informational.
        fingerprint: get_string("fingerprint").unwrap_or_default(),
        display_name: get_string("displayName"),
        created_at: fields
            .get("createdAt")
            .and_then(i64::from_firestore_value)
            .unwrap_or(0),
    })
}
