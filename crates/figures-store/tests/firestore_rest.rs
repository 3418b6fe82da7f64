//! Firestore stores against a mocked REST endpoint.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use figures_models::{Saying, SequenceKey, Subject, SubjectId, SubjectStatus};
use figures_store::retry::RetryPolicy;
use figures_store::{
    CasOutcome, FirestoreClient, FirestoreConfig, FirestoreSayingStore, FirestoreSubjectStore,
    Precondition, SayingStore, StoreError, SubjectStore, SubjectUpdate,
};

const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";
const UPDATE_TIME: &str = "2024-05-01T10:00:00.123456Z";

async fn client(server: &MockServer) -> FirestoreClient {
    let config = FirestoreConfig {
        project_id: "demo".to_string(),
        database_id: "(default)".to_string(),
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry: RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        emulator_host: Some(server.uri()),
    };
    FirestoreClient::new(config).await.unwrap()
}

fn subject_doc(id: &str, status: &str, locked_until: Option<i64>) -> serde_json::Value {
    let mut fields = json!({
        "id": {"stringValue": id},
        "displayName": {"stringValue": "織田信長"},
        "status": {"stringValue": status},
        "updatedAt": {"integerValue": "1714557600000"}
    });
    if let Some(deadline) = locked_until {
        fields["lockedUntil"] = json!({"integerValue": deadline.to_string()});
    }
    json!({
        "name": format!("projects/demo/databases/(default)/documents/figures/{}", id),
        "fields": fields,
        "updateTime": UPDATE_TIME
    })
}

#[tokio::test]
async fn test_get_subject_maps_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(subject_doc("figure-001", "locked", Some(42))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-404", DOCS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = FirestoreSubjectStore::new(client(&server).await, "figures");

    let subject = store.get(&SubjectId::from_ordinal(1)).await.unwrap().unwrap();
    assert_eq!(subject.display_name, "織田信長");
    assert_eq!(subject.status, SubjectStatus::Locked);
    assert_eq!(subject.locked_until, Some(42));

    assert!(store.get(&SubjectId::from("figure-404")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(subject_doc("figure-001", "available", None)))
        .mount(&server)
        .await;

    let store = FirestoreSubjectStore::new(client(&server).await, "figures");
    let subject = store.get(&SubjectId::from_ordinal(1)).await.unwrap().unwrap();
    assert_eq!(subject.status, SubjectStatus::Available);
}

#[tokio::test]
async fn test_compare_and_set_sends_update_time_precondition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(subject_doc("figure-001", "available", None)))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .and(query_param("currentDocument.updateTime", UPDATE_TIME))
        .and(body_partial_json(json!({
            "fields": {
                "status": {"stringValue": "locked"},
                "lockedUntil": {"integerValue": "3600000"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(subject_doc("figure-001", "locked", Some(3_600_000))))
        .expect(1)
        .mount(&server)
        .await;

    let store = FirestoreSubjectStore::new(client(&server).await, "figures");
    let outcome = store
        .compare_and_set(
            &SubjectId::from_ordinal(1),
            &Precondition::status(SubjectStatus::Available),
            &SubjectUpdate::lock(3_600_000, 0),
        )
        .await
        .unwrap();

    match outcome {
        CasOutcome::Applied(subject) => {
            assert_eq!(subject.status, SubjectStatus::Locked);
            assert_eq!(subject.locked_until, Some(3_600_000));
        }
        other => panic!("expected applied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_compare_and_set_reports_write_race_as_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(subject_doc("figure-001", "available", None)))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "status": "FAILED_PRECONDITION", "message": "the stored version does not match"}
        })))
        .mount(&server)
        .await;

    let store = FirestoreSubjectStore::new(client(&server).await, "figures");
    let outcome = store
        .compare_and_set(
            &SubjectId::from_ordinal(1),
            &Precondition::status(SubjectStatus::Available),
            &SubjectUpdate::lock(1, 0),
        )
        .await
        .unwrap();

    assert_eq!(outcome, CasOutcome::Conflict { current: None });
}

#[tokio::test]
async fn test_interrupted_write_that_landed_is_applied() {
    let server = MockServer::start().await;
    let now = 1_714_557_600_000;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(subject_doc("figure-001", "available", None)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(subject_doc("figure-001", "locked", Some(now + 60))))
        .mount(&server)
        .await;
    // The first PATCH lands but its response is lost; the retry sees a new updateTime.
    Mock::given(method("PATCH"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;

    let store = FirestoreSubjectStore::new(client(&server).await, "figures");
    let id = SubjectId::from_ordinal(1);
    let precondition = Precondition::status(SubjectStatus::Available);

    let ours = store
        .compare_and_set(&id, &precondition, &SubjectUpdate::lock(now + 60, now))
        .await
        .unwrap();
    match ours {
        CasOutcome::Applied(subject) => assert_eq!(subject.locked_until, Some(now + 60)),
        other => panic!("expected applied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_interrupted_write_lost_to_another_writer_is_a_conflict() {
    let server = MockServer::start().await;
    let now = 1_714_557_600_000;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(subject_doc("figure-001", "available", None)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(subject_doc("figure-001", "locked", Some(now + 999))))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;

    let store = FirestoreSubjectStore::new(client(&server).await, "figures");
    let outcome = store
        .compare_and_set(
            &SubjectId::from_ordinal(1),
            &Precondition::status(SubjectStatus::Available),
            &SubjectUpdate::lock(now + 60, now),
        )
        .await
        .unwrap();
    assert_eq!(outcome, CasOutcome::Conflict { current: None });
}

#[tokio::test]
async fn test_compare_and_set_checks_precondition_before_writing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/figures/figure-001", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(subject_doc("figure-001", "locked", Some(10))))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = FirestoreSubjectStore::new(client(&server).await, "figures");
    let outcome = store
        .compare_and_set(
            &SubjectId::from_ordinal(1),
            &Precondition::status(SubjectStatus::Locked).with_locked_until(11),
            &SubjectUpdate::unlocked(SubjectStatus::Available, 20),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CasOutcome::Conflict {
            current: Some(SubjectStatus::Locked)
        }
    );
}

#[tokio::test]
async fn test_query_by_status_uses_run_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .and(body_partial_json(json!({
            "structuredQuery": {
                "from": [{"collectionId": "figures"}],
                "where": {"fieldFilter": {
                    "field": {"fieldPath": "status"},
                    "op": "EQUAL",
                    "value": {"stringValue": "available"}
                }},
                "limit": 1
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"document": subject_doc("figure-002", "available", None), "readTime": UPDATE_TIME}
        ])))
        .mount(&server)
        .await;

    let store = FirestoreSubjectStore::new(client(&server).await, "figures");
    let found = store
        .query_by_status(SubjectStatus::Available, Some(1))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id.as_str(), "figure-002");
}

#[tokio::test]
async fn test_insert_conflict_is_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/figures", DOCS)))
        .and(query_param("documentId", "figure-001"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let store = FirestoreSubjectStore::new(client(&server).await, "figures");
    let subject = Subject::new(SubjectId::from_ordinal(1), "織田信長", SubjectStatus::Ready, 0);
    let err = store.insert(&subject).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_sayings_are_paged_and_ordered() {
    let server = MockServer::start().await;
    let collection = format!("{}/figures/figure-001/sayings", DOCS);
    let saying_doc = |key: &str, text: &str| {
        json!({
            "name": format!("projects/demo/databases/(default)/documents/figures/figure-001/sayings/{}", key),
            "fields": {
                "sequenceKey": {"stringValue": key},
                "text": {"stringValue": text},
                "fingerprint": {"stringValue": "x"},
                "createdAt": {"integerValue": "1"}
            }
        })
    };

    Mock::given(method("GET"))
        .and(path(collection.clone()))
        .and(query_param("pageToken", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [saying_doc("snip-000001", "天下布武")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(collection.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [saying_doc("snip-000002", "是非に及ばず")],
            "nextPageToken": "next"
        })))
        .mount(&server)
        .await;

    let store = FirestoreSayingStore::new(client(&server).await, "figures", "sayings");
    let sayings = store.load_all(&SubjectId::from_ordinal(1)).await.unwrap();
    let keys: Vec<&str> = sayings.iter().map(|s| s.sequence_key.as_str()).collect();
    assert_eq!(keys, vec!["snip-000001", "snip-000002"]);
}

#[tokio::test]
async fn test_append_saying_uses_sequence_key_as_document_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/figures/figure-001/sayings", DOCS)))
        .and(query_param("documentId", "snip-000007"))
        .and(body_partial_json(json!({
            "fields": {"text": {"stringValue": "天下布武"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/databases/(default)/documents/figures/figure-001/sayings/snip-000007"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = FirestoreSayingStore::new(client(&server).await, "figures", "sayings");
    let saying = Saying::new(SubjectId::from_ordinal(1), SequenceKey(7), "天下布武", "fp", 1);
    store.append(&saying).await.unwrap();
}

#[tokio::test]
async fn test_interrupted_append_is_settled_by_reading_back() {
    let server = MockServer::start().await;
    let collection = format!("{}/figures/figure-001/sayings", DOCS);
    Mock::given(method("POST"))
        .and(path(collection.clone()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(collection.clone()))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/snip-000003", collection)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/databases/(default)/documents/figures/figure-001/sayings/snip-000003",
            "fields": {
                "sequenceKey": {"stringValue": "snip-000003"},
                "text": {"stringValue": "天下布武"}
            }
        })))
        .mount(&server)
        .await;

    let store = FirestoreSayingStore::new(client(&server).await, "figures", "sayings");
    let ours = Saying::new(SubjectId::from_ordinal(1), SequenceKey(3), "天下布武", "fp", 1);
    store.append(&ours).await.unwrap();

    // Someone else's saying under the same key is still a collision.
    let theirs = Saying::new(SubjectId::from_ordinal(1), SequenceKey(3), "是非に及ばず", "fp2", 1);
    let err = store.append(&theirs).await.unwrap_err();
    assert!(err.is_already_exists());
}
