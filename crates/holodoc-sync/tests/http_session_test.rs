//! Session over real HTTP against a wiremock server.

use std::sync::Arc;

use holodoc_core::{CameraFrame, DocumentFields, SuccessPolicy};
use holodoc_sync::{HttpDocumentService, ServerConfig, Session};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_for(server: &MockServer, policy: SuccessPolicy) -> Session {
    let address = server.address();
    let config = ServerConfig {
        success_policy: policy,
        ..ServerConfig::new(address.ip().to_string(), address.port())
    };
    Session::new(Arc::new(HttpDocumentService::new(config).unwrap()))
}

fn document(id: &str, label: &str, error: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": "scan-0001",
        "label": label,
        "author": "J. Doe",
        "desc": "Tax form",
        "date": "2024-03-01",
        "path": "/srv/docs/scan-0001.pdf",
        "link": ["doc-8"],
        "error": error
    })
}

#[tokio::test]
async fn test_capture_and_edit_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/document/matchorcreate"))
        .and(header("content-type", "custom/content-type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document("doc-7", "W-2", "")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/document/update"))
        .and(body_partial_json(serde_json::json!({"id": "doc-7", "label": "W-2 (2023)"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(document("doc-7", "W-2 (2023)", "")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server, SuccessPolicy::Strict);
    let entity = session.capture(CameraFrame::solid(32, 24, [250, 250, 250, 255]).unwrap());
    session.settle().await;

    let record = session.record(entity).unwrap();
    assert_eq!(record.identity().unwrap().as_str(), "doc-7");
    assert_eq!(record.author(), "J. Doe");
    assert_eq!(record.path(), "/srv/docs/scan-0001.pdf");
    assert_eq!(record.linked_documents().len(), 1);

    let fields = record.fields().clone().with_label("W-2 (2023)");
    session.edit(entity, fields).unwrap();
    session.settle().await;
    assert_eq!(session.record(entity).unwrap().label(), "W-2 (2023)");
}

#[tokio::test]
async fn test_server_error_field_under_each_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/document/matchorcreate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document("doc-3", "Memo", "")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/document/update"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(document("doc-3", "Server label", "read-only")),
        )
        .mount(&server)
        .await;

    let mut strict = session_for(&server, SuccessPolicy::Strict);
    let entity = strict.capture(CameraFrame::solid(4, 4, [0, 0, 0, 255]).unwrap());
    strict.settle().await;
    strict
        .edit(entity, DocumentFields::default().with_label("Mine"))
        .unwrap();
    strict.settle().await;
    assert_eq!(strict.record(entity).unwrap().label(), "Mine");

    let mut lenient = session_for(&server, SuccessPolicy::BodyPresent);
    let entity = lenient.capture(CameraFrame::solid(4, 4, [0, 0, 0, 255]).unwrap());
    lenient.settle().await;
    lenient
        .edit(entity, DocumentFields::default().with_label("Mine"))
        .unwrap();
    lenient.settle().await;
    assert_eq!(lenient.record(entity).unwrap().label(), "Server label");
}

#[tokio::test]
async fn test_empty_match_response_fails_ingest() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/document/matchorcreate"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut session = session_for(&server, SuccessPolicy::BodyPresent);
    let entity = session.capture(CameraFrame::solid(4, 4, [9, 9, 9, 255]).unwrap());
    session.settle().await;
    assert!(!session.record(entity).unwrap().is_durable());
    assert_eq!(session.record(entity).unwrap().label(), "label");
}
