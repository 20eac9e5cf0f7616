mod common;

use common::{props, ship_bundle};
use serde_json::json;
use starfall_sync::{
    HttpRemote, HttpRemoteConfig, RemoteAttachment, RemoteRevision, RemoteStore, SyncError,
};
use starfall_types::{keys, DocumentId, Revision};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote_for(server: &MockServer) -> HttpRemote {
    HttpRemote::new(HttpRemoteConfig {
        base_url: server.uri(),
        database: "starfall".to_string(),
        ..HttpRemoteConfig::default()
    })
}

#[tokio::test]
async fn changes_since_parses_the_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/starfall/_changes"))
        .and(query_param("since", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "doc_id": keys::PROFILE_DOC_ID,
                "rev": "1-abcd",
                "properties": { (keys::FIELD_SHIP_REF): "red_five" },
            }],
            "last_seq": 7,
        })))
        .mount(&server)
        .await;

    let remote = remote_for(&server);
    let batch = remote.changes_since(0).await.unwrap();

    assert_eq!(batch.last_seq, 7);
    assert_eq!(batch.revisions.len(), 1);
    let revision = &batch.revisions[0];
    assert_eq!(revision.doc_id, DocumentId::new(keys::PROFILE_DOC_ID));
    assert_eq!(revision.rev, Revision::from_parts(1, "abcd"));
    assert_eq!(revision.parent, None);
    assert_eq!(
        revision.properties.get(keys::FIELD_SHIP_REF),
        Some(&json!("red_five"))
    );
}

#[tokio::test]
async fn changes_since_decodes_base64_attachments() {
    let bundle = ship_bundle();
    let encoded = {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(&bundle)
    };

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/starfall/_changes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "doc_id": "red_five",
                "rev": "1-abcd",
                "properties": { (keys::FIELD_TYPE): (keys::SHIP_MODEL_TYPE) },
                "attachments": [{ "name": "bundle", "content": encoded }],
            }],
            "last_seq": 1,
        })))
        .mount(&server)
        .await;

    let remote = remote_for(&server);
    let batch = remote.changes_since(0).await.unwrap();
    assert_eq!(batch.revisions[0].attachments[0].content, bundle);
}

#[tokio::test]
async fn a_server_error_is_a_remote_fault() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/starfall/_changes"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let remote = remote_for(&server);
    let err = remote.changes_since(0).await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(_)));
}

#[tokio::test]
async fn an_unreachable_endpoint_is_a_network_fault() {
    // Nothing listens here.
    let remote = HttpRemote::new(HttpRemoteConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..HttpRemoteConfig::default()
    });
    let err = remote.changes_since(0).await.unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));
}

#[tokio::test]
async fn push_posts_revisions_as_bulk_docs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/starfall/_bulk_docs"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let properties = props(&[(keys::FIELD_HIGH_SCORE, json!(150))]);
    let rev = Revision::first(&properties);
    let remote = remote_for(&server);
    remote
        .push(vec![RemoteRevision {
            doc_id: DocumentId::new(keys::PROFILE_DOC_ID),
            rev,
            parent: None,
            properties,
            attachments: Vec::new(),
        }])
        .await
        .unwrap();
}

#[tokio::test]
async fn push_surfaces_a_rejecting_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/starfall/_bulk_docs"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let remote = remote_for(&server);
    let err = remote
        .push(vec![RemoteRevision {
            doc_id: DocumentId::new(keys::PROFILE_DOC_ID),
            rev: Revision::from_parts(1, "abcd"),
            parent: None,
            properties: props(&[]),
            attachments: Vec::new(),
        }])
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Remote(_)));
}

#[test]
fn attachment_bytes_serialize_as_base64_strings() {
    let attachment = RemoteAttachment {
        name: "bundle".to_string(),
        content: b"meshdata".to_vec(),
    };
    let value = serde_json::to_value(&attachment).unwrap();
    assert!(value["content"].is_string());

    let back: RemoteAttachment = serde_json::from_value(value).unwrap();
    assert_eq!(back.content, b"meshdata");
}
