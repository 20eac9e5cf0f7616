mod common;

use common::{expect_event, expect_quiet, props};
use serde_json::json;
use starfall_store::DocumentStore;
use starfall_sync::{dispatch, DocumentWatch, FieldHandler};
use starfall_types::{keys, DocumentId, Revision};
use std::sync::Arc;
use tokio::sync::mpsc;

struct Fixture {
    store: Arc<DocumentStore>,
    doc_id: DocumentId,
    values: mpsc::UnboundedReceiver<serde_json::Value>,
    token: starfall_sync::WatchToken,
}

/// Creates a profile document, spawns a primary-loop drain task, and
/// installs a watch whose handler records every dispatched value.
fn watch_profile() -> Fixture {
    let store = Arc::new(DocumentStore::open_in_memory().unwrap());
    let doc_id = DocumentId::new(keys::PROFILE_DOC_ID);
    store
        .create_document(&doc_id, props(&[(keys::FIELD_SHIP_REF, json!(""))]))
        .unwrap();

    let (dispatcher, mut queue) = dispatch::main_context();
    tokio::spawn(async move { queue.run().await });

    let (tx, values) = mpsc::unbounded_channel();
    let handler: FieldHandler = Arc::new(move |value| {
        let _ = tx.send(value);
    });
    let token = DocumentWatch::install(
        &store,
        doc_id.clone(),
        keys::FIELD_SHIP_REF,
        dispatcher,
        handler,
    );

    Fixture {
        store,
        doc_id,
        values,
        token,
    }
}

#[tokio::test]
async fn leading_change_reaches_the_handler() {
    let mut fx = watch_profile();

    fx.store
        .update_document(&fx.doc_id, |p| {
            p.insert(keys::FIELD_SHIP_REF.to_string(), json!("red_five"));
            true
        })
        .unwrap();

    assert_eq!(expect_event(&mut fx.values).await, json!("red_five"));
}

#[tokio::test]
async fn non_leading_revision_never_reaches_the_handler() {
    let mut fx = watch_profile();

    // A conflicting generation-1 branch; the digest "0" sorts below any
    // hex digest, so the existing revision keeps leading.
    fx.store
        .apply_replicated(
            &fx.doc_id,
            Revision::from_parts(1, "0"),
            None,
            props(&[(keys::FIELD_SHIP_REF, json!("stale"))]),
        )
        .unwrap();

    expect_quiet(&mut fx.values).await;
}

#[tokio::test]
async fn change_without_the_watched_field_dispatches_nothing() {
    let mut fx = watch_profile();

    fx.store
        .update_document(&fx.doc_id, |p| {
            p.remove(keys::FIELD_SHIP_REF);
            p.insert(keys::FIELD_HIGH_SCORE.to_string(), json!(10));
            true
        })
        .unwrap();

    expect_quiet(&mut fx.values).await;
}

#[tokio::test]
async fn changes_to_other_documents_are_ignored() {
    let mut fx = watch_profile();

    fx.store
        .create_document(
            &DocumentId::new("red_five"),
            props(&[(keys::FIELD_SHIP_REF, json!("unrelated"))]),
        )
        .unwrap();

    expect_quiet(&mut fx.values).await;
}

#[tokio::test]
async fn cancelled_watch_dispatches_nothing_further() {
    let mut fx = watch_profile();
    fx.token.cancel();

    fx.store
        .update_document(&fx.doc_id, |p| {
            p.insert(keys::FIELD_SHIP_REF.to_string(), json!("red_five"));
            true
        })
        .unwrap();

    expect_quiet(&mut fx.values).await;
}

#[tokio::test]
async fn dropping_the_token_also_cancels() {
    let mut fx = watch_profile();
    drop(fx.token);

    fx.store
        .update_document(&fx.doc_id, |p| {
            p.insert(keys::FIELD_SHIP_REF.to_string(), json!("red_five"));
            true
        })
        .unwrap();

    expect_quiet(&mut fx.values).await;
}
