#![allow(dead_code)]

//! Shared fixtures for the sync integration tests.

use starfall_bundle::{AssetKind, BundleBuilder, ShipAsset};
use starfall_sync::remote::mock::MemoryRemote;
use starfall_sync::{RemoteAttachment, RemoteRevision, ScoreDisplay, ShipBinding};
use starfall_types::{keys, DocumentId, Properties, Revision};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const BIND_TIMEOUT: Duration = Duration::from_secs(5);
pub const QUIET_TIMEOUT: Duration = Duration::from_millis(300);

pub fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// A bundle holding one ship model named "hull".
pub fn ship_bundle() -> Vec<u8> {
    BundleBuilder::new("test_ship")
        .asset("hull", AssetKind::ShipModel, b"meshdata".to_vec())
        .build()
        .unwrap()
}

/// Seeds a generation-1 profile revision on the remote; returns it so
/// later updates can chain off it.
pub fn seed_profile(remote: &MemoryRemote, ship_ref: &str) -> Revision {
    let properties = props(&[
        (keys::FIELD_SHIP_REF, serde_json::json!(ship_ref)),
        (keys::FIELD_HIGH_SCORE, serde_json::json!(100)),
    ]);
    let rev = Revision::first(&properties);
    remote.seed(RemoteRevision {
        doc_id: DocumentId::new(keys::PROFILE_DOC_ID),
        rev: rev.clone(),
        parent: None,
        properties,
        attachments: Vec::new(),
    });
    rev
}

/// Seeds a profile revision chained onto `parent` with a new ship ref.
pub fn seed_profile_update(remote: &MemoryRemote, parent: &Revision, ship_ref: &str) -> Revision {
    let properties = props(&[
        (keys::FIELD_SHIP_REF, serde_json::json!(ship_ref)),
        (keys::FIELD_HIGH_SCORE, serde_json::json!(100)),
    ]);
    let rev = Revision::child_of(parent, &properties);
    remote.seed(RemoteRevision {
        doc_id: DocumentId::new(keys::PROFILE_DOC_ID),
        rev: rev.clone(),
        parent: Some(parent.clone()),
        properties,
        attachments: Vec::new(),
    });
    rev
}

/// Seeds a ship-model record with an attached bundle.
pub fn seed_ship_model(remote: &MemoryRemote, doc_id: &str, rate_of_fire: Option<f64>) {
    let mut properties = props(&[(keys::FIELD_TYPE, serde_json::json!(keys::SHIP_MODEL_TYPE))]);
    if let Some(rate) = rate_of_fire {
        properties.insert(keys::FIELD_RATE_OF_FIRE.to_string(), serde_json::json!(rate));
    }
    let rev = Revision::first(&properties);
    remote.seed(RemoteRevision {
        doc_id: DocumentId::new(doc_id),
        rev,
        parent: None,
        properties,
        attachments: vec![RemoteAttachment {
            name: "bundle".to_string(),
            content: ship_bundle(),
        }],
    });
}

// ── Recording doubles ───────────────────────────────────────────

/// What a bind looked like, flattened for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct BindEvent {
    /// The bound asset's name, or `None` for the default ship.
    pub ship: Option<String>,
    /// The `rate_of_fire` metadata override, when present.
    pub rate_of_fire: Option<f64>,
}

pub struct RecordingBinding {
    tx: mpsc::UnboundedSender<BindEvent>,
}

impl ShipBinding for RecordingBinding {
    fn bind(&self, ship: Option<ShipAsset>, metadata: &Properties) {
        let _ = self.tx.send(BindEvent {
            ship: ship.map(|s| s.name),
            rate_of_fire: metadata
                .get(keys::FIELD_RATE_OF_FIRE)
                .and_then(|v| v.as_f64()),
        });
    }
}

pub fn recording_binding() -> (Arc<RecordingBinding>, mpsc::UnboundedReceiver<BindEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingBinding { tx }), rx)
}

/// Score display notifications, tagged by which callback fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Changed(u64),
    Persisted(u64),
}

pub struct RecordingDisplay {
    tx: mpsc::UnboundedSender<DisplayEvent>,
}

impl ScoreDisplay for RecordingDisplay {
    fn high_score_changed(&self, value: u64) {
        let _ = self.tx.send(DisplayEvent::Changed(value));
    }

    fn high_score_persisted(&self, value: u64) {
        let _ = self.tx.send(DisplayEvent::Persisted(value));
    }
}

pub fn recording_display() -> (Arc<RecordingDisplay>, mpsc::UnboundedReceiver<DisplayEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingDisplay { tx }), rx)
}

/// Awaits the next event with a generous timeout.
pub async fn expect_event<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(BIND_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Asserts that nothing arrives within a short quiet window.
pub async fn expect_quiet<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    if let Ok(Some(event)) = tokio::time::timeout(QUIET_TIMEOUT, rx.recv()).await {
        panic!("expected no event, got {event:?}");
    }
}
