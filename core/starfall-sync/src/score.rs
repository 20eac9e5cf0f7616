//! High-score merging.
//!
//! The display updates the instant a new high score is seen; persistence
//! runs off the primary context: an optimistic update of the profile's
//! `high_score` field (the store retries it against the latest revision)
//! followed by a one-shot push session. Once the push settles, a
//! "persisted" notification is posted back to the primary context.

use serde_json::json;
use starfall_store::DocumentStore;
use starfall_types::{keys, DocumentId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::dispatch::MainDispatcher;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::replication::{Replicator, ReplicatorConfig};

/// Consumer of score notifications. Implemented by the UI layer.
pub trait ScoreDisplay: Send + Sync {
    /// A new high score was accepted. Called immediately on whatever
    /// context bumped the score.
    fn high_score_changed(&self, value: u64);

    /// The high score finished its persist-and-push round trip. Called on
    /// the primary execution context.
    fn high_score_persisted(&self, value: u64);
}

/// Tracks the in-memory high score and merges it into the profile
/// document.
pub struct ScoreKeeper {
    store: Arc<DocumentStore>,
    remote: Arc<dyn RemoteStore>,
    dispatcher: MainDispatcher,
    display: Arc<dyn ScoreDisplay>,
    profile_doc_id: DocumentId,
    high_score: AtomicU64,
    runtime: OnceLock<Handle>,
}

impl ScoreKeeper {
    /// Creates a score keeper over the standard profile document.
    pub fn new(
        store: Arc<DocumentStore>,
        remote: Arc<dyn RemoteStore>,
        dispatcher: MainDispatcher,
        display: Arc<dyn ScoreDisplay>,
    ) -> Self {
        Self {
            store,
            remote,
            dispatcher,
            display,
            profile_doc_id: DocumentId::new(keys::PROFILE_DOC_ID),
            high_score: AtomicU64::new(0),
            runtime: OnceLock::new(),
        }
    }

    /// Loads the persisted high score into memory. Call once after the
    /// engine's pull session has settled.
    pub async fn hydrate(&self) -> SyncResult<u64> {
        let _ = self.runtime.set(Handle::current());

        let store = self.store.clone();
        let id = self.profile_doc_id.clone();
        let doc = tokio::task::spawn_blocking(move || store.get_document(&id))
            .await
            .map_err(|e| SyncError::Task(format!("score read task failed: {e}")))??;

        let persisted = doc
            .and_then(|d| {
                d.properties
                    .get(keys::FIELD_HIGH_SCORE)
                    .and_then(|v| v.as_u64())
            })
            .unwrap_or(0);
        self.high_score.fetch_max(persisted, Ordering::SeqCst);
        Ok(self.high_score.load(Ordering::SeqCst))
    }

    /// The current in-memory high score.
    pub fn high_score(&self) -> u64 {
        self.high_score.load(Ordering::SeqCst)
    }

    /// Offers a candidate high score. Anything not strictly greater than
    /// the current value is a no-op; a winner updates the display
    /// immediately and persists in the background.
    pub fn bump_high_score(self: &Arc<Self>, candidate: u64) {
        let previous = self.high_score.fetch_max(candidate, Ordering::SeqCst);
        if candidate <= previous {
            debug!(candidate, previous, "candidate does not beat the high score");
            return;
        }
        info!(candidate, "new high score");
        self.display.high_score_changed(candidate);

        let handle = self
            .runtime
            .get()
            .cloned()
            .or_else(|| Handle::try_current().ok());
        let Some(handle) = handle else {
            warn!("no async runtime available; high score publishes on the next sync");
            return;
        };
        let keeper = self.clone();
        handle.spawn(async move {
            if let Err(e) = keeper.persist(candidate).await {
                warn!(error = %e, "failed to persist high score");
            }
        });
    }

    async fn persist(&self, candidate: u64) -> SyncResult<()> {
        let store = self.store.clone();
        let id = self.profile_doc_id.clone();
        tokio::task::spawn_blocking(move || {
            store.update_document(&id, |properties| {
                let current = properties
                    .get(keys::FIELD_HIGH_SCORE)
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                if candidate <= current {
                    // Another device already recorded a better score.
                    return false;
                }
                properties.insert(keys::FIELD_HIGH_SCORE.to_string(), json!(candidate));
                true
            })
        })
        .await
        .map_err(|e| SyncError::Task(format!("score update task failed: {e}")))??;

        let push = Replicator::push(
            self.store.clone(),
            self.remote.clone(),
            ReplicatorConfig::default(),
        );
        push.start();
        push.settled().await;
        if let Some(error) = push.last_error() {
            // No rollback; the local value stays authoritative and the
            // next session start republishes it.
            warn!(error = %error, "high score push failed");
        }

        let display = self.display.clone();
        self.dispatcher
            .post(move || display.high_score_persisted(candidate));
        Ok(())
    }
}
