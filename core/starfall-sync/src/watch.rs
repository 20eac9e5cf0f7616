//! Document watch: a field-level subscription on one document.
//!
//! The watch consumes the store's change stream, keeps only events for
//! the watched document whose revision was leading at commit time, and
//! forwards the watched field's value to a handler. The handler runs on
//! the primary execution context via the main dispatch queue, never on
//! the store's notification path.

use starfall_store::DocumentStore;
use starfall_types::DocumentId;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, warn};

use crate::dispatch::MainDispatcher;
use crate::error::SyncError;

/// Handler invoked with the watched field's new value.
pub type FieldHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Cancellation token for an installed watch. Cancelling (or dropping)
/// the token tears the subscription down; no handler dispatch is posted
/// afterwards.
pub struct WatchToken {
    cancel: Option<oneshot::Sender<()>>,
}

impl WatchToken {
    /// Cancels the watch.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl Drop for WatchToken {
    fn drop(&mut self) {
        self.release();
    }
}

/// Installs field-level watches on documents.
pub struct DocumentWatch;

impl DocumentWatch {
    /// Subscribes to `field` of `doc_id`.
    ///
    /// Only leading-revision changes reach the handler; conflict branches
    /// and superseded replays are discarded. A leading change without the
    /// watched field is an error (logged) and dispatches nothing.
    pub fn install(
        store: &DocumentStore,
        doc_id: DocumentId,
        field: impl Into<String>,
        dispatcher: MainDispatcher,
        handler: FieldHandler,
    ) -> WatchToken {
        let field = field.into();
        let mut changes = store.subscribe();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Cancellation wins over queued changes.
                    biased;
                    _ = &mut cancel_rx => {
                        debug!(doc_id = %doc_id, "document watch cancelled");
                        return;
                    }
                    change = changes.recv() => match change {
                        Ok(change) => {
                            if change.doc_id != doc_id {
                                continue;
                            }
                            if !change.leading {
                                debug!(
                                    doc_id = %doc_id,
                                    revision = %change.revision,
                                    "ignoring non-leading revision"
                                );
                                continue;
                            }
                            match change.properties.get(&field) {
                                Some(value) => {
                                    let value = value.clone();
                                    let handler = handler.clone();
                                    dispatcher.post(move || handler(value));
                                }
                                None => {
                                    let fault = SyncError::FieldMissing {
                                        doc_id: doc_id.clone(),
                                        field: field.clone(),
                                    };
                                    error!(error = %fault, "dropping change event");
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(
                                doc_id = %doc_id,
                                missed,
                                "document watch lagged behind the change stream"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        });

        WatchToken {
            cancel: Some(cancel_tx),
        }
    }
}
