//! The profile sync engine.
//!
//! Lifecycle: open a continuous pull session, wait for it to settle, read
//! the profile document (creating it and publishing it when absent),
//! resolve-and-bind the current ship reference, then watch the document
//! and re-resolve on every remote change. Shutdown unsubscribes, stops
//! the pull session, and guarantees no bind applies afterwards.
//!
//! The store and remote handles are injected by the composition root; the
//! engine reaches into no ambient state.

use serde_json::Value;
use starfall_bundle::ShipAsset;
use starfall_store::DocumentStore;
use starfall_types::{keys, DocumentId, Properties};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::dispatch::MainDispatcher;
use crate::error::{ResolveFault, SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::replication::{Replicator, ReplicatorConfig};
use crate::resolver::{Resolution, ShipResolver};
use crate::watch::{DocumentWatch, FieldHandler, WatchToken};

/// Consumer of resolved ships. Implemented by the rendering/gameplay
/// layer; called on the primary execution context only.
pub trait ShipBinding: Send + Sync {
    /// Applies a ship asset, or the default ship when `None`. `metadata`
    /// carries the record's properties (tuning overrides such as
    /// `rate_of_fire`) and is empty for the default ship.
    fn bind(&self, ship: Option<ShipAsset>, metadata: &Properties);
}

/// Configuration for the profile sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The profile document to maintain.
    pub profile_doc_id: DocumentId,
    /// The profile field naming the ship to render.
    pub ship_field: String,
    /// Poll interval of the continuous pull session.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile_doc_id: DocumentId::new(keys::PROFILE_DOC_ID),
            ship_field: keys::FIELD_SHIP_REF.to_string(),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Maintains the profile document and keeps the bound ship in step with it.
pub struct ProfileSyncEngine {
    store: Arc<DocumentStore>,
    remote: Arc<dyn RemoteStore>,
    config: EngineConfig,
    shared: Arc<BindShared>,
    pull: Option<Replicator>,
    push: Option<Replicator>,
    watch: Option<WatchToken>,
}

impl ProfileSyncEngine {
    /// Creates an engine over the given store, remote endpoint, and
    /// binding consumer.
    pub fn new(
        store: Arc<DocumentStore>,
        remote: Arc<dyn RemoteStore>,
        binding: Arc<dyn ShipBinding>,
        dispatcher: MainDispatcher,
        config: EngineConfig,
    ) -> Self {
        let resolver = ShipResolver::new(store.clone());
        Self {
            store,
            remote,
            config,
            shared: Arc::new(BindShared {
                resolver,
                binding,
                dispatcher,
                runtime: OnceLock::new(),
                alive: AtomicBool::new(true),
                triggered: AtomicU64::new(0),
                applied: AtomicU64::new(0),
            }),
            pull: None,
            push: None,
            watch: None,
        }
    }

    /// Starts the engine: pull, settle, bootstrap or hydrate, watch.
    /// Starting twice, or after shutdown, is a no-op; the profile carries
    /// at most one watch subscription.
    pub async fn start(&mut self) -> SyncResult<()> {
        if self.watch.is_some() || !self.shared.alive.load(Ordering::SeqCst) {
            warn!("profile sync engine already started or shut down");
            return Ok(());
        }
        info!(
            profile = %self.config.profile_doc_id,
            endpoint = %self.remote.endpoint_name(),
            "profile sync engine starting"
        );
        let _ = self.shared.runtime.set(Handle::current());

        let pull = Replicator::pull(
            self.store.clone(),
            self.remote.clone(),
            ReplicatorConfig {
                continuous: true,
                poll_interval: self.config.poll_interval,
            },
        );
        pull.start();
        pull.settled().await;
        if let Some(error) = pull.last_error() {
            // A dead session settles like a caught-up one; local data may
            // simply be stale.
            warn!(error = %error, "pull session settled with an error");
        }
        self.pull = Some(pull);

        let store = self.store.clone();
        let profile_id = self.config.profile_doc_id.clone();
        let doc = tokio::task::spawn_blocking(move || store.get_document(&profile_id))
            .await
            .map_err(|e| SyncError::Task(format!("profile read task failed: {e}")))??;

        match doc {
            None => {
                debug!("no profile document after settle, bootstrapping");
                let store = self.store.clone();
                let profile_id = self.config.profile_doc_id.clone();
                let ship_field = self.config.ship_field.clone();
                tokio::task::spawn_blocking(move || {
                    let mut properties = Properties::new();
                    properties.insert(ship_field, Value::String(String::new()));
                    store.create_document(&profile_id, properties)
                })
                .await
                .map_err(|e| SyncError::Task(format!("profile create task failed: {e}")))??;

                // Publish the fresh profile. Fire-and-forget: the engine
                // holds the session but does not wait on it.
                let push = Replicator::push(
                    self.store.clone(),
                    self.remote.clone(),
                    ReplicatorConfig::default(),
                );
                push.start();
                self.push = Some(push);
            }
            Some(doc) => {
                let ship_ref = doc
                    .properties
                    .get(&self.config.ship_field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                debug!(ship_ref = %ship_ref, "profile document present, hydrating");
                self.shared.trigger(ship_ref);
            }
        }

        let shared = self.shared.clone();
        let field = self.config.ship_field.clone();
        let handler: FieldHandler = Arc::new(move |value: Value| match value.as_str() {
            Some(ship_ref) => shared.trigger(ship_ref.to_string()),
            None => error!(field = %field, "watched field is not a string"),
        });
        self.watch = Some(DocumentWatch::install(
            &self.store,
            self.config.profile_doc_id.clone(),
            self.config.ship_field.clone(),
            self.shared.dispatcher.clone(),
            handler,
        ));
        Ok(())
    }

    /// Shuts the engine down: unwatch, stop the pull session, release the
    /// push session. Any in-flight resolve-and-bind no-ops afterwards.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if !self.shared.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("profile sync engine shutting down");
        if let Some(watch) = self.watch.take() {
            watch.cancel();
        }
        if let Some(pull) = self.pull.take() {
            pull.stop();
        }
        // A one-shot bootstrap push finishes or dies on its own.
        self.push.take();
    }
}

impl Drop for ProfileSyncEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State shared with in-flight resolve-and-bind work.
struct BindShared {
    resolver: ShipResolver,
    binding: Arc<dyn ShipBinding>,
    dispatcher: MainDispatcher,
    runtime: OnceLock<Handle>,
    /// Cleared at shutdown; checked on the primary context before a
    /// resolved ship is applied.
    alive: AtomicBool,
    /// Stamp handed to each triggered resolution.
    triggered: AtomicU64,
    /// Stamp of the last applied resolution; later stamps win.
    applied: AtomicU64,
}

impl BindShared {
    /// Kicks off one sequence-stamped resolve-and-bind.
    fn trigger(self: &Arc<Self>, ship_ref: String) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        let Some(runtime) = self.runtime.get().cloned() else {
            return;
        };
        let stamp = self.triggered.fetch_add(1, Ordering::SeqCst) + 1;

        let shared = self.clone();
        runtime.clone().spawn(async move {
            let resolver_shared = shared.clone();
            let outcome = runtime
                .spawn_blocking(move || resolver_shared.resolver.resolve(&ship_ref))
                .await;
            let resolution = match outcome {
                Ok(resolution) => resolution,
                Err(e) => {
                    warn!("ship resolution task failed: {e}");
                    return;
                }
            };
            let apply_shared = shared.clone();
            shared
                .dispatcher
                .post(move || apply_shared.apply(stamp, resolution));
        });
    }

    /// Applies a completed resolution on the primary context. Discards it
    /// when the engine has shut down or a later resolution already won.
    fn apply(&self, stamp: u64, resolution: Result<Resolution, ResolveFault>) {
        if !self.alive.load(Ordering::SeqCst) {
            debug!("engine shut down, dropping resolved ship");
            return;
        }
        if stamp <= self.applied.load(Ordering::SeqCst) {
            debug!(stamp, "discarding superseded ship resolution");
            return;
        }
        self.applied.store(stamp, Ordering::SeqCst);

        match resolution {
            Ok(Resolution::Ship { asset, metadata }) => self.binding.bind(Some(asset), &metadata),
            Ok(Resolution::UseDefault) => self.binding.bind(None, &Properties::new()),
            // The resolver already logged the fault; degrade to default.
            Err(_) => self.binding.bind(None, &Properties::new()),
        }
    }
}
