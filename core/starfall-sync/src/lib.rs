//! Document sync and reactive ship-binding engine for Starfall.
//!
//! Keeps one remotely-synchronized profile document alive and reacts to
//! its changes: the ship the player flies follows the profile's ship
//! reference, and the high score merges back out to the remote store.
//!
//! # Architecture
//!
//! - **Replication**: unidirectional pull/push sessions against a remote
//!   endpoint, with a watch-channel status signal and a cooperative
//!   settle-wait
//! - **Watch**: a field-level subscription on the profile document that
//!   sees only leading-revision changes
//! - **Resolver**: validating lookup from ship reference to loaded asset
//! - **Engine**: the orchestrator (pull, settle, bootstrap or hydrate,
//!   watch, resolve-and-bind, shutdown)
//! - **Score**: optimistic high-score merge plus push
//! - **Dispatch**: the explicit single-consumer queue that carries every
//!   binding/display callback onto the host's primary loop
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use starfall_store::DocumentStore;
//! use starfall_sync::{
//!     dispatch, EngineConfig, HttpRemote, HttpRemoteConfig, ProfileSyncEngine, ShipBinding,
//! };
//! use starfall_types::Properties;
//!
//! struct Renderer;
//! impl ShipBinding for Renderer {
//!     fn bind(&self, ship: Option<starfall_bundle::ShipAsset>, _metadata: &Properties) {
//!         let _ = ship; // hand the mesh to the scene
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(DocumentStore::open_in_memory()?);
//! let remote = Arc::new(HttpRemote::new(HttpRemoteConfig::default()));
//! let (dispatcher, mut queue) = dispatch::main_context();
//!
//! let mut engine = ProfileSyncEngine::new(
//!     store,
//!     remote,
//!     Arc::new(Renderer),
//!     dispatcher,
//!     EngineConfig::default(),
//! );
//! engine.start().await?;
//! tokio::spawn(async move { queue.run().await }); // the primary loop
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
mod engine;
mod error;
pub mod remote;
mod replication;
mod resolver;
mod score;
mod watch;

pub use dispatch::{MainDispatcher, MainQueue};
pub use engine::{EngineConfig, ProfileSyncEngine, ShipBinding};
pub use error::{ResolveFault, SyncError, SyncResult};
pub use remote::{
    HttpRemote, HttpRemoteConfig, RemoteAttachment, RemoteBatch, RemoteRevision, RemoteStore,
};
pub use replication::{Direction, ReplicationStatus, Replicator, ReplicatorConfig};
pub use resolver::{Resolution, ShipResolver};
pub use score::{ScoreDisplay, ScoreKeeper};
pub use watch::{DocumentWatch, FieldHandler, WatchToken};
