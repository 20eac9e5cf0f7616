//! Replication sessions.
//!
//! A [`Replicator`] wraps one unidirectional transfer (pull or push)
//! between the local store and a remote endpoint. Sessions expose a
//! status signal over a `watch` channel; callers detect "caught up" by
//! awaiting [`Replicator::settled`], a cooperative suspension rather than
//! a spin.
//!
//! Status transitions: `Idle → Active` on start, `Active → Idle` once the
//! session catches up (continuous sessions flip back to `Active` only
//! while draining new work), and `→ Stopped` on explicit stop or on a
//! session-level failure. `Stopped` is terminal.

use starfall_store::DocumentStore;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteRevision, RemoteStore};

/// Transfer direction of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Remote → local store.
    Pull,
    /// Local store → remote.
    Push,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Pull => write!(f, "pull"),
            Direction::Push => write!(f, "push"),
        }
    }
}

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationStatus {
    /// Not started, or caught up.
    Idle,
    /// Transferring.
    Active,
    /// Stopped by the caller or dead after a failure. Terminal.
    Stopped,
}

/// Configuration for a replication session.
#[derive(Debug, Clone)]
pub struct ReplicatorConfig {
    /// Keep the session alive after catching up, polling for more work.
    pub continuous: bool,
    /// How long a continuous session waits between polls.
    pub poll_interval: Duration,
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// One unidirectional replication session.
pub struct Replicator {
    direction: Direction,
    store: Arc<DocumentStore>,
    remote: Arc<dyn RemoteStore>,
    config: ReplicatorConfig,
    status_tx: watch::Sender<ReplicationStatus>,
    status_rx: watch::Receiver<ReplicationStatus>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    started: AtomicBool,
    last_error: Arc<Mutex<Option<SyncError>>>,
}

impl Replicator {
    /// Creates a pull session (remote → store).
    pub fn pull(
        store: Arc<DocumentStore>,
        remote: Arc<dyn RemoteStore>,
        config: ReplicatorConfig,
    ) -> Self {
        Self::new(Direction::Pull, store, remote, config)
    }

    /// Creates a push session (store → remote).
    pub fn push(
        store: Arc<DocumentStore>,
        remote: Arc<dyn RemoteStore>,
        config: ReplicatorConfig,
    ) -> Self {
        Self::new(Direction::Push, store, remote, config)
    }

    fn new(
        direction: Direction,
        store: Arc<DocumentStore>,
        remote: Arc<dyn RemoteStore>,
        config: ReplicatorConfig,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(ReplicationStatus::Idle);
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            direction,
            store,
            remote,
            config,
            status_tx,
            status_rx,
            stop_tx,
            stop_rx,
            started: AtomicBool::new(false),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the transfer task. Starting an already-started (or stopped)
    /// session is a no-op.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!(direction = %self.direction, "session already started");
            return;
        }
        if self.status() == ReplicationStatus::Stopped {
            return;
        }
        set_status(&self.status_tx, ReplicationStatus::Active);
        debug!(
            direction = %self.direction,
            endpoint = %self.remote.endpoint_name(),
            "replication session starting"
        );

        let worker = Worker {
            direction: self.direction,
            store: self.store.clone(),
            remote: self.remote.clone(),
            config: self.config.clone(),
            status_tx: self.status_tx.clone(),
            stop_rx: self.stop_rx.clone(),
            last_error: self.last_error.clone(),
        };
        tokio::spawn(worker.run());
    }

    /// Stops the session. Idempotent; safe to call before `start`.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
        force_stopped(&self.status_tx);
    }

    /// Current session status.
    pub fn status(&self) -> ReplicationStatus {
        *self.status_rx.borrow()
    }

    /// A receiver for status transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<ReplicationStatus> {
        self.status_rx.clone()
    }

    /// Suspends until the session is no longer `Active`. A session that
    /// was stopped (or died) settles exactly like one that caught up;
    /// check [`Replicator::last_error`] to tell the difference.
    pub async fn settled(&self) {
        let mut rx = self.status_rx.clone();
        let _ = rx
            .wait_for(|status| *status != ReplicationStatus::Active)
            .await;
    }

    /// The failure that killed the session, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().as_ref().map(|e| e.to_string())
    }

    /// Transfer direction of this session.
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Moves status, except out of `Stopped`.
fn set_status(tx: &watch::Sender<ReplicationStatus>, status: ReplicationStatus) {
    tx.send_if_modified(|current| {
        if *current == ReplicationStatus::Stopped || *current == status {
            return false;
        }
        *current = status;
        true
    });
}

fn force_stopped(tx: &watch::Sender<ReplicationStatus>) {
    tx.send_if_modified(|current| {
        if *current == ReplicationStatus::Stopped {
            return false;
        }
        *current = ReplicationStatus::Stopped;
        true
    });
}

// ── Transfer task ────────────────────────────────────────────────

struct Worker {
    direction: Direction,
    store: Arc<DocumentStore>,
    remote: Arc<dyn RemoteStore>,
    config: ReplicatorConfig,
    status_tx: watch::Sender<ReplicationStatus>,
    stop_rx: watch::Receiver<bool>,
    last_error: Arc<Mutex<Option<SyncError>>>,
}

impl Worker {
    async fn run(mut self) {
        let mut cursor = 0u64;
        loop {
            if *self.stop_rx.borrow() {
                return;
            }

            let step = match self.direction {
                Direction::Pull => self.pull_step(&mut cursor).await,
                Direction::Push => self.push_step(&mut cursor).await,
            };

            match step {
                Ok(true) => {
                    // Transferred a batch; go straight back for more.
                }
                Ok(false) => {
                    set_status(&self.status_tx, ReplicationStatus::Idle);
                    if !self.config.continuous {
                        return;
                    }
                    tokio::select! {
                        _ = self.stop_rx.changed() => {
                            if *self.stop_rx.borrow() {
                                return;
                            }
                        }
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    warn!(
                        direction = %self.direction,
                        error = %e,
                        "replication session failed"
                    );
                    *self.last_error.lock().unwrap() = Some(e);
                    force_stopped(&self.status_tx);
                    return;
                }
            }
        }
    }

    /// Fetches and applies one page of remote changes. Returns whether
    /// anything was transferred.
    async fn pull_step(&self, cursor: &mut u64) -> SyncResult<bool> {
        let batch = self.remote.changes_since(*cursor).await?;
        if batch.revisions.is_empty() {
            *cursor = batch.last_seq.max(*cursor);
            return Ok(false);
        }
        set_status(&self.status_tx, ReplicationStatus::Active);

        let store = self.store.clone();
        let revisions = batch.revisions;
        let applied = tokio::task::spawn_blocking(move || -> SyncResult<usize> {
            let mut applied = 0;
            for revision in revisions {
                let RemoteRevision {
                    doc_id,
                    rev,
                    parent,
                    properties,
                    attachments,
                } = revision;
                for attachment in &attachments {
                    store.put_attachment(&doc_id, &attachment.name, &attachment.content)?;
                }
                if store.apply_replicated(&doc_id, rev, parent, properties)?.is_some() {
                    applied += 1;
                }
            }
            Ok(applied)
        })
        .await
        .map_err(|e| SyncError::Task(format!("pull apply task failed: {e}")))??;

        debug!(applied, cursor = batch.last_seq, "applied pulled revisions");
        *cursor = batch.last_seq;
        Ok(true)
    }

    /// Uploads one page of pending local changes. Returns whether
    /// anything was transferred.
    async fn push_step(&self, cursor: &mut u64) -> SyncResult<bool> {
        let store = self.store.clone();
        let since = *cursor;
        let pending = tokio::task::spawn_blocking(move || store.changes_since(since))
            .await
            .map_err(|e| SyncError::Task(format!("push read task failed: {e}")))??;
        if pending.is_empty() {
            return Ok(false);
        }
        set_status(&self.status_tx, ReplicationStatus::Active);

        let next_cursor = pending.last().map(|r| r.seq).unwrap_or(since);
        let revisions: Vec<RemoteRevision> = pending
            .into_iter()
            .map(|r| RemoteRevision {
                doc_id: r.doc_id,
                rev: r.revision,
                parent: r.parent,
                properties: r.properties,
                attachments: Vec::new(),
            })
            .collect();

        let count = revisions.len();
        self.remote.push(revisions).await?;
        debug!(count, cursor = next_cursor, "pushed local revisions");
        *cursor = next_cursor;
        Ok(true)
    }
}
