//! The revision-tracking document store.

use rusqlite::{params, Connection, OptionalExtension};
use starfall_types::{DocumentId, Properties, Revision};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

use crate::change::{ChangeSource, DocumentChange};
use crate::error::{StoreError, StoreResult};

/// Capacity of the change broadcast channel. A subscriber that falls this
/// far behind sees a lag error and must resynchronize from the store.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A document read at its leading revision.
#[derive(Debug, Clone)]
pub struct Document {
    /// The document's key.
    pub id: DocumentId,
    /// The leading revision the properties were read at.
    pub revision: Revision,
    /// The full property map of that revision.
    pub properties: Properties,
}

/// A committed local revision, as handed to push replication.
#[derive(Debug, Clone)]
pub struct StoredRevision {
    /// The document the revision belongs to.
    pub doc_id: DocumentId,
    /// The revision id.
    pub revision: Revision,
    /// The revision this one was derived from, if any.
    pub parent: Option<Revision>,
    /// The property map of the revision.
    pub properties: Properties,
    /// Position in the store-wide change sequence.
    pub seq: u64,
}

/// SQLite-backed document store with revision trees and a change stream.
pub struct DocumentStore {
    conn: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<DocumentChange>,
}

impl DocumentStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Storage(format!("failed to open document store: {e}")))?;
        Self::with_conn(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StoreError::Storage(format!("failed to open in-memory document store: {e}"))
        })?;
        Self::with_conn(conn)
    }

    fn with_conn(conn: Connection) -> StoreResult<Self> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS revisions (
                doc_id TEXT NOT NULL,
                rev TEXT NOT NULL,
                generation INTEGER NOT NULL,
                digest TEXT NOT NULL,
                parent TEXT,
                body TEXT NOT NULL,
                leaf INTEGER NOT NULL DEFAULT 1,
                seq INTEGER NOT NULL,
                origin TEXT NOT NULL,
                UNIQUE(doc_id, rev)
            );

            CREATE INDEX IF NOT EXISTS idx_revisions_leaves
                ON revisions(doc_id, leaf);
            CREATE INDEX IF NOT EXISTS idx_revisions_seq
                ON revisions(seq);

            CREATE TABLE IF NOT EXISTS attachments (
                doc_id TEXT NOT NULL,
                name TEXT NOT NULL,
                content BLOB NOT NULL,
                PRIMARY KEY (doc_id, name)
            );
            ",
        )
        .map_err(|e| StoreError::Storage(format!("failed to init store schema: {e}")))?;
        Ok(())
    }

    /// Subscribes to the change stream. Changes committed after this call
    /// are delivered in sequence order.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.changes.subscribe()
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Reads a document at its leading revision.
    pub fn get_document(&self, id: &DocumentId) -> StoreResult<Option<Document>> {
        let conn = self.conn.lock().unwrap();
        Self::leading(&conn, id)
    }

    fn leading(conn: &Connection, id: &DocumentId) -> StoreResult<Option<Document>> {
        let row = conn
            .query_row(
                "SELECT rev, body FROM revisions
                 WHERE doc_id = ?1 AND leaf = 1
                 ORDER BY generation DESC, digest DESC
                 LIMIT 1",
                params![id.as_str()],
                |row| {
                    let rev: String = row.get(0)?;
                    let body: String = row.get(1)?;
                    Ok((rev, body))
                },
            )
            .optional()
            .map_err(|e| StoreError::Storage(format!("failed to read document {id}: {e}")))?;

        match row {
            Some((rev, body)) => Ok(Some(Document {
                id: id.clone(),
                revision: Revision::parse(&rev)?,
                properties: serde_json::from_str(&body)?,
            })),
            None => Ok(None),
        }
    }

    // ── Local writes ─────────────────────────────────────────────

    /// Creates a document with the given properties.
    ///
    /// Fails with [`StoreError::DocumentExists`] if any revision of the
    /// document is already present.
    pub fn create_document(
        &self,
        id: &DocumentId,
        properties: Properties,
    ) -> StoreResult<Revision> {
        let revision = Revision::first(&properties);
        let body = serde_json::to_string(&properties)?;

        let seq = {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn
                .transaction()
                .map_err(|e| StoreError::Storage(format!("failed to begin create: {e}")))?;

            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM revisions WHERE doc_id = ?1 LIMIT 1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::Storage(format!("failed to check document {id}: {e}")))?;
            if exists.is_some() {
                return Err(StoreError::DocumentExists(id.clone()));
            }

            let seq = Self::next_seq(&tx)?;
            Self::insert_revision(&tx, id, &revision, None, &body, seq, "local")?;
            tx.commit()
                .map_err(|e| StoreError::Storage(format!("failed to commit create: {e}")))?;
            seq
        };

        self.emit(DocumentChange {
            doc_id: id.clone(),
            revision: revision.clone(),
            leading: true,
            properties,
            seq,
            source: ChangeSource::Local,
        });
        Ok(revision)
    }

    /// Optimistic read-modify-write against the latest revision.
    ///
    /// `mutate` receives the leading revision's properties and returns
    /// `true` to commit, `false` to cancel. If another writer moves the
    /// leading revision between read and commit, the closure is re-run
    /// against the fresh state and the commit is retried until it lands.
    ///
    /// Returns the committed revision, or `None` if the closure cancelled.
    pub fn update_document<F>(&self, id: &DocumentId, mut mutate: F) -> StoreResult<Option<Revision>>
    where
        F: FnMut(&mut Properties) -> bool,
    {
        loop {
            let current = self
                .get_document(id)?
                .ok_or_else(|| StoreError::Storage(format!("cannot update missing document {id}")))?;

            let mut properties = current.properties.clone();
            if !mutate(&mut properties) {
                return Ok(None);
            }

            let revision = Revision::child_of(&current.revision, &properties);
            let body = serde_json::to_string(&properties)?;

            let committed = {
                let mut conn = self.conn.lock().unwrap();
                let tx = conn
                    .transaction()
                    .map_err(|e| StoreError::Storage(format!("failed to begin update: {e}")))?;

                // Commit only if the revision we read is still leading.
                let still_leading = Self::leading(&tx, id)?
                    .map(|d| d.revision == current.revision)
                    .unwrap_or(false);
                if still_leading {
                    tx.execute(
                        "UPDATE revisions SET leaf = 0
                         WHERE doc_id = ?1 AND rev = ?2 AND leaf = 1",
                        params![id.as_str(), current.revision.to_string()],
                    )
                    .map_err(|e| StoreError::Storage(format!("failed to retire leaf: {e}")))?;

                    let seq = Self::next_seq(&tx)?;
                    Self::insert_revision(
                        &tx,
                        id,
                        &revision,
                        Some(&current.revision),
                        &body,
                        seq,
                        "local",
                    )?;
                    tx.commit()
                        .map_err(|e| StoreError::Storage(format!("failed to commit update: {e}")))?;
                    Some(seq)
                } else {
                    None
                }
            };

            match committed {
                Some(seq) => {
                    // The parent was the greatest leaf, so its child leads.
                    self.emit(DocumentChange {
                        doc_id: id.clone(),
                        revision: revision.clone(),
                        leading: true,
                        properties,
                        seq,
                        source: ChangeSource::Local,
                    });
                    return Ok(Some(revision));
                }
                None => {
                    debug!(doc_id = %id, "leading revision moved during update, retrying");
                }
            }
        }
    }

    // ── Replicated writes ────────────────────────────────────────

    /// Applies a revision received from the remote endpoint.
    ///
    /// Idempotent: a revision the store already knows is ignored and
    /// `None` is returned. A revision whose parent is not a local leaf
    /// opens a conflict branch; whether the new revision leads the
    /// document is reported on the returned change.
    pub fn apply_replicated(
        &self,
        id: &DocumentId,
        revision: Revision,
        parent: Option<Revision>,
        properties: Properties,
    ) -> StoreResult<Option<DocumentChange>> {
        let body = serde_json::to_string(&properties)?;

        let change = {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn
                .transaction()
                .map_err(|e| StoreError::Storage(format!("failed to begin apply: {e}")))?;

            let known: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM revisions WHERE doc_id = ?1 AND rev = ?2",
                    params![id.as_str(), revision.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::Storage(format!("failed to check revision: {e}")))?;
            if known.is_some() {
                return Ok(None);
            }

            if let Some(parent) = &parent {
                // Zero rows affected means the parent is not a leaf here:
                // the incoming revision opens (or extends) a branch.
                tx.execute(
                    "UPDATE revisions SET leaf = 0
                     WHERE doc_id = ?1 AND rev = ?2 AND leaf = 1",
                    params![id.as_str(), parent.to_string()],
                )
                .map_err(|e| StoreError::Storage(format!("failed to retire leaf: {e}")))?;
            }

            let seq = Self::next_seq(&tx)?;
            Self::insert_revision(&tx, id, &revision, parent.as_ref(), &body, seq, "replicated")?;

            let leading = Self::leading(&tx, id)?
                .map(|d| d.revision == revision)
                .unwrap_or(false);

            tx.commit()
                .map_err(|e| StoreError::Storage(format!("failed to commit apply: {e}")))?;

            DocumentChange {
                doc_id: id.clone(),
                revision,
                leading,
                properties,
                seq,
                source: ChangeSource::Replicated,
            }
        };

        self.emit(change.clone());
        Ok(Some(change))
    }

    // ── Change feed ──────────────────────────────────────────────

    /// Returns local-origin revisions committed after `seq`, in sequence
    /// order. Replicated revisions are excluded; push replication must
    /// not echo what the remote already has.
    pub fn changes_since(&self, seq: u64) -> StoreResult<Vec<StoredRevision>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT doc_id, rev, parent, body, seq FROM revisions
                 WHERE origin = 'local' AND seq > ?1
                 ORDER BY seq",
            )
            .map_err(|e| StoreError::Storage(format!("failed to prepare change feed: {e}")))?;

        let rows = stmt
            .query_map(params![seq as i64], |row| {
                let doc_id: String = row.get(0)?;
                let rev: String = row.get(1)?;
                let parent: Option<String> = row.get(2)?;
                let body: String = row.get(3)?;
                let seq: i64 = row.get(4)?;
                Ok((doc_id, rev, parent, body, seq))
            })
            .map_err(|e| StoreError::Storage(format!("failed to query change feed: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            let (doc_id, rev, parent, body, seq) =
                row.map_err(|e| StoreError::Storage(format!("failed to read change row: {e}")))?;
            result.push(StoredRevision {
                doc_id: DocumentId::new(doc_id),
                revision: Revision::parse(&rev)?,
                parent: parent.as_deref().map(Revision::parse).transpose()?,
                properties: serde_json::from_str(&body)?,
                seq: seq as u64,
            });
        }
        Ok(result)
    }

    /// The highest sequence number committed so far (0 for an empty store).
    pub fn last_seq(&self) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM revisions",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|v| v as u64)
        .map_err(|e| StoreError::Storage(format!("failed to read last seq: {e}")))
    }

    // ── Attachments ──────────────────────────────────────────────

    /// Stores (or replaces) a named binary attachment on a document.
    pub fn put_attachment(&self, id: &DocumentId, name: &str, content: &[u8]) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO attachments (doc_id, name, content) VALUES (?1, ?2, ?3)",
            params![id.as_str(), name, content],
        )
        .map_err(|e| StoreError::Storage(format!("failed to store attachment {name}: {e}")))?;
        Ok(())
    }

    /// Reads a named attachment.
    pub fn attachment(&self, id: &DocumentId, name: &str) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT content FROM attachments WHERE doc_id = ?1 AND name = ?2",
            params![id.as_str(), name],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::Storage(format!("failed to read attachment {name}: {e}")))
    }

    /// Lists a document's attachment names in name order.
    pub fn attachment_names(&self, id: &DocumentId) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM attachments WHERE doc_id = ?1 ORDER BY name")
            .map_err(|e| StoreError::Storage(format!("failed to prepare attachment list: {e}")))?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::Storage(format!("failed to list attachments: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(
                row.map_err(|e| StoreError::Storage(format!("failed to read attachment row: {e}")))?,
            );
        }
        Ok(result)
    }

    // ── Internals ────────────────────────────────────────────────

    fn next_seq(conn: &Connection) -> StoreResult<u64> {
        conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM revisions",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|v| v as u64)
        .map_err(|e| StoreError::Storage(format!("failed to allocate sequence: {e}")))
    }

    fn insert_revision(
        conn: &Connection,
        id: &DocumentId,
        revision: &Revision,
        parent: Option<&Revision>,
        body: &str,
        seq: u64,
        origin: &str,
    ) -> StoreResult<()> {
        conn.execute(
            "INSERT INTO revisions (doc_id, rev, generation, digest, parent, body, leaf, seq, origin)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)",
            params![
                id.as_str(),
                revision.to_string(),
                revision.generation() as i64,
                revision.digest(),
                parent.map(|p| p.to_string()),
                body,
                seq as i64,
                origin,
            ],
        )
        .map_err(|e| StoreError::Storage(format!("failed to insert revision: {e}")))?;
        Ok(())
    }

    fn emit(&self, change: DocumentChange) {
        // No subscribers is fine; the stream is best-effort fan-out.
        let _ = self.changes.send(change);
    }
}
