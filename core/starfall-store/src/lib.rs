//! SQLite-backed document store for Starfall profile sync.
//!
//! Documents are schemaless JSON property maps with revision tracking:
//! every write produces a new revision, replicated writes whose parent is
//! not the local leaf open a conflict branch, and the leading revision of
//! a document is the greatest leaf by `(generation, digest)`, a
//! deterministic winner that every replica agrees on without coordination.
//!
//! # Architecture
//!
//! - Revisions are rows; a document is the set of rows sharing a `doc_id`
//! - A store-wide change sequence orders every commit and feeds push
//!   replication (`changes_since`)
//! - Committed changes are fanned out over a broadcast channel so watch
//!   layers can react without polling
//! - `update_document` is the optimistic read-modify-write primitive:
//!   the mutation closure runs against the latest revision and the commit
//!   is retried whenever another writer got there first

mod change;
mod document_store;
mod error;

pub use change::{ChangeSource, DocumentChange};
pub use document_store::{Document, DocumentStore, StoredRevision};
pub use error::{StoreError, StoreResult};
