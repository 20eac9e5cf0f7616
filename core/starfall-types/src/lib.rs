//! Core type definitions for Starfall profile sync.
//!
//! This crate defines the fundamental types shared by the document store
//! and the sync engine:
//! - Document identifiers (well-known string keys)
//! - Revisions (generation + content digest, totally ordered)
//! - The schemaless user-properties mapping of a document
//!
//! Everything game-specific (ship binding, score display) lives in the
//! sync crate; everything persistence-specific lives in the store crate.

mod ids;
mod revision;

pub mod keys;

pub use ids::DocumentId;
pub use revision::Revision;

/// The schemaless user-properties mapping of a document.
///
/// Keys are field names; values are arbitrary JSON. `serde_json`'s default
/// map is BTree-backed, so serialization is deterministic; revision
/// digests rely on this.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid revision string: {0}")]
    InvalidRevision(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
