//! Error types for the document store.

use starfall_types::DocumentId;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Create was asked to make a document that already exists.
    #[error("document already exists: {0}")]
    DocumentExists(DocumentId),

    /// A document body failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored revision string failed to parse.
    #[error("invalid stored revision: {0}")]
    Revision(#[from] starfall_types::Error),
}
