//! Error types for the sync layer.

use starfall_store::StoreError;
use starfall_types::DocumentId;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network-level failure talking to the remote endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// The remote endpoint answered, but not usefully.
    #[error("remote endpoint error: {0}")]
    Remote(String),

    /// Local store failure.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Wire payload (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A background task died before producing a result.
    #[error("background task failed: {0}")]
    Task(String),

    /// A change event arrived without the watched field.
    #[error("document {doc_id} has no value for field {field}")]
    FieldMissing {
        doc_id: DocumentId,
        field: String,
    },
}

/// Why a ship reference failed to resolve into an asset.
///
/// Every fault degrades to "no ship" at the binding layer; the caller
/// falls back to the default ship and the game keeps running.
#[derive(Debug, Error)]
pub enum ResolveFault {
    /// No document with the referenced id exists locally.
    #[error("document {0} does not exist")]
    NotFound(DocumentId),

    /// The document exists but is not a ship-model record.
    #[error("document {0} has incorrect type")]
    WrongType(DocumentId),

    /// The document carries no payload, or the payload is unreadable.
    #[error("document {0} is corrupt")]
    Corrupt(DocumentId),

    /// The payload decodes but holds no asset of the expected category.
    #[error("no ship model asset in document {0}")]
    InvalidContents(DocumentId),

    /// The store failed underneath the lookup.
    #[error("storage error resolving {id}: {source}")]
    Store {
        id: DocumentId,
        source: StoreError,
    },
}
