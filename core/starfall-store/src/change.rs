//! Change notifications emitted by the store.

use starfall_types::{DocumentId, Properties, Revision};

/// Where a committed revision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// Written by this process through `create_document`/`update_document`.
    Local,
    /// Applied by a pull replication session.
    Replicated,
}

/// A committed revision, broadcast to subscribers after every write.
///
/// `leading` reports whether the revision was the document's leading
/// revision at commit time. Conflict branches and superseded replays
/// arrive with `leading = false`; consumers that only care about the
/// authoritative state of a document discard those.
#[derive(Debug, Clone)]
pub struct DocumentChange {
    /// The document that changed.
    pub doc_id: DocumentId,
    /// The committed revision.
    pub revision: Revision,
    /// Whether `revision` led the document when it committed.
    pub leading: bool,
    /// The full property map of the committed revision.
    pub properties: Properties,
    /// Position in the store-wide change sequence.
    pub seq: u64,
    /// Local write or replicated write.
    pub source: ChangeSource,
}
