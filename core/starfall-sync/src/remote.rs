//! Remote sync endpoint abstraction.
//!
//! Pull and push sessions are unidirectional and independent; both talk to
//! the same endpoint through [`RemoteStore`]. The production implementation
//! is [`HttpRemote`] against a document-store gateway; tests use
//! [`mock::MemoryRemote`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use starfall_types::{DocumentId, Properties, Revision};
use std::time::Duration;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// A named binary payload travelling with a revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAttachment {
    /// Attachment name.
    pub name: String,
    /// Raw bytes; base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

/// One document revision as exchanged with the remote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRevision {
    /// The document the revision belongs to.
    pub doc_id: DocumentId,
    /// The revision id.
    pub rev: Revision,
    /// The revision it was derived from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Revision>,
    /// The full property map.
    pub properties: Properties,
    /// Binary payloads attached to the document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<RemoteAttachment>,
}

/// A page of the remote change feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteBatch {
    /// Revisions committed after the requested cursor, in remote order.
    pub revisions: Vec<RemoteRevision>,
    /// Cursor to resume from next time.
    pub last_seq: u64,
}

/// Abstract remote document-store endpoint.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Human-readable endpoint name for logs.
    fn endpoint_name(&self) -> String;

    /// Returns revisions committed after `cursor`. An empty batch means
    /// the caller is caught up.
    async fn changes_since(&self, cursor: u64) -> SyncResult<RemoteBatch>;

    /// Uploads locally committed revisions. Idempotent on the remote side:
    /// revisions it already knows are ignored.
    async fn push(&self, revisions: Vec<RemoteRevision>) -> SyncResult<()>;
}

// ── HTTP endpoint ────────────────────────────────────────────────

/// Configuration for the HTTP remote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRemoteConfig {
    /// Gateway base URL.
    pub base_url: String,
    /// Database name under the gateway.
    pub database: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum revisions per change-feed page.
    pub batch_limit: usize,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4984".to_string(),
            database: "starfall".to_string(),
            timeout_secs: 30,
            batch_limit: 100,
        }
    }
}

/// Remote endpoint over a document-store HTTP gateway.
pub struct HttpRemote {
    config: HttpRemoteConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ChangesResponse {
    results: Vec<RemoteRevision>,
    last_seq: u64,
}

#[derive(Debug, Serialize)]
struct BulkDocsRequest {
    docs: Vec<RemoteRevision>,
}

impl HttpRemote {
    /// Creates a new HTTP remote endpoint.
    pub fn new(config: HttpRemoteConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create HTTP client");
        Self { config, client }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.database,
            path
        )
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    fn endpoint_name(&self) -> String {
        format!("{}/{}", self.config.base_url, self.config.database)
    }

    async fn changes_since(&self, cursor: u64) -> SyncResult<RemoteBatch> {
        let url = self.url("_changes");
        let response = self
            .client
            .get(&url)
            .query(&[("since", cursor), ("limit", self.config.batch_limit as u64)])
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::Remote(format!(
                "change feed returned {}",
                response.status()
            )));
        }

        let changes: ChangesResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Remote(format!("invalid change feed payload: {e}")))?;

        debug!(
            since = cursor,
            count = changes.results.len(),
            "fetched remote changes"
        );
        Ok(RemoteBatch {
            revisions: changes.results,
            last_seq: changes.last_seq,
        })
    }

    async fn push(&self, revisions: Vec<RemoteRevision>) -> SyncResult<()> {
        let url = self.url("_bulk_docs");
        let count = revisions.len();
        let response = self
            .client
            .post(&url)
            .json(&BulkDocsRequest { docs: revisions })
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::Remote(format!(
                "bulk docs returned {}",
                response.status()
            )));
        }

        debug!(count, "pushed local revisions");
        Ok(())
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}

// ── Test endpoint ────────────────────────────────────────────────

/// An in-memory remote endpoint for testing.
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Inner {
        revisions: Vec<RemoteRevision>,
        pushed: Vec<RemoteRevision>,
        fail_with: Option<String>,
    }

    /// A mock remote holding its revision feed in memory.
    #[derive(Clone, Default)]
    pub struct MemoryRemote {
        inner: Arc<Mutex<Inner>>,
    }

    impl MemoryRemote {
        /// Creates an empty mock remote.
        pub fn new() -> Self {
            Self::default()
        }

        /// Appends a revision to the remote change feed.
        pub fn seed(&self, revision: RemoteRevision) {
            self.inner.lock().unwrap().revisions.push(revision);
        }

        /// Everything pushed so far.
        pub fn pushed(&self) -> Vec<RemoteRevision> {
            self.inner.lock().unwrap().pushed.clone()
        }

        /// Makes every subsequent call fail with a network error.
        pub fn fail_with(&self, message: impl Into<String>) {
            self.inner.lock().unwrap().fail_with = Some(message.into());
        }

        /// Clears a previously injected failure.
        pub fn heal(&self) {
            self.inner.lock().unwrap().fail_with = None;
        }
    }

    #[async_trait]
    impl RemoteStore for MemoryRemote {
        fn endpoint_name(&self) -> String {
            "memory".to_string()
        }

        async fn changes_since(&self, cursor: u64) -> SyncResult<RemoteBatch> {
            let inner = self.inner.lock().unwrap();
            if let Some(message) = &inner.fail_with {
                return Err(SyncError::Network(message.clone()));
            }
            let last_seq = inner.revisions.len() as u64;
            let revisions = inner
                .revisions
                .iter()
                .skip(cursor as usize)
                .cloned()
                .collect();
            Ok(RemoteBatch { revisions, last_seq })
        }

        async fn push(&self, revisions: Vec<RemoteRevision>) -> SyncResult<()> {
            let mut inner = self.inner.lock().unwrap();
            if let Some(message) = &inner.fail_with {
                return Err(SyncError::Network(message.clone()));
            }
            inner.pushed.extend(revisions.iter().cloned());
            inner.revisions.extend(revisions);
            Ok(())
        }
    }
}
