//! Document revisions.
//!
//! A revision is `generation` (how many writes deep the document is) plus
//! a hex SHA-256 digest of the revision content, rendered as
//! `"{generation}-{digest}"`. Revisions are totally ordered (generation
//! first, digest as the tie-break), and the store picks the greatest leaf
//! revision as the leading one when a document has conflicting branches.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;

use crate::{Error, Properties};

/// How many hex characters of the SHA-256 digest a revision keeps.
const DIGEST_LEN: usize = 32;

/// A document revision identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Revision {
    generation: u64,
    digest: String,
}

impl Revision {
    /// Computes the first revision (generation 1) of a document body.
    #[must_use]
    pub fn first(body: &Properties) -> Self {
        Self::derive(1, None, body)
    }

    /// Computes the revision that follows `parent` with the given body.
    #[must_use]
    pub fn child_of(parent: &Revision, body: &Properties) -> Self {
        Self::derive(parent.generation + 1, Some(&parent.digest), body)
    }

    /// Builds a revision from already-known parts (e.g. received from the
    /// remote endpoint). No digest verification is performed; the remote
    /// is the authority for its own revision ids.
    #[must_use]
    pub fn from_parts(generation: u64, digest: impl Into<String>) -> Self {
        Self {
            generation,
            digest: digest.into(),
        }
    }

    fn derive(generation: u64, parent_digest: Option<&str>, body: &Properties) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(generation.to_le_bytes());
        if let Some(parent) = parent_digest {
            hasher.update(parent.as_bytes());
        }
        // Properties serialize with sorted keys, so this is deterministic.
        let body_json = serde_json::to_string(body).unwrap_or_default();
        hasher.update(body_json.as_bytes());

        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(DIGEST_LEN);
        Self { generation, digest }
    }

    /// The generation number (1 for a freshly created document).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The content digest (hex).
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Parses a revision from its `"{generation}-{digest}"` rendering.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let (generation, digest) = s
            .split_once('-')
            .ok_or_else(|| Error::InvalidRevision(s.to_string()))?;
        let generation: u64 = generation
            .parse()
            .map_err(|_| Error::InvalidRevision(s.to_string()))?;
        if generation == 0 || digest.is_empty() {
            return Err(Error::InvalidRevision(s.to_string()));
        }
        Ok(Self {
            generation,
            digest: digest.to_string(),
        })
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.digest)
    }
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.generation
            .cmp(&other.generation)
            .then_with(|| self.digest.cmp(&other.digest))
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<Revision> for String {
    fn from(rev: Revision) -> Self {
        rev.to_string()
    }
}

impl TryFrom<String> for Revision {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}
