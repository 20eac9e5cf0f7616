//! Ship reference resolution.
//!
//! Turns the profile's ship reference into a loaded [`ShipAsset`] through
//! a validating lookup against the local (already-synced) store. Every
//! failure mode is a specific [`ResolveFault`]; the caller falls back to
//! the default ship on any of them.

use starfall_bundle::{AssetBundle, AssetKind, ShipAsset};
use starfall_store::DocumentStore;
use starfall_types::{keys, DocumentId, Properties};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ResolveFault;

/// Outcome of a successful resolution.
#[derive(Debug)]
pub enum Resolution {
    /// The reference was empty; render the default ship.
    UseDefault,
    /// A ship asset, plus the record's metadata (tuning overrides such as
    /// `rate_of_fire`) passed through untouched.
    Ship {
        asset: ShipAsset,
        metadata: Properties,
    },
}

/// Resolves ship references against the local document store.
pub struct ShipResolver {
    store: Arc<DocumentStore>,
    expected_type: String,
}

impl ShipResolver {
    /// Creates a resolver expecting the standard ship-model type tag.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self::with_expected_type(store, keys::SHIP_MODEL_TYPE)
    }

    /// Creates a resolver with a custom expected type tag.
    pub fn with_expected_type(store: Arc<DocumentStore>, expected_type: impl Into<String>) -> Self {
        Self {
            store,
            expected_type: expected_type.into(),
        }
    }

    /// Resolves a ship reference.
    ///
    /// Validation order, short-circuiting on the first failure: document
    /// exists → type tag matches → a payload is attached → the payload
    /// decodes as a bundle holding a ship model. An empty reference is not
    /// a fault: it means "use the default ship".
    pub fn resolve(&self, identifier: &str) -> Result<Resolution, ResolveFault> {
        if identifier.is_empty() {
            debug!("empty ship reference, using default ship");
            return Ok(Resolution::UseDefault);
        }

        let id = DocumentId::new(identifier);
        let doc = self
            .store
            .get_document(&id)
            .map_err(|source| ResolveFault::Store {
                id: id.clone(),
                source,
            })?;
        let Some(doc) = doc else {
            warn!(ship_ref = identifier, "ship document does not exist");
            return Err(ResolveFault::NotFound(id));
        };

        let type_tag = doc.properties.get(keys::FIELD_TYPE).and_then(|v| v.as_str());
        if type_tag != Some(self.expected_type.as_str()) {
            warn!(ship_ref = identifier, ?type_tag, "ship document has incorrect type");
            return Err(ResolveFault::WrongType(id));
        }

        let names = self
            .store
            .attachment_names(&id)
            .map_err(|source| ResolveFault::Store {
                id: id.clone(),
                source,
            })?;
        let Some(payload_name) = names.first() else {
            warn!(ship_ref = identifier, "ship document carries no payload");
            return Err(ResolveFault::Corrupt(id));
        };
        let bytes = self
            .store
            .attachment(&id, payload_name)
            .map_err(|source| ResolveFault::Store {
                id: id.clone(),
                source,
            })?;
        let Some(bytes) = bytes else {
            warn!(ship_ref = identifier, "ship payload vanished during resolve");
            return Err(ResolveFault::Corrupt(id));
        };

        let bundle = match AssetBundle::from_bytes(&bytes) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(ship_ref = identifier, error = %e, "ship payload failed to decode");
                return Err(ResolveFault::Corrupt(id));
            }
        };
        let Some(asset) = bundle.into_first_of(AssetKind::ShipModel) else {
            warn!(ship_ref = identifier, "bundle holds no ship model asset");
            return Err(ResolveFault::InvalidContents(id));
        };

        debug!(ship_ref = identifier, asset = %asset.name, "resolved ship asset");
        Ok(Resolution::Ship {
            asset,
            metadata: doc.properties,
        })
    }
}
