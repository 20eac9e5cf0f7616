//! Bundle manifest (manifest.toml) within an asset bundle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level manifest embedded in every asset bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Bundle name, usually matching the document that carries it.
    pub name: String,
    /// Declared assets, in pipeline order.
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

/// One declared asset inside a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Asset name (e.g. "hull").
    pub name: String,
    /// What category of asset this is.
    pub kind: AssetKind,
    /// Archive path of the payload entry.
    pub path: String,
}

/// Categories of bundled assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// A renderable ship model.
    ShipModel,
    /// A texture map.
    Texture,
    /// An audio clip.
    Audio,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetKind::ShipModel => "ship_model",
            AssetKind::Texture => "texture",
            AssetKind::Audio => "audio",
        };
        write!(f, "{s}")
    }
}
