//! Asset bundle container for Starfall ship models.
//!
//! A bundle is a zip archive holding a `manifest.toml` that declares the
//! bundled assets (name, kind, payload path) plus the payload entries
//! themselves. Opening a bundle parses the manifest and extracts every
//! declared asset into memory; the archive itself is not kept around.

mod bundle;
mod manifest;

pub use bundle::{AssetBundle, BundleBuilder, ShipAsset};
pub use manifest::{AssetEntry, AssetKind, BundleManifest};

use thiserror::Error;

/// Errors that can occur opening or building a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The bytes are not a readable zip archive.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O failure while reading an archive entry.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive has no `manifest.toml` entry.
    #[error("bundle has no manifest")]
    ManifestMissing,

    /// The manifest entry is not valid TOML.
    #[error("invalid manifest: {0}")]
    ManifestInvalid(String),

    /// The manifest declares an asset whose payload entry is absent.
    #[error("asset payload missing from archive: {0}")]
    MissingAsset(String),
}
