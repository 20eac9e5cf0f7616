//! Bundle packing and unpacking.

use std::io::{Cursor, Read, Write};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::manifest::{AssetEntry, AssetKind, BundleManifest};
use crate::BundleError;

const MANIFEST_ENTRY: &str = "manifest.toml";

/// An asset extracted from a bundle: the in-memory resource handle the
/// binding layer receives. Owns its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipAsset {
    /// Asset name from the manifest.
    pub name: String,
    /// Asset category.
    pub kind: AssetKind,
    /// The raw payload.
    pub data: Vec<u8>,
}

/// A fully decoded bundle: manifest plus every declared asset.
#[derive(Debug, Clone)]
pub struct AssetBundle {
    manifest: BundleManifest,
    assets: Vec<ShipAsset>,
}

impl AssetBundle {
    /// Opens a bundle from its raw bytes.
    ///
    /// Every asset declared in the manifest is extracted eagerly; the zip
    /// archive and its buffers are released before this returns.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BundleError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let manifest_raw = match archive.by_name(MANIFEST_ENTRY) {
            Ok(mut entry) => {
                let mut raw = String::new();
                entry.read_to_string(&mut raw)?;
                raw
            }
            Err(ZipError::FileNotFound) => return Err(BundleError::ManifestMissing),
            Err(e) => return Err(e.into()),
        };
        let manifest: BundleManifest =
            toml::from_str(&manifest_raw).map_err(|e| BundleError::ManifestInvalid(e.to_string()))?;

        let mut assets = Vec::with_capacity(manifest.assets.len());
        for entry in &manifest.assets {
            let mut data = Vec::new();
            match archive.by_name(&entry.path) {
                Ok(mut payload) => {
                    payload.read_to_end(&mut data)?;
                }
                Err(ZipError::FileNotFound) => {
                    return Err(BundleError::MissingAsset(entry.path.clone()));
                }
                Err(e) => return Err(e.into()),
            }
            assets.push(ShipAsset {
                name: entry.name.clone(),
                kind: entry.kind,
                data,
            });
        }

        Ok(Self { manifest, assets })
    }

    /// The parsed manifest.
    #[must_use]
    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    /// All extracted assets, in manifest order.
    #[must_use]
    pub fn assets(&self) -> &[ShipAsset] {
        &self.assets
    }

    /// The first asset of the given kind, in manifest order.
    #[must_use]
    pub fn first_of(&self, kind: AssetKind) -> Option<&ShipAsset> {
        self.assets.iter().find(|a| a.kind == kind)
    }

    /// Consumes the bundle and returns the first asset of the given kind.
    #[must_use]
    pub fn into_first_of(self, kind: AssetKind) -> Option<ShipAsset> {
        self.assets.into_iter().find(|a| a.kind == kind)
    }
}

/// Builds a bundle archive in memory. Used by the content pipeline and
/// by tests that need realistic payloads.
#[derive(Debug, Default)]
pub struct BundleBuilder {
    name: String,
    assets: Vec<(AssetEntry, Vec<u8>)>,
}

impl BundleBuilder {
    /// Starts a bundle with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assets: Vec::new(),
        }
    }

    /// Adds an asset; the payload path is derived from the name.
    #[must_use]
    pub fn asset(mut self, name: impl Into<String>, kind: AssetKind, data: Vec<u8>) -> Self {
        let name = name.into();
        let entry = AssetEntry {
            path: format!("assets/{name}"),
            name,
            kind,
        };
        self.assets.push((entry, data));
        self
    }

    /// Serializes the bundle to zip bytes.
    pub fn build(self) -> Result<Vec<u8>, BundleError> {
        let manifest = BundleManifest {
            name: self.name,
            assets: self.assets.iter().map(|(e, _)| e.clone()).collect(),
        };
        let manifest_raw = toml::to_string(&manifest)
            .map_err(|e| BundleError::ManifestInvalid(e.to_string()))?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        zip.start_file(MANIFEST_ENTRY, options)?;
        zip.write_all(manifest_raw.as_bytes())?;
        for (entry, data) in &self.assets {
            zip.start_file(&*entry.path, options)?;
            zip.write_all(data)?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}
