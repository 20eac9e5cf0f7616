use pretty_assertions::assert_eq;
use starfall_bundle::{AssetBundle, AssetKind, BundleBuilder, BundleError};

fn ship_bundle() -> Vec<u8> {
    BundleBuilder::new("red_five")
        .asset("thumbnail", AssetKind::Texture, b"png".to_vec())
        .asset("hull", AssetKind::ShipModel, b"meshdata".to_vec())
        .asset("hull_lod1", AssetKind::ShipModel, b"lod1".to_vec())
        .build()
        .unwrap()
}

#[test]
fn build_open_roundtrip() {
    let bytes = ship_bundle();
    let bundle = AssetBundle::from_bytes(&bytes).unwrap();

    assert_eq!(bundle.manifest().name, "red_five");
    assert_eq!(bundle.assets().len(), 3);
    assert_eq!(bundle.assets()[0].name, "thumbnail");
}

#[test]
fn first_of_respects_manifest_order() {
    let bundle = AssetBundle::from_bytes(&ship_bundle()).unwrap();
    let ship = bundle.first_of(AssetKind::ShipModel).unwrap();
    assert_eq!(ship.name, "hull");
    assert_eq!(ship.data, b"meshdata");
}

#[test]
fn into_first_of_hands_over_ownership() {
    let bundle = AssetBundle::from_bytes(&ship_bundle()).unwrap();
    let ship = bundle.into_first_of(AssetKind::ShipModel).unwrap();
    assert_eq!(ship.kind, AssetKind::ShipModel);
    assert_eq!(ship.data, b"meshdata");
}

#[test]
fn bundle_without_ship_model_yields_none() {
    let bytes = BundleBuilder::new("decals")
        .asset("sticker", AssetKind::Texture, b"png".to_vec())
        .build()
        .unwrap();
    let bundle = AssetBundle::from_bytes(&bytes).unwrap();
    assert!(bundle.first_of(AssetKind::ShipModel).is_none());
}

#[test]
fn garbage_bytes_are_an_archive_error() {
    let err = AssetBundle::from_bytes(b"not a zip").unwrap_err();
    assert!(matches!(err, BundleError::Archive(_)));
}

#[test]
fn empty_archive_is_missing_manifest() {
    // A zip with no entries at all.
    let cursor = std::io::Cursor::new(Vec::new());
    let zip = zip_empty(cursor);
    let err = AssetBundle::from_bytes(&zip).unwrap_err();
    assert!(matches!(err, BundleError::ManifestMissing));
}

fn zip_empty(cursor: std::io::Cursor<Vec<u8>>) -> Vec<u8> {
    let zip = zip::ZipWriter::new(cursor);
    zip.finish().unwrap().into_inner()
}
