use pretty_assertions::assert_eq;
use starfall_types::{Properties, Revision};

fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn first_revision_is_generation_one() {
    let body = props(&[("ship_ref", serde_json::json!(""))]);
    let rev = Revision::first(&body);
    assert_eq!(rev.generation(), 1);
    assert!(!rev.digest().is_empty());
}

#[test]
fn digest_is_deterministic() {
    let body = props(&[("high_score", serde_json::json!(150))]);
    assert_eq!(Revision::first(&body), Revision::first(&body));
}

#[test]
fn digest_depends_on_body() {
    let a = Revision::first(&props(&[("high_score", serde_json::json!(100))]));
    let b = Revision::first(&props(&[("high_score", serde_json::json!(200))]));
    assert_ne!(a.digest(), b.digest());
}

#[test]
fn child_increments_generation_and_chains_digest() {
    let body = props(&[("ship_ref", serde_json::json!(""))]);
    let first = Revision::first(&body);
    let child = Revision::child_of(&first, &body);
    assert_eq!(child.generation(), 2);
    // Same body, different parent position, so the digest must differ.
    assert_ne!(child.digest(), first.digest());
}

#[test]
fn display_parse_roundtrip() {
    let body = props(&[("ship_ref", serde_json::json!("red_five"))]);
    let rev = Revision::child_of(&Revision::first(&body), &body);
    let parsed = Revision::parse(&rev.to_string()).unwrap();
    assert_eq!(parsed, rev);
}

#[test]
fn parse_rejects_malformed() {
    assert!(Revision::parse("").is_err());
    assert!(Revision::parse("3").is_err());
    assert!(Revision::parse("-abc").is_err());
    assert!(Revision::parse("0-abc").is_err());
    assert!(Revision::parse("x-abc").is_err());
    assert!(Revision::parse("2-").is_err());
}

#[test]
fn ordering_prefers_generation_then_digest() {
    let low = Revision::from_parts(1, "ffff");
    let high = Revision::from_parts(2, "0000");
    assert!(high > low);

    let a = Revision::from_parts(2, "aaaa");
    let b = Revision::from_parts(2, "bbbb");
    assert!(b > a);
}

#[test]
fn serde_roundtrips_as_string() {
    let rev = Revision::from_parts(4, "deadbeef");
    let json = serde_json::to_string(&rev).unwrap();
    assert_eq!(json, "\"4-deadbeef\"");
    let back: Revision = serde_json::from_str(&json).unwrap();
    assert_eq!(back, rev);
}
