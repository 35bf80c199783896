//! Parsing whole lists.

use tsltrust_core::{Language, TrustStatusList, VerificationStatus};
use tsltrust_crypto::sha1_fingerprint;

use crate::common::{ListBuilder, EU_GENERIC};

#[test]
fn test_parse_with_providers_and_pointers() {
    let xml = ListBuilder::new("SE")
        .sequence(Some(42))
        .pointer("https://lotl.example.test/eu-lotl.xml", "EU")
        .provider("Alpha Trust")
        .provider("Beta Sign")
        .build();
    let list = TrustStatusList::parse(xml.as_bytes()).unwrap();

    assert_eq!(list.scheme_territory(), "SE");
    assert_eq!(list.tsl_type(), EU_GENERIC);
    assert_eq!(list.sequence_number(), Some(42));

    let names: Vec<_> = list
        .providers()
        .iter()
        .map(|p| p.name(&Language::english()))
        .collect();
    assert_eq!(names, ["Alpha Trust", "Beta Sign"]);
    assert_eq!(list.providers()[0].services.len(), 1);
    assert!(list.providers()[0].services[0].status.ends_with("granted"));

    let pointer = &list.pointers()[0];
    assert_eq!(pointer.location, "https://lotl.example.test/eu-lotl.xml");
    assert_eq!(pointer.territory.as_deref(), Some("EU"));
    assert_eq!(pointer.tsl_type.as_deref(), Some(EU_GENERIC));
    assert!(pointer.is_xml());
}

#[test]
fn test_locale_falls_back_to_english_then_empty() {
    let xml = ListBuilder::new("SE").operator("Swedish Post and Telecom Authority").build();
    let list = TrustStatusList::parse(xml.as_bytes()).unwrap();

    let german = Language::parse("de").unwrap();
    assert_eq!(
        list.scheme_operator_name(&german),
        "Swedish Post and Telecom Authority"
    );
    // The builder writes no legal notice at all.
    assert_eq!(list.legal_notice(&german), "");
}

#[test]
fn test_unsigned_list() {
    let xml = ListBuilder::new("SE").build();
    let list = TrustStatusList::parse(xml.as_bytes()).unwrap();
    assert!(!list.has_signature());
    assert_eq!(list.verify_signature().status, VerificationStatus::NotSigned);
}

#[test]
fn test_fingerprint_round_trip() {
    let xml = ListBuilder::new("FI").build();
    let list = TrustStatusList::parse(xml.as_bytes()).unwrap();
    assert_eq!(sha1_fingerprint(list.raw_bytes()), sha1_fingerprint(xml.as_bytes()));
    assert_eq!(list.fingerprint(), sha1_fingerprint(xml.as_bytes()));
    assert_eq!(list.fingerprint().len(), 40);
}

#[test]
fn test_closed_scheme_has_no_next_update() {
    let xml = ListBuilder::new("SE").next_update(None).build();
    let list = TrustStatusList::parse(xml.as_bytes()).unwrap();
    assert!(list.next_update().is_none());
    assert!(!list.absent_fields().iter().any(|f| f == "NextUpdate"));
}

#[test]
fn test_summary_serializes() {
    let xml = ListBuilder::new("SE").provider("Alpha Trust").build();
    let list = TrustStatusList::parse(xml.as_bytes()).unwrap();
    let json = serde_json::to_value(list.summary(&Language::english())).unwrap();
    assert_eq!(json["territory"], "SE");
    assert_eq!(json["provider_count"], 1);
    assert_eq!(json["service_count"], 1);
    assert_eq!(json["signed"], false);
}

#[test]
fn test_non_list_rejected() {
    let err = TrustStatusList::parse(b"<html><body/></html>").unwrap_err();
    assert!(err.to_string().contains("TrustServiceStatusList"));
    assert!(!err.is_misuse());
}
