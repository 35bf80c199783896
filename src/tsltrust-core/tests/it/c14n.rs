//! Canonical output compared with reference output produced by `xmllint`
//! (`--c14n` and `--exc-c14n`) for the W3C Canonical XML examples that do
//! not depend on a DTD.

use tsltrust_core::c14n::{C14nMethod, Canonicalizer};
use tsltrust_core::xml::parse_document;

const C14N_10: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

fn canonical(input: &str, method_uri: &str) -> String {
    let method = C14nMethod::from_uri(method_uri).unwrap();
    let doc = parse_document(input).unwrap();
    Canonicalizer::new(method).canonicalize(doc.root())
}

#[test]
fn test_whitespace_in_content_matches_reference() {
    let out = canonical(include_str!("fixtures/c14n/whitespace.xml"), C14N_10);
    assert_eq!(out, include_str!("fixtures/c14n/whitespace.c14n"));
}

#[test]
fn test_start_and_end_tags_match_reference() {
    let out = canonical(include_str!("fixtures/c14n/tags.xml"), C14N_10);
    assert_eq!(out, include_str!("fixtures/c14n/tags.c14n"));
}

#[test]
fn test_exclusive_start_and_end_tags_match_reference() {
    let out = canonical(include_str!("fixtures/c14n/tags.xml"), EXC_C14N);
    assert_eq!(out, include_str!("fixtures/c14n/tags.exc-c14n"));
}

#[test]
fn test_character_modifications_match_reference() {
    let out = canonical(include_str!("fixtures/c14n/chars.xml"), C14N_10);
    assert_eq!(out, include_str!("fixtures/c14n/chars.c14n"));
}
