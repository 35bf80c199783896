//! Property-based tests for parsing.

use proptest::prelude::*;
use tsltrust_core::{Language, TrustStatusList};
use tsltrust_crypto::sha1_fingerprint;

use crate::common::ListBuilder;

/// Strategy for territory codes.
fn territory() -> impl Strategy<Value = String> {
    "[A-Z]{2}"
}

/// Strategy for names that need no XML escaping.
fn name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 .-]{0,30}[A-Za-z0-9]"
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    /// The fingerprint is always the SHA-1 of the parsed bytes.
    #[test]
    fn fingerprint_round_trip(t in territory(), seq in any::<u64>(), op in name()) {
        let xml = ListBuilder::new(&t).sequence(Some(seq)).operator(&op).build();
        let list = TrustStatusList::parse(xml.as_bytes()).unwrap();
        prop_assert_eq!(sha1_fingerprint(list.raw_bytes()), sha1_fingerprint(xml.as_bytes()));
        prop_assert_eq!(list.fingerprint(), sha1_fingerprint(xml.as_bytes()));
    }

    /// Parsing the same bytes twice gives equal lists.
    #[test]
    fn parse_idempotent(t in territory(), seq in any::<u64>(), providers in prop::collection::vec(name(), 0..4)) {
        let mut builder = ListBuilder::new(&t).sequence(Some(seq));
        for p in &providers {
            builder = builder.provider(p);
        }
        let xml = builder.build();
        let first = TrustStatusList::parse(xml.as_bytes()).unwrap();
        let second = TrustStatusList::parse(first.raw_bytes()).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.sequence_number(), Some(seq));
        prop_assert_eq!(first.providers().len(), providers.len());
    }

    /// Scalar fields survive parsing unchanged.
    #[test]
    fn scheme_fields_preserved(t in territory(), op in name()) {
        let xml = ListBuilder::new(&t).operator(&op).build();
        let list = TrustStatusList::parse(xml.as_bytes()).unwrap();
        prop_assert_eq!(list.scheme_territory(), t.as_str());
        prop_assert_eq!(list.scheme_operator_name(&Language::english()), op);
    }

    /// Arbitrary bytes never panic the parser.
    #[test]
    fn parse_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = TrustStatusList::parse(&bytes);
    }
}
