//! The trust status list document model.
//!
//! A [`TrustStatusList`] is built once from raw bytes and never changes.
//! Only two things make parsing fail: bytes that are not well-formed XML,
//! and a root element that is not `TrustServiceStatusList`. Every other
//! field is optional and degrades to empty; the names of scheme fields that
//! were missing are kept in [`TrustStatusList::absent_fields`].

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use roxmltree::Node;
use serde::Serialize;
use tracing::debug;
use tsltrust_crypto::sha1_fingerprint;

use crate::error::TrustError;
use crate::locale::{self, Language, LocalizedString};
use crate::pointer::OtherTslPointer;
use crate::provider::{Address, PostalAddress, TrustServiceProvider};
use crate::signature::{self, SignatureVerifier, VerificationResult};
use crate::xml;

const ROOT_ELEMENT: &str = "TrustServiceStatusList";

/// A parsed trust status list.
#[derive(Debug, Clone, Serialize)]
pub struct TrustStatusList {
    id: Option<String>,
    tsl_tag: Option<String>,
    version_identifier: Option<u64>,
    sequence_number: Option<u64>,
    tsl_type: String,
    scheme_operator_names: Vec<LocalizedString>,
    scheme_operator_address: Address,
    scheme_names: Vec<LocalizedString>,
    scheme_information_uris: Vec<String>,
    status_determination_approach: String,
    community_rules: Vec<String>,
    scheme_territory: String,
    legal_notices: Vec<LocalizedString>,
    historical_information_period: Option<u64>,
    pointers: Vec<OtherTslPointer>,
    issue_date_time: Option<DateTime<Utc>>,
    next_update: Option<DateTime<Utc>>,
    distribution_points: Vec<String>,
    providers: Vec<TrustServiceProvider>,
    signed: bool,
    fingerprint: String,
    absent_fields: Vec<String>,
    #[serde(skip)]
    raw: Vec<u8>,
    #[serde(skip)]
    verification: OnceLock<VerificationResult>,
}

/// Tracks which optional scheme fields a document left out.
#[derive(Default)]
struct Absent(Vec<String>);

impl Absent {
    fn check<T>(&mut self, name: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.0.push(name.to_string());
        }
        value
    }

    fn check_vec<T>(&mut self, name: &str, value: Vec<T>) -> Vec<T> {
        if value.is_empty() {
            self.0.push(name.to_string());
        }
        value
    }
}

impl TrustStatusList {
    /// Parse a trust list from its raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Parse`] if the bytes are not well-formed UTF-8
    /// XML or the root element is not `TrustServiceStatusList`.
    pub fn parse(raw: &[u8]) -> Result<Self, TrustError> {
        let text = xml::decode(raw)?;
        let doc = xml::parse_document(text)?;
        let root = doc.root_element();

        if root.tag_name().name() != ROOT_ELEMENT {
            return Err(TrustError::parse(format!(
                "root element is '{}', expected '{ROOT_ELEMENT}'",
                root.tag_name().name()
            )));
        }

        let mut absent = Absent::default();
        let scheme = xml::child(root, "SchemeInformation");
        if scheme.is_none() {
            absent.0.push("SchemeInformation".into());
        }

        let text_field = |absent: &mut Absent, name: &str| {
            absent.check(name, scheme.and_then(|s| xml::child_text(s, name)))
        };
        let number_field = |absent: &mut Absent, name: &str| {
            absent.check(
                name,
                scheme
                    .and_then(|s| xml::child_text(s, name))
                    .and_then(|t| xml::parse_u64(&t)),
            )
        };

        let version_identifier = number_field(&mut absent, "TSLVersionIdentifier");
        let sequence_number = number_field(&mut absent, "TSLSequenceNumber");
        let tsl_type = text_field(&mut absent, "TSLType").unwrap_or_default();
        let status_determination_approach =
            text_field(&mut absent, "StatusDeterminationApproach").unwrap_or_default();
        let scheme_territory = text_field(&mut absent, "SchemeTerritory").unwrap_or_default();
        let historical_information_period =
            number_field(&mut absent, "HistoricalInformationPeriod");
        let issue_date_time = absent.check(
            "ListIssueDateTime",
            scheme
                .and_then(|s| xml::child_text(s, "ListIssueDateTime"))
                .and_then(|t| xml::parse_datetime(&t)),
        );
        // An empty NextUpdate is legal and means the scheme is closed.
        let next_update = scheme
            .and_then(|s| xml::path_text(s, &["NextUpdate", "dateTime"]))
            .and_then(|t| xml::parse_datetime(&t));

        let localized = |s: Option<Node<'_, '_>>, container: &str, item: &str| {
            s.map(|s| xml::localized(s, Some(container), item))
                .unwrap_or_default()
        };
        let uris = |s: Option<Node<'_, '_>>, container: &str| {
            s.map(|s| xml::uri_list(s, container)).unwrap_or_default()
        };

        let scheme_operator_names = absent.check_vec(
            "SchemeOperatorName",
            localized(scheme, "SchemeOperatorName", "Name"),
        );
        let scheme_names = absent.check_vec("SchemeName", localized(scheme, "SchemeName", "Name"));
        let legal_notices = absent.check_vec(
            "PolicyOrLegalNotice",
            localized(scheme, "PolicyOrLegalNotice", "TSLLegalNotice"),
        );
        let scheme_information_uris =
            absent.check_vec("SchemeInformationURI", uris(scheme, "SchemeInformationURI"));
        let community_rules = absent.check_vec(
            "SchemeTypeCommunityRules",
            uris(scheme, "SchemeTypeCommunityRules"),
        );
        let distribution_points = uris(scheme, "DistributionPoints");
        let scheme_operator_address = scheme
            .and_then(|s| xml::child(s, "SchemeOperatorAddress"))
            .map(Address::from_node)
            .unwrap_or_default();

        let pointers = scheme
            .and_then(|s| xml::child(s, "PointersToOtherTSL"))
            .map(|p| {
                xml::children(p, "OtherTSLPointer")
                    .map(OtherTslPointer::from_node)
                    .collect()
            })
            .unwrap_or_default();

        let providers = xml::child(root, "TrustServiceProviderList")
            .map(|l| {
                xml::children(l, "TrustServiceProvider")
                    .map(TrustServiceProvider::from_node)
                    .collect()
            })
            .unwrap_or_default();

        let list = Self {
            id: root
                .attribute("Id")
                .map(str::to_string)
                .filter(|v| !v.is_empty()),
            tsl_tag: root
                .attribute("TSLTag")
                .map(str::to_string)
                .filter(|v| !v.is_empty()),
            version_identifier,
            sequence_number,
            tsl_type,
            scheme_operator_names,
            scheme_operator_address,
            scheme_names,
            scheme_information_uris,
            status_determination_approach,
            community_rules,
            scheme_territory,
            legal_notices,
            historical_information_period,
            pointers,
            issue_date_time,
            next_update,
            distribution_points,
            providers,
            signed: signature::find_signature(&doc).is_some(),
            fingerprint: sha1_fingerprint(raw),
            absent_fields: absent.0,
            raw: raw.to_vec(),
            verification: OnceLock::new(),
        };

        debug!(
            territory = %list.scheme_territory,
            sequence = ?list.sequence_number,
            fingerprint = %list.fingerprint,
            providers = list.providers.len(),
            pointers = list.pointers.len(),
            absent = ?list.absent_fields,
            "Parsed trust list"
        );
        Ok(list)
    }

    /// Lowercase hex SHA-1 of the bytes this list was parsed from.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The exact bytes this list was parsed from.
    #[must_use]
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// `Id` attribute of the root element.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// `TSLTag` attribute of the root element.
    #[must_use]
    pub fn tsl_tag(&self) -> Option<&str> {
        self.tsl_tag.as_deref()
    }

    /// `TSLVersionIdentifier`.
    #[must_use]
    pub fn version_identifier(&self) -> Option<u64> {
        self.version_identifier
    }

    /// `TSLSequenceNumber`.
    #[must_use]
    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_number
    }

    /// `TSLType` URI.
    #[must_use]
    pub fn tsl_type(&self) -> &str {
        &self.tsl_type
    }

    /// `SchemeTerritory`, typically an ISO 3166 country code.
    #[must_use]
    pub fn scheme_territory(&self) -> &str {
        &self.scheme_territory
    }

    /// `StatusDeterminationApproach` URI.
    #[must_use]
    pub fn status_determination_approach(&self) -> &str {
        &self.status_determination_approach
    }

    /// Scheme name in `lang`, falling back to English, then empty.
    #[must_use]
    pub fn scheme_name(&self, lang: &Language) -> String {
        locale::resolve(&self.scheme_names, lang)
    }

    /// All scheme names as published.
    #[must_use]
    pub fn scheme_names(&self) -> &[LocalizedString] {
        &self.scheme_names
    }

    /// Scheme operator name in `lang`, falling back to English, then empty.
    #[must_use]
    pub fn scheme_operator_name(&self, lang: &Language) -> String {
        locale::resolve(&self.scheme_operator_names, lang)
    }

    /// All scheme operator names as published.
    #[must_use]
    pub fn scheme_operator_names(&self) -> &[LocalizedString] {
        &self.scheme_operator_names
    }

    /// Scheme operator postal address in `lang`, with English fallback.
    #[must_use]
    pub fn scheme_operator_postal_address(&self, lang: &Language) -> Option<&PostalAddress> {
        self.scheme_operator_address.postal_for(lang)
    }

    /// Scheme operator electronic addresses.
    #[must_use]
    pub fn scheme_operator_electronic_addresses(&self) -> &[String] {
        &self.scheme_operator_address.electronic
    }

    /// Legal notice in `lang`, falling back to English, then empty.
    #[must_use]
    pub fn legal_notice(&self, lang: &Language) -> String {
        locale::resolve(&self.legal_notices, lang)
    }

    /// All legal notices as published.
    #[must_use]
    pub fn legal_notices(&self) -> &[LocalizedString] {
        &self.legal_notices
    }

    /// `SchemeInformationURI` entries.
    #[must_use]
    pub fn scheme_information_uris(&self) -> &[String] {
        &self.scheme_information_uris
    }

    /// `SchemeTypeCommunityRules` entries.
    #[must_use]
    pub fn community_rules(&self) -> &[String] {
        &self.community_rules
    }

    /// `HistoricalInformationPeriod` in days.
    #[must_use]
    pub fn historical_information_period(&self) -> Option<u64> {
        self.historical_information_period
    }

    /// `ListIssueDateTime`.
    #[must_use]
    pub fn issue_date_time(&self) -> Option<DateTime<Utc>> {
        self.issue_date_time
    }

    /// `NextUpdate`. `None` means no renewal is scheduled.
    #[must_use]
    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.next_update
    }

    /// `DistributionPoints` URIs.
    #[must_use]
    pub fn distribution_points(&self) -> &[String] {
        &self.distribution_points
    }

    /// Pointers to other lists, in document order.
    #[must_use]
    pub fn pointers(&self) -> &[OtherTslPointer] {
        &self.pointers
    }

    /// Trust service providers, in document order.
    #[must_use]
    pub fn providers(&self) -> &[TrustServiceProvider] {
        &self.providers
    }

    /// Names of scheme fields that were missing or unreadable.
    #[must_use]
    pub fn absent_fields(&self) -> &[String] {
        &self.absent_fields
    }

    /// Whether the document carries an XML signature.
    #[must_use]
    pub fn has_signature(&self) -> bool {
        self.signed
    }

    /// Verify the signature against the current time, once.
    ///
    /// Later calls return the cached result.
    pub fn verify_signature(&self) -> &VerificationResult {
        self.verify_signature_with(&SignatureVerifier::new())
    }

    /// Verify the signature with a specific verifier, once.
    ///
    /// Whichever verifier runs first decides the cached result.
    pub fn verify_signature_with(&self, verifier: &SignatureVerifier) -> &VerificationResult {
        self.verification.get_or_init(|| verifier.verify(&self.raw))
    }

    /// The cached verification result, if verification has run.
    #[must_use]
    pub fn verification(&self) -> Option<&VerificationResult> {
        self.verification.get()
    }

    /// A flat, serializable overview of the list.
    #[must_use]
    pub fn summary(&self, lang: &Language) -> ListSummary {
        ListSummary {
            territory: self.scheme_territory.clone(),
            tsl_type: self.tsl_type.clone(),
            sequence_number: self.sequence_number,
            scheme_name: self.scheme_name(lang),
            scheme_operator: self.scheme_operator_name(lang),
            issue_date_time: self.issue_date_time,
            next_update: self.next_update,
            fingerprint: self.fingerprint.clone(),
            provider_count: self.providers.len(),
            service_count: self.providers.iter().map(|p| p.services.len()).sum(),
            pointer_count: self.pointers.len(),
            signed: self.signed,
            absent_fields: self.absent_fields.clone(),
        }
    }
}

impl PartialEq for TrustStatusList {
    /// Structural equality; the verification cache is not compared.
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
            && self.id == other.id
            && self.tsl_tag == other.tsl_tag
            && self.version_identifier == other.version_identifier
            && self.sequence_number == other.sequence_number
            && self.tsl_type == other.tsl_type
            && self.scheme_operator_names == other.scheme_operator_names
            && self.scheme_operator_address == other.scheme_operator_address
            && self.scheme_names == other.scheme_names
            && self.scheme_information_uris == other.scheme_information_uris
            && self.status_determination_approach == other.status_determination_approach
            && self.community_rules == other.community_rules
            && self.scheme_territory == other.scheme_territory
            && self.legal_notices == other.legal_notices
            && self.historical_information_period == other.historical_information_period
            && self.pointers == other.pointers
            && self.issue_date_time == other.issue_date_time
            && self.next_update == other.next_update
            && self.distribution_points == other.distribution_points
            && self.providers == other.providers
            && self.signed == other.signed
            && self.absent_fields == other.absent_fields
    }
}

impl Eq for TrustStatusList {}

/// Flat overview of a list for reports and CLI output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListSummary {
    /// Scheme territory.
    pub territory: String,
    /// TSL type URI.
    pub tsl_type: String,
    /// Sequence number.
    pub sequence_number: Option<u64>,
    /// Scheme name in the requested language.
    pub scheme_name: String,
    /// Scheme operator name in the requested language.
    pub scheme_operator: String,
    /// Issue time.
    pub issue_date_time: Option<DateTime<Utc>>,
    /// Next scheduled update.
    pub next_update: Option<DateTime<Utc>>,
    /// Content fingerprint.
    pub fingerprint: String,
    /// Number of providers.
    pub provider_count: usize,
    /// Number of services across all providers.
    pub service_count: usize,
    /// Number of pointers to other lists.
    pub pointer_count: usize,
    /// Whether an XML signature is present.
    pub signed: bool,
    /// Scheme fields that were missing.
    pub absent_fields: Vec<String>,
}
