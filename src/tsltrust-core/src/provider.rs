//! Trust service providers and their services.
//!
//! Pure structural extraction: values are copied out of the document as
//! they are, without checking them against any registry of service types
//! or statuses.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::locale::{self, Language, Localized, LocalizedString};
use crate::xml;

/// A postal address in one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    /// `xml:lang` of the address.
    pub lang: String,
    /// Street and number.
    pub street_address: String,
    /// City or town.
    pub locality: String,
    /// State or province.
    pub state_or_province: String,
    /// Postal code.
    pub postal_code: String,
    /// Country code or name.
    pub country_name: String,
}

impl Localized for PostalAddress {
    fn lang(&self) -> &str {
        &self.lang
    }
}

impl PostalAddress {
    fn from_node(node: Node<'_, '_>) -> Self {
        let field = |name: &str| xml::child_text(node, name).unwrap_or_default();
        Self {
            lang: xml::lang_of(node),
            street_address: field("StreetAddress"),
            locality: field("Locality"),
            state_or_province: field("StateOrProvince"),
            postal_code: field("PostalCode"),
            country_name: field("CountryName"),
        }
    }
}

/// Postal and electronic addresses from an address block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Postal addresses, one per language.
    pub postal: Vec<PostalAddress>,
    /// Electronic addresses (mailto:, http: ...).
    pub electronic: Vec<String>,
}

impl Address {
    /// Read an address block such as `SchemeOperatorAddress` or `TSPAddress`.
    pub(crate) fn from_node(node: Node<'_, '_>) -> Self {
        let postal = xml::child(node, "PostalAddresses")
            .map(|p| {
                xml::children(p, "PostalAddress")
                    .map(PostalAddress::from_node)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            postal,
            electronic: xml::uri_list(node, "ElectronicAddress"),
        }
    }

    /// The postal address for `lang`, with the usual English fallback.
    #[must_use]
    pub fn postal_for(&self, lang: &Language) -> Option<&PostalAddress> {
        locale::select(&self.postal, lang)
    }
}

/// Certificates and names identifying a service or an expected list signer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalIdentity {
    /// DER certificates.
    #[serde(with = "base64_list")]
    pub certificates: Vec<Vec<u8>>,
    /// X.509 subject names.
    pub subject_names: Vec<String>,
    /// Subject key identifiers.
    #[serde(with = "base64_list")]
    pub skis: Vec<Vec<u8>>,
}

impl DigitalIdentity {
    /// Collect every `DigitalId` below `node`.
    ///
    /// Entries whose base64 does not decode are skipped.
    pub(crate) fn from_node(node: Node<'_, '_>) -> Self {
        let mut identity = Self::default();
        for id in node
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "DigitalId")
        {
            if let Some(der) = xml::child(id, "X509Certificate").and_then(decode_base64) {
                identity.certificates.push(der);
            }
            if let Some(name) = xml::child_text(id, "X509SubjectName") {
                identity.subject_names.push(name);
            }
            if let Some(ski) = xml::child(id, "X509SKI").and_then(decode_base64) {
                identity.skis.push(ski);
            }
        }
        identity
    }

    /// Whether no identity material is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty() && self.subject_names.is_empty() && self.skis.is_empty()
    }
}

/// Decode the base64 text of an element, ignoring embedded whitespace.
pub(crate) fn decode_base64(node: Node<'_, '_>) -> Option<Vec<u8>> {
    let compact: String = xml::text_of(node)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return None;
    }
    STANDARD.decode(compact).ok()
}

/// One entry of a service's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHistoryEntry {
    /// Service type identifier URI.
    pub service_type: String,
    /// Service names.
    pub names: Vec<LocalizedString>,
    /// Identity at that point in time.
    pub identity: DigitalIdentity,
    /// Status URI.
    pub status: String,
    /// When this status began.
    pub status_starting_time: Option<DateTime<Utc>>,
}

/// A trust service as listed under a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustService {
    /// Service type identifier URI.
    pub service_type: String,
    /// Service names.
    pub names: Vec<LocalizedString>,
    /// Certificates and names identifying the service.
    pub identity: DigitalIdentity,
    /// Current status URI.
    pub status: String,
    /// When the current status began.
    pub status_starting_time: Option<DateTime<Utc>>,
    /// Service definition URIs.
    pub definition_uris: Vec<String>,
    /// Supply points (URIs where the service is offered).
    pub supply_points: Vec<String>,
    /// Previous states, newest first as published.
    pub history: Vec<ServiceHistoryEntry>,
}

impl TrustService {
    fn from_node(node: Node<'_, '_>) -> Self {
        let info = xml::child(node, "ServiceInformation").unwrap_or(node);
        let history = xml::child(node, "ServiceHistory")
            .map(|h| {
                xml::children(h, "ServiceHistoryInstance")
                    .map(|inst| ServiceHistoryEntry {
                        service_type: xml::child_text(inst, "ServiceTypeIdentifier")
                            .unwrap_or_default(),
                        names: xml::localized(inst, Some("ServiceName"), "Name"),
                        identity: xml::child(inst, "ServiceDigitalIdentity")
                            .map(DigitalIdentity::from_node)
                            .unwrap_or_default(),
                        status: xml::child_text(inst, "ServiceStatus").unwrap_or_default(),
                        status_starting_time: xml::child_text(inst, "StatusStartingTime")
                            .and_then(|t| xml::parse_datetime(&t)),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let supply_points = xml::child(info, "ServiceSupplyPoints")
            .map(|s| {
                xml::children(s, "ServiceSupplyPoint")
                    .map(xml::text_of)
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            service_type: xml::child_text(info, "ServiceTypeIdentifier").unwrap_or_default(),
            names: xml::localized(info, Some("ServiceName"), "Name"),
            identity: xml::child(info, "ServiceDigitalIdentity")
                .map(DigitalIdentity::from_node)
                .unwrap_or_default(),
            status: xml::child_text(info, "ServiceStatus").unwrap_or_default(),
            status_starting_time: xml::child_text(info, "StatusStartingTime")
                .and_then(|t| xml::parse_datetime(&t)),
            definition_uris: xml::uri_list(info, "TSPServiceDefinitionURI"),
            supply_points,
            history,
        }
    }

    /// Service name in `lang`, falling back to English, then empty.
    #[must_use]
    pub fn name(&self, lang: &Language) -> String {
        locale::resolve(&self.names, lang)
    }
}

/// A trust service provider entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustServiceProvider {
    /// Provider names.
    pub names: Vec<LocalizedString>,
    /// Trade names.
    pub trade_names: Vec<LocalizedString>,
    /// Postal and electronic addresses.
    pub address: Address,
    /// Information URIs.
    pub information_uris: Vec<String>,
    /// Services, in document order.
    pub services: Vec<TrustService>,
}

impl TrustServiceProvider {
    pub(crate) fn from_node(node: Node<'_, '_>) -> Self {
        let info = xml::child(node, "TSPInformation").unwrap_or(node);
        let services = xml::child(node, "TSPServices")
            .map(|s| {
                xml::children(s, "TSPService")
                    .map(TrustService::from_node)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            names: xml::localized(info, Some("TSPName"), "Name"),
            trade_names: xml::localized(info, Some("TSPTradeName"), "Name"),
            address: xml::child(info, "TSPAddress")
                .map(Address::from_node)
                .unwrap_or_default(),
            information_uris: xml::uri_list(info, "TSPInformationURI"),
            services,
        }
    }

    /// Provider name in `lang`, falling back to English, then empty.
    #[must_use]
    pub fn name(&self, lang: &Language) -> String {
        locale::resolve(&self.names, lang)
    }
}

mod base64_list {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        items
            .iter()
            .map(|b| STANDARD.encode(b))
            .collect::<Vec<_>>()
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(d)?
            .into_iter()
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
