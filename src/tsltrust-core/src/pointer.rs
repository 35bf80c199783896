//! Pointers from one trust list to another.

use roxmltree::Node;
use serde::{Deserialize, Serialize};
use tsltrust_crypto::sha256_hex;

use crate::locale::{self, Language, LocalizedString};
use crate::provider::DigitalIdentity;
use crate::signature::SignerIdentity;
use crate::xml;

/// An `OtherTSLPointer` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherTslPointer {
    /// Where the pointed-to list is published (`TSLLocation`).
    pub location: String,
    /// Territory the pointer claims for the target.
    pub territory: Option<String>,
    /// TSL type the pointer claims for the target.
    pub tsl_type: Option<String>,
    /// Operator names claimed for the target.
    pub operator_names: Vec<LocalizedString>,
    /// Community rules claimed for the target.
    pub community_rules: Vec<String>,
    /// MIME type of the target (XML or PDF rendering).
    pub mime_type: Option<String>,
    /// Expected signers of the target.
    pub hints: DigitalIdentity,
}

/// Outcome of checking a target's signer against pointer hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintCheck {
    /// The pointer names no expected signer.
    NoHints,
    /// The signer matches one of the hints.
    Matched,
    /// The signer matches none of the hints.
    Mismatch(String),
}

impl OtherTslPointer {
    pub(crate) fn from_node(node: Node<'_, '_>) -> Self {
        let mut pointer = Self {
            location: xml::child_text(node, "TSLLocation").unwrap_or_default(),
            territory: None,
            tsl_type: None,
            operator_names: Vec::new(),
            community_rules: Vec::new(),
            mime_type: None,
            hints: xml::child(node, "ServiceDigitalIdentities")
                .map(DigitalIdentity::from_node)
                .unwrap_or_default(),
        };

        // Each OtherInformation carries exactly one value; order varies.
        if let Some(extra) = xml::child(node, "AdditionalInformation") {
            for info in xml::children(extra, "OtherInformation") {
                let Some(value) = info.children().find(|c| c.is_element()) else {
                    continue;
                };
                match value.tag_name().name() {
                    "SchemeTerritory" => pointer.territory = Some(xml::text_of(value)),
                    "TSLType" => pointer.tsl_type = Some(xml::text_of(value)),
                    "MimeType" => pointer.mime_type = Some(xml::text_of(value)),
                    "SchemeOperatorName" => {
                        pointer
                            .operator_names
                            .extend(xml::localized(value, None, "Name"));
                    },
                    "SchemeTypeCommunityRules" => {
                        pointer
                            .community_rules
                            .extend(xml::uri_list(info, "SchemeTypeCommunityRules"));
                    },
                    _ => {},
                }
            }
        }
        pointer.territory = pointer.territory.filter(|t| !t.is_empty());
        pointer.tsl_type = pointer.tsl_type.filter(|t| !t.is_empty());
        pointer.mime_type = pointer.mime_type.filter(|t| !t.is_empty());
        pointer
    }

    /// Operator name in `lang`, falling back to English, then empty.
    #[must_use]
    pub fn operator_name(&self, lang: &Language) -> String {
        locale::resolve(&self.operator_names, lang)
    }

    /// Whether the pointer targets an XML list rather than a human-readable one.
    ///
    /// Pointers without a MIME type are assumed to be XML.
    #[must_use]
    pub fn is_xml(&self) -> bool {
        self.mime_type
            .as_deref()
            .map_or(true, |m| m.to_ascii_lowercase().contains("xml"))
    }

    /// Compare the target's signer with the expected-signer hints.
    ///
    /// Any single hint matching is enough: a certificate by DER hash, a
    /// subject name by its set of RDN components, or a subject key identifier.
    #[must_use]
    pub fn check_signer(&self, signer: Option<&SignerIdentity>) -> HintCheck {
        if self.hints.is_empty() {
            return HintCheck::NoHints;
        }
        let Some(signer) = signer else {
            return HintCheck::Mismatch("pointer names expected signers but target has no signer certificate".into());
        };

        let cert_match = self
            .hints
            .certificates
            .iter()
            .any(|der| sha256_hex(der) == signer.certificate_sha256);
        let name_match = self
            .hints
            .subject_names
            .iter()
            .any(|name| same_distinguished_name(name, &signer.subject));
        let ski_match = signer.subject_key_id.as_ref().is_some_and(|ski| {
            self.hints
                .skis
                .iter()
                .any(|hint| hex::encode(hint).eq_ignore_ascii_case(ski))
        });

        if cert_match || name_match || ski_match {
            HintCheck::Matched
        } else {
            HintCheck::Mismatch(format!(
                "signer '{}' matches none of {} certificate, {} name and {} key identifier hints",
                signer.subject,
                self.hints.certificates.len(),
                self.hints.subject_names.len(),
                self.hints.skis.len()
            ))
        }
    }
}

/// Compare two distinguished names as unordered sets of `type=value` parts.
///
/// Trust lists write subject names in either RFC 2253 or display order, so
/// the RDN sequence is not significant here.
fn same_distinguished_name(a: &str, b: &str) -> bool {
    fn parts(dn: &str) -> Vec<String> {
        let mut v: Vec<String> = dn
            .split(|c: char| c == ',' || c == '+')
            .map(|p| {
                let (k, val) = p.split_once('=').unwrap_or((p, ""));
                format!("{}={}", k.trim().to_ascii_uppercase(), val.trim())
            })
            .filter(|p| p != "=")
            .collect();
        v.sort();
        v
    }
    let (pa, pb) = (parts(a), parts(b));
    !pa.is_empty() && pa == pb
}
