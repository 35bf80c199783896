//! Enveloped XML signature verification.
//!
//! Verification never errors: every problem with a signature is an outcome
//! ([`VerificationStatus::Failed`] with a reason), because a list with a bad
//! signature is still a list the caller may want to look at.
//!
//! ## Flow
//!
//! ```text
//! raw bytes ─► parse ─► find ds:Signature ─► reject duplicate ids
//!    │
//!    ├─► each Reference: resolve URI ─► transforms ─► c14n ─► digest == DigestValue
//!    │
//!    ├─► KeyInfo: signer certificate (+ chain, link by link)
//!    │
//!    └─► c14n(SignedInfo) ─► SignatureValue under signer key ─► signer validity
//! ```

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tsltrust_crypto::digest::digest;
use tsltrust_crypto::{
    constant_time_eq, verify_signature, DigestAlgorithm, SignatureAlgorithm, SignerCertificate,
};

use crate::c14n::{C14nMethod, Canonicalizer};
use crate::xml::{self, NS_DSIG};

const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
const ID_ATTRIBUTES: [&str; 3] = ["Id", "ID", "id"];

/// Outcome class of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Signature present and valid.
    Verified,
    /// Signature present but invalid, or the document could not be checked.
    Failed,
    /// No signature in the document.
    NotSigned,
}

/// Identity of the certificate that signed a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerIdentity {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Serial number, lowercase hex.
    pub serial_hex: String,
    /// Start of validity.
    pub not_before: DateTime<Utc>,
    /// End of validity.
    pub not_after: DateTime<Utc>,
    /// SHA-256 of the certificate DER, lowercase hex.
    pub certificate_sha256: String,
    /// Subject key identifier, lowercase hex.
    pub subject_key_id: Option<String>,
    /// Number of certificates presented in `KeyInfo`.
    pub chain_length: usize,
}

impl SignerIdentity {
    fn from_certificate(cert: &SignerCertificate, chain_length: usize) -> Self {
        Self {
            subject: cert.subject.clone(),
            issuer: cert.issuer.clone(),
            serial_hex: cert.serial_hex.clone(),
            not_before: DateTime::from_timestamp(cert.not_before, 0).unwrap_or_default(),
            not_after: DateTime::from_timestamp(cert.not_after, 0).unwrap_or_default(),
            certificate_sha256: cert.sha256.clone(),
            subject_key_id: cert.subject_key_id.clone(),
            chain_length,
        }
    }
}

/// Result of verifying a list's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Outcome class.
    pub status: VerificationStatus,
    /// Human-readable diagnostic.
    pub reason: String,
    /// Signer, when a certificate could be read.
    pub signer: Option<SignerIdentity>,
    /// `SignatureMethod` URI, when one was read.
    pub algorithm: Option<String>,
    /// Time used for certificate validity checks.
    pub checked_at: DateTime<Utc>,
}

impl VerificationResult {
    fn not_signed(checked_at: DateTime<Utc>) -> Self {
        Self {
            status: VerificationStatus::NotSigned,
            reason: "document carries no XML signature".into(),
            signer: None,
            algorithm: None,
            checked_at,
        }
    }

    /// Whether the signature verified.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }
}

/// Probe for an XML signature. `false` for anything that does not parse.
#[must_use]
pub fn has_signature(raw: &[u8]) -> bool {
    let Ok(text) = xml::decode(raw) else {
        return false;
    };
    let Ok(doc) = xml::parse_document(text) else {
        return false;
    };
    find_signature(&doc).is_some()
}

/// The document's signature element: a `ds:Signature` child of the root
/// element, or failing that the first one anywhere.
pub(crate) fn find_signature<'a, 'i>(doc: &'a Document<'i>) -> Option<Node<'a, 'i>> {
    doc.root_element()
        .children()
        .find(is_signature)
        .or_else(|| doc.descendants().find(is_signature))
}

fn is_signature(node: &Node<'_, '_>) -> bool {
    node.is_element() && node.has_tag_name((NS_DSIG, "Signature"))
}

/// Verifies enveloped XML signatures on trust lists.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier {
    clock: Option<DateTime<Utc>>,
}

/// Internal failure carrying whatever signer identity was read so far.
struct Failure {
    reason: String,
    signer: Option<SignerIdentity>,
}

impl Failure {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            signer: None,
        }
    }

    fn with_signer(reason: impl Into<String>, signer: &SignerIdentity) -> Self {
        Self {
            reason: reason.into(),
            signer: Some(signer.clone()),
        }
    }
}

impl SignatureVerifier {
    /// Verifier that checks certificate validity against the current time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier that checks certificate validity at a fixed time.
    #[must_use]
    pub fn at(time: DateTime<Utc>) -> Self {
        Self { clock: Some(time) }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    /// Verify the enveloped signature of a raw document.
    pub fn verify(&self, raw: &[u8]) -> VerificationResult {
        let checked_at = self.now();
        let mut algorithm = None;
        let outcome = self.verify_inner(raw, checked_at, &mut algorithm);

        let result = match outcome {
            Ok(Some(signer)) => VerificationResult {
                status: VerificationStatus::Verified,
                reason: format!("signed by {}", signer.subject),
                signer: Some(signer),
                algorithm,
                checked_at,
            },
            Ok(None) => VerificationResult::not_signed(checked_at),
            Err(failure) => VerificationResult {
                status: VerificationStatus::Failed,
                reason: failure.reason,
                signer: failure.signer,
                algorithm,
                checked_at,
            },
        };

        match result.status {
            VerificationStatus::Failed => warn!(reason = %result.reason, "Signature verification failed"),
            _ => debug!(status = ?result.status, reason = %result.reason, "Signature checked"),
        }
        result
    }

    fn verify_inner(
        &self,
        raw: &[u8],
        now: DateTime<Utc>,
        algorithm_out: &mut Option<String>,
    ) -> Result<Option<SignerIdentity>, Failure> {
        let text = xml::decode(raw).map_err(|e| Failure::new(e.to_string()))?;
        let doc = xml::parse_document(text).map_err(|e| Failure::new(e.to_string()))?;

        let Some(signature) = find_signature(&doc) else {
            return Ok(None);
        };

        let ids = index_ids(&doc)?;

        let signed_info = ds_child(signature, "SignedInfo")
            .ok_or_else(|| Failure::new("Signature has no SignedInfo"))?;

        let c14n_node = ds_child(signed_info, "CanonicalizationMethod")
            .ok_or_else(|| Failure::new("SignedInfo has no CanonicalizationMethod"))?;
        let c14n = canonicalizer_for(c14n_node)?;

        let method_uri = ds_child(signed_info, "SignatureMethod")
            .and_then(|n| n.attribute("Algorithm"))
            .ok_or_else(|| Failure::new("SignedInfo has no SignatureMethod"))?;
        *algorithm_out = Some(method_uri.to_string());
        let algorithm = SignatureAlgorithm::from_uri(method_uri)
            .ok_or_else(|| Failure::new(format!("unsupported signature algorithm {method_uri}")))?;

        let mut covers_document = false;
        let mut references = 0usize;
        for reference in ds_children(signed_info, "Reference") {
            references += 1;
            covers_document |= check_reference(&doc, signature, reference, &ids)?;
        }
        if references == 0 {
            return Err(Failure::new("SignedInfo has no Reference"));
        }
        if !covers_document {
            return Err(Failure::new("no Reference covers the document element"));
        }

        let chain = signer_chain(signature)?;
        let signer_cert = &chain[0];
        let signer = SignerIdentity::from_certificate(signer_cert, chain.len());

        for pair in chain.windows(2) {
            pair[0]
                .verify_issued_by(&pair[1])
                .map_err(|e| Failure::with_signer(e.to_string(), &signer))?;
        }

        let signature_value = ds_child(signature, "SignatureValue")
            .and_then(crate::provider::decode_base64)
            .ok_or_else(|| Failure::with_signer("missing or undecodable SignatureValue", &signer))?;

        let canonical_signed_info = c14n.canonicalize(signed_info);
        verify_signature(
            algorithm,
            signer_cert.der(),
            canonical_signed_info.as_bytes(),
            &signature_value,
        )
        .map_err(|e| Failure::with_signer(e.to_string(), &signer))?;

        if !signer_cert.is_valid_at(now.timestamp()) {
            return Err(Failure::with_signer(
                format!(
                    "signer certificate not valid at {} (valid {} to {})",
                    now.to_rfc3339(),
                    signer.not_before.to_rfc3339(),
                    signer.not_after.to_rfc3339()
                ),
                &signer,
            ));
        }

        Ok(Some(signer))
    }
}

fn ds_child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|c| c.is_element() && c.has_tag_name((NS_DSIG, name)))
}

fn ds_children<'a, 'i: 'a>(
    node: Node<'a, 'i>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.has_tag_name((NS_DSIG, name)))
}

/// Map every id attribute value to its element, rejecting duplicates.
fn index_ids<'a, 'i>(doc: &'a Document<'i>) -> Result<HashMap<&'a str, Node<'a, 'i>>, Failure> {
    let mut ids = HashMap::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        for attr in node.attributes() {
            if attr.namespace().is_some() || !ID_ATTRIBUTES.contains(&attr.name()) {
                continue;
            }
            if ids.insert(attr.value(), node).is_some() {
                return Err(Failure::new(format!("duplicate id '{}'", attr.value())));
            }
        }
    }
    Ok(ids)
}

/// Build the canonicalizer a `CanonicalizationMethod` or `Transform` names.
fn canonicalizer_for(node: Node<'_, '_>) -> Result<Canonicalizer, Failure> {
    let uri = node.attribute("Algorithm").unwrap_or_default();
    let method = C14nMethod::from_uri(uri)
        .ok_or_else(|| Failure::new(format!("unsupported canonicalization {uri}")))?;
    Ok(Canonicalizer::new(method).with_inclusive_prefixes(prefix_list(node)))
}

fn prefix_list(node: Node<'_, '_>) -> Vec<String> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == "InclusiveNamespaces")
        .and_then(|n| n.attribute("PrefixList"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Check one Reference. Returns whether it covers the document element.
fn check_reference<'a, 'i>(
    doc: &'a Document<'i>,
    signature: Node<'a, 'i>,
    reference: Node<'a, 'i>,
    ids: &HashMap<&'a str, Node<'a, 'i>>,
) -> Result<bool, Failure> {
    let uri = reference.attribute("URI").unwrap_or_default();
    let (apex, covers_document) = if uri.is_empty() {
        (doc.root(), true)
    } else if let Some(id) = uri.strip_prefix('#') {
        let target = *ids
            .get(id)
            .ok_or_else(|| Failure::new(format!("reference target '{uri}' not found")))?;
        (target, target == doc.root_element())
    } else {
        return Err(Failure::new(format!("unsupported reference URI '{uri}'")));
    };

    // Same-document references never include comments.
    let mut method = C14nMethod::DEFAULT;
    let mut prefixes = Vec::new();
    let mut enveloped = false;
    if let Some(transforms) = ds_child(reference, "Transforms") {
        for transform in ds_children(transforms, "Transform") {
            let alg = transform.attribute("Algorithm").unwrap_or_default();
            if alg == ENVELOPED_SIGNATURE {
                enveloped = true;
            } else if let Some(m) = C14nMethod::from_uri(alg) {
                method = m;
                prefixes = prefix_list(transform);
            } else {
                return Err(Failure::new(format!("unsupported transform {alg}")));
            }
        }
    }
    method.with_comments = false;

    let mut canonicalizer = Canonicalizer::new(method).with_inclusive_prefixes(prefixes);
    if enveloped {
        canonicalizer = canonicalizer.excluding(signature.id());
    }
    let canonical = canonicalizer.canonicalize(apex);

    let digest_uri = ds_child(reference, "DigestMethod")
        .and_then(|n| n.attribute("Algorithm"))
        .unwrap_or_default();
    let digest_alg = DigestAlgorithm::from_uri(digest_uri)
        .ok_or_else(|| Failure::new(format!("unsupported digest algorithm '{digest_uri}'")))?;
    let expected = ds_child(reference, "DigestValue")
        .and_then(crate::provider::decode_base64)
        .ok_or_else(|| Failure::new(format!("reference '{uri}' has no usable DigestValue")))?;

    let actual = digest(digest_alg, canonical.as_bytes());
    if !constant_time_eq(&actual, &expected) {
        return Err(Failure::new(format!(
            "digest mismatch for reference '{uri}' (computed {})",
            STANDARD.encode(&actual)
        )));
    }
    Ok(covers_document)
}

/// Decode the `X509Certificate` entries of `KeyInfo`, signer first.
fn signer_chain(signature: Node<'_, '_>) -> Result<Vec<SignerCertificate>, Failure> {
    let key_info =
        ds_child(signature, "KeyInfo").ok_or_else(|| Failure::new("Signature has no KeyInfo"))?;

    let mut chain = Vec::new();
    for data in ds_children(key_info, "X509Data") {
        for cert in ds_children(data, "X509Certificate") {
            let der = crate::provider::decode_base64(cert)
                .ok_or_else(|| Failure::new("undecodable X509Certificate"))?;
            let parsed =
                SignerCertificate::from_der(&der).map_err(|e| Failure::new(e.to_string()))?;
            chain.push(parsed);
        }
    }
    if chain.is_empty() {
        return Err(Failure::new("KeyInfo carries no X509Certificate"));
    }
    Ok(chain)
}
