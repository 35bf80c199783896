//! Shared fixtures: list builder, in-test signer and a scripted fetcher.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use p256::ecdsa::signature::Signer as _;
use p256::pkcs8::DecodePrivateKey;
use tsltrust_core::c14n::{C14nMethod, Canonicalizer};
use tsltrust_core::xml::NS_DSIG;
use tsltrust_core::{FetchError, TslFetcher};
use tsltrust_crypto::digest::digest;
use tsltrust_crypto::DigestAlgorithm;

pub const EU_GENERIC: &str = "http://uri.etsi.org/TrstSvc/TrustedList/TSLType/EUgeneric";

const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
const ENVELOPED: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

struct Pointer {
    location: String,
    territory: String,
    signer: Option<Vec<u8>>,
    mime_type: Option<String>,
}

/// Builds trust list XML.
pub struct ListBuilder {
    territory: String,
    sequence: Option<u64>,
    operator: String,
    next_update: Option<String>,
    pointers: Vec<Pointer>,
    providers: Vec<String>,
}

impl ListBuilder {
    pub fn new(territory: &str) -> Self {
        Self {
            territory: territory.into(),
            sequence: Some(1),
            operator: format!("{territory} Supervisory Body"),
            next_update: Some("2030-01-01T00:00:00Z".into()),
            pointers: Vec::new(),
            providers: Vec::new(),
        }
    }

    pub fn sequence(mut self, sequence: Option<u64>) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn operator(mut self, name: &str) -> Self {
        self.operator = name.into();
        self
    }

    /// `None` writes an empty `NextUpdate` (closed scheme).
    pub fn next_update(mut self, next_update: Option<chrono::DateTime<chrono::Utc>>) -> Self {
        self.next_update = next_update.map(|t| t.to_rfc3339());
        self
    }

    pub fn pointer(mut self, location: &str, territory: &str) -> Self {
        self.pointers.push(Pointer {
            location: location.into(),
            territory: territory.into(),
            signer: None,
            mime_type: None,
        });
        self
    }

    /// Pointer that names `cert_der` as the expected signer.
    pub fn pointer_signed_by(mut self, location: &str, territory: &str, cert_der: &[u8]) -> Self {
        self.pointers.push(Pointer {
            location: location.into(),
            territory: territory.into(),
            signer: Some(cert_der.to_vec()),
            mime_type: None,
        });
        self
    }

    pub fn pdf_pointer(mut self, location: &str, territory: &str) -> Self {
        self.pointers.push(Pointer {
            location: location.into(),
            territory: territory.into(),
            signer: None,
            mime_type: Some("application/pdf".into()),
        });
        self
    }

    pub fn provider(mut self, name: &str) -> Self {
        self.providers.push(name.into());
        self
    }

    pub fn build(&self) -> String {
        let sequence = self
            .sequence
            .map(|s| format!("<TSLSequenceNumber>{s}</TSLSequenceNumber>"))
            .unwrap_or_default();
        let next_update = match &self.next_update {
            Some(t) => format!("<NextUpdate><dateTime>{t}</dateTime></NextUpdate>"),
            None => "<NextUpdate/>".into(),
        };

        let pointers = if self.pointers.is_empty() {
            String::new()
        } else {
            let entries: String = self.pointers.iter().map(pointer_xml).collect();
            format!("<PointersToOtherTSL>{entries}</PointersToOtherTSL>")
        };

        let providers = if self.providers.is_empty() {
            String::new()
        } else {
            let entries: String = self
                .providers
                .iter()
                .map(|name| {
                    format!(
                        r#"<TrustServiceProvider><TSPInformation><TSPName><Name xml:lang="en">{name}</Name></TSPName></TSPInformation><TSPServices><TSPService><ServiceInformation><ServiceTypeIdentifier>http://uri.etsi.org/TrstSvc/Svctype/CA/QC</ServiceTypeIdentifier><ServiceName><Name xml:lang="en">{name} CA</Name></ServiceName><ServiceStatus>http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/granted</ServiceStatus><StatusStartingTime>2020-01-01T00:00:00Z</StatusStartingTime></ServiceInformation></TSPService></TSPServices></TrustServiceProvider>"#
                    )
                })
                .collect();
            format!("<TrustServiceProviderList>{entries}</TrustServiceProviderList>")
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<TrustServiceStatusList xmlns="http://uri.etsi.org/02231/v2#" Id="tsl-{territory}" TSLTag="http://uri.etsi.org/19612/TSLTag">
<SchemeInformation>
<TSLVersionIdentifier>5</TSLVersionIdentifier>
{sequence}
<TSLType>{EU_GENERIC}</TSLType>
<SchemeOperatorName><Name xml:lang="en">{operator}</Name></SchemeOperatorName>
<SchemeName><Name xml:lang="en">{territory}: Trusted list</Name></SchemeName>
<SchemeTerritory>{territory}</SchemeTerritory>
{pointers}
<ListIssueDateTime>2024-01-15T00:00:00Z</ListIssueDateTime>
{next_update}
</SchemeInformation>
{providers}
</TrustServiceStatusList>"#,
            territory = self.territory,
            operator = self.operator,
        )
    }
}

fn pointer_xml(p: &Pointer) -> String {
    let identities = p
        .signer
        .as_ref()
        .map(|der| {
            format!(
                "<ServiceDigitalIdentities><ServiceDigitalIdentity><DigitalId><X509Certificate>{}</X509Certificate></DigitalId></ServiceDigitalIdentity></ServiceDigitalIdentities>",
                STANDARD.encode(der)
            )
        })
        .unwrap_or_default();
    let mime = p
        .mime_type
        .as_ref()
        .map(|m| format!("<OtherInformation><MimeType>{m}</MimeType></OtherInformation>"))
        .unwrap_or_default();
    format!(
        "<OtherTSLPointer>{identities}<TSLLocation>{location}</TSLLocation><AdditionalInformation><OtherInformation><SchemeTerritory>{territory}</SchemeTerritory></OtherInformation><OtherInformation><TSLType>{EU_GENERIC}</TSLType></OtherInformation>{mime}</AdditionalInformation></OtherTSLPointer>",
        location = p.location,
        territory = p.territory,
    )
}

/// A self-signed P-256 certificate with its key.
pub struct TestSigner {
    pub cert_der: Vec<u8>,
    key: p256::ecdsa::SigningKey,
}

impl TestSigner {
    pub fn new(name: &str) -> Self {
        let certified = rcgen::generate_simple_self_signed(vec![name.to_string()]).unwrap();
        let key = p256::ecdsa::SigningKey::from_pkcs8_der(&certified.key_pair.serialize_der())
            .unwrap();
        Self {
            cert_der: certified.cert.der().to_vec(),
            key,
        }
    }

    /// Add an enveloped exc-c14n / SHA-256 / ECDSA signature before the
    /// closing tag of the document element.
    pub fn sign(&self, unsigned: &str) -> Vec<u8> {
        let method = C14nMethod::from_uri(EXC_C14N).unwrap();

        let doc = roxmltree::Document::parse(unsigned).unwrap();
        let canonical = Canonicalizer::new(method).canonicalize(doc.root());
        let digest_value = STANDARD.encode(digest(DigestAlgorithm::Sha256, canonical.as_bytes()));
        let certificate = STANDARD.encode(&self.cert_der);

        let signature = |value: &str| {
            format!(
                r#"<ds:Signature xmlns:ds="{NS_DSIG}"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="{EXC_C14N}"/><ds:SignatureMethod Algorithm="{ECDSA_SHA256}"/><ds:Reference URI=""><ds:Transforms><ds:Transform Algorithm="{ENVELOPED}"/><ds:Transform Algorithm="{EXC_C14N}"/></ds:Transforms><ds:DigestMethod Algorithm="{SHA256}"/><ds:DigestValue>{digest_value}</ds:DigestValue></ds:Reference></ds:SignedInfo><ds:SignatureValue>{value}</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{certificate}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>"#
            )
        };
        let close = unsigned.rfind("</").unwrap();
        let insert = |sig: String| format!("{}{}{}", &unsigned[..close], sig, &unsigned[close..]);

        let placeholder = insert(signature(""));
        let doc = roxmltree::Document::parse(&placeholder).unwrap();
        let signed_info = doc
            .descendants()
            .find(|n| n.has_tag_name((NS_DSIG, "SignedInfo")))
            .unwrap();
        let canonical_signed_info = Canonicalizer::new(method).canonicalize(signed_info);
        let value: p256::ecdsa::Signature = self.key.sign(canonical_signed_info.as_bytes());

        insert(signature(&STANDARD.encode(value.to_bytes()))).into_bytes()
    }
}

/// What the scripted fetcher does for one URI.
#[derive(Clone)]
pub enum Scripted {
    Body(Vec<u8>),
    Delayed(Duration, Vec<u8>),
    Fail(FetchError),
}

/// Fetcher serving scripted responses and counting requests.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: HashMap<String, Scripted>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, uri: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(uri.into(), Scripted::Body(body.into()));
        self
    }

    pub fn serve_after(mut self, uri: &str, delay: Duration, body: impl Into<Vec<u8>>) -> Self {
        self.responses
            .insert(uri.into(), Scripted::Delayed(delay, body.into()));
        self
    }

    pub fn fail(mut self, uri: &str, error: FetchError) -> Self {
        self.responses.insert(uri.into(), Scripted::Fail(error));
        self
    }

    pub fn calls(&self, uri: &str) -> usize {
        self.calls.lock().unwrap().get(uri).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl TslFetcher for ScriptedFetcher {
    async fn fetch(&self, uri: &str, _timeout: Duration) -> Result<Vec<u8>, FetchError> {
        *self.calls.lock().unwrap().entry(uri.to_string()).or_insert(0) += 1;
        match self.responses.get(uri).cloned() {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Delayed(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(body)
            },
            Some(Scripted::Fail(error)) => Err(error),
            None => Err(FetchError::Status { status: 404 }),
        }
    }
}
