//! X.509 certificate inspection for signer identities.
//!
//! Trust lists embed their signer's certificate in `KeyInfo` and name the
//! expected signers of other lists in pointer entries. This module reads the
//! fields needed to compare those identities and to check validity windows
//! and issuer links. It does not build paths to trust anchors.

use serde::{Deserialize, Serialize};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::ParsedExtension;

use crate::digest::sha256_hex;
use crate::error::CryptoError;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";

/// Public key family of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// RSA public key.
    Rsa,
    /// Elliptic curve public key.
    Ec,
    /// Anything else (Ed25519, DSA, ...).
    Other,
}

/// Decoded view of a DER certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerCertificate {
    /// DER encoding as found in the document.
    #[serde(skip)]
    der: Vec<u8>,
    /// Subject distinguished name (RFC 4514 style).
    pub subject: String,
    /// Issuer distinguished name (RFC 4514 style).
    pub issuer: String,
    /// Serial number, lowercase hex.
    pub serial_hex: String,
    /// Start of validity (Unix seconds).
    pub not_before: i64,
    /// End of validity (Unix seconds).
    pub not_after: i64,
    /// Subject key identifier extension, lowercase hex.
    pub subject_key_id: Option<String>,
    /// SHA-256 of the DER encoding, lowercase hex.
    pub sha256: String,
    /// Public key family.
    pub key_type: KeyType,
}

impl SignerCertificate {
    /// Decode a DER certificate.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidCertificate`] if the bytes are not a
    /// well-formed X.509 certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let cert = parse(der)?;

        let subject_key_id = cert
            .tbs_certificate
            .extensions()
            .iter()
            .find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(kid) => Some(hex::encode(kid.0)),
                _ => None,
            });

        let key_type = match cert
            .public_key()
            .algorithm
            .algorithm
            .to_id_string()
            .as_str()
        {
            OID_RSA_ENCRYPTION => KeyType::Rsa,
            OID_EC_PUBLIC_KEY => KeyType::Ec,
            _ => KeyType::Other,
        };

        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial_hex: hex::encode(cert.raw_serial()),
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            subject_key_id,
            sha256: sha256_hex(der),
            key_type,
        })
    }

    /// The DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// DER encoding of the SubjectPublicKeyInfo.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored DER no longer parses.
    pub fn spki_der(&self) -> Result<Vec<u8>, CryptoError> {
        let cert = parse(&self.der)?;
        Ok(cert.public_key().raw.to_vec())
    }

    /// Whether `unix_time` falls inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, unix_time: i64) -> bool {
        self.not_before <= unix_time && unix_time <= self.not_after
    }

    /// Whether subject and issuer names are identical.
    #[must_use]
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    /// Check that this certificate was signed by `issuer`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::ChainBroken`] if the issuer name does not match
    /// or the certificate signature does not verify under the issuer key.
    pub fn verify_issued_by(&self, issuer: &SignerCertificate) -> Result<(), CryptoError> {
        if self.issuer != issuer.subject {
            return Err(CryptoError::ChainBroken {
                reason: format!(
                    "issuer '{}' does not match next certificate subject '{}'",
                    self.issuer, issuer.subject
                ),
            });
        }

        let cert = parse(&self.der)?;
        let issuer_cert = parse(&issuer.der)?;
        cert.verify_signature(Some(issuer_cert.public_key()))
            .map_err(|e| CryptoError::ChainBroken {
                reason: format!("signature by '{}' does not verify: {e}", issuer.subject),
            })
    }
}

fn parse(der: &[u8]) -> Result<X509Certificate<'_>, CryptoError> {
    let (rest, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| CryptoError::invalid_certificate(e.to_string()))?;
    if !rest.is_empty() {
        return Err(CryptoError::invalid_certificate(format!(
            "{} trailing bytes after certificate",
            rest.len()
        )));
    }
    Ok(cert)
}
