//! Signature verification for `SignatureValue` elements.
//!
//! Keys arrive either as a DER certificate (from `X509Certificate`) or as a
//! DER SubjectPublicKeyInfo. Both are normalized to SPKI before decoding.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePublicKey as _;
use rsa::pkcs1v15;
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use signature::Verifier;

use crate::error::CryptoError;
use crate::types::SignatureAlgorithm;

/// Verify `signature` over `message` with the key in `key_der`.
///
/// `key_der` may be a DER certificate or a DER SubjectPublicKeyInfo. ECDSA
/// signatures are accepted in the raw `r || s` form used by XML signatures
/// and, failing that, as an ASN.1 DER sequence.
///
/// # Errors
///
/// Returns [`CryptoError::VerificationFailed`] when the signature does not
/// verify, and key or encoding errors when the inputs are malformed.
pub fn verify_signature(
    algorithm: SignatureAlgorithm,
    key_der: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let spki = spki_from_key_or_cert(key_der);
    match algorithm {
        SignatureAlgorithm::RsaSha1
        | SignatureAlgorithm::RsaSha256
        | SignatureAlgorithm::RsaSha384
        | SignatureAlgorithm::RsaSha512 => verify_rsa(algorithm, &spki, message, signature),
        SignatureAlgorithm::EcdsaSha256 => verify_p256(&spki, message, signature),
        SignatureAlgorithm::EcdsaSha384 => verify_p384(&spki, message, signature),
    }
}

fn spki_from_key_or_cert(der: &[u8]) -> Vec<u8> {
    if let Ok((_, cert)) = x509_parser::parse_x509_certificate(der) {
        return cert.tbs_certificate.subject_pki.raw.to_vec();
    }
    der.to_vec()
}

fn verify_rsa(
    algorithm: SignatureAlgorithm,
    spki: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let key = RsaPublicKey::from_public_key_der(spki).map_err(|e| {
        CryptoError::KeyAlgorithmMismatch {
            algorithm,
            key_type: format!("non-RSA or malformed ({e})"),
        }
    })?;
    let sig = pkcs1v15::Signature::try_from(signature)
        .map_err(|e| CryptoError::invalid_signature(format!("bad RSA signature bytes: {e}")))?;

    let result = match algorithm {
        SignatureAlgorithm::RsaSha1 => pkcs1v15::VerifyingKey::<Sha1>::new(key).verify(message, &sig),
        SignatureAlgorithm::RsaSha256 => {
            pkcs1v15::VerifyingKey::<Sha256>::new(key).verify(message, &sig)
        },
        SignatureAlgorithm::RsaSha384 => {
            pkcs1v15::VerifyingKey::<Sha384>::new(key).verify(message, &sig)
        },
        SignatureAlgorithm::RsaSha512 => {
            pkcs1v15::VerifyingKey::<Sha512>::new(key).verify(message, &sig)
        },
        other => return Err(CryptoError::unsupported_algorithm(other.uri())),
    };
    result.map_err(|_| CryptoError::VerificationFailed { algorithm })
}

fn verify_p256(spki: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    let algorithm = SignatureAlgorithm::EcdsaSha256;
    let pk = p256::PublicKey::from_public_key_der(spki).map_err(|e| {
        CryptoError::KeyAlgorithmMismatch {
            algorithm,
            key_type: format!("non-P-256 or malformed ({e})"),
        }
    })?;
    let ep = pk.to_encoded_point(false);
    let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(ep.as_bytes())
        .map_err(|e| CryptoError::invalid_public_key(format!("bad P-256 point: {e}")))?;

    let sig = p256::ecdsa::Signature::from_slice(signature)
        .or_else(|_| p256::ecdsa::Signature::from_der(signature))
        .map_err(|e| CryptoError::invalid_signature(format!("bad P-256 signature: {e}")))?;

    vk.verify(message, &sig)
        .map_err(|_| CryptoError::VerificationFailed { algorithm })
}

fn verify_p384(spki: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    let algorithm = SignatureAlgorithm::EcdsaSha384;
    let pk = p384::PublicKey::from_public_key_der(spki).map_err(|e| {
        CryptoError::KeyAlgorithmMismatch {
            algorithm,
            key_type: format!("non-P-384 or malformed ({e})"),
        }
    })?;
    let ep = pk.to_encoded_point(false);
    let vk = p384::ecdsa::VerifyingKey::from_sec1_bytes(ep.as_bytes())
        .map_err(|e| CryptoError::invalid_public_key(format!("bad P-384 point: {e}")))?;

    let sig = p384::ecdsa::Signature::from_slice(signature)
        .or_else(|_| p384::ecdsa::Signature::from_der(signature))
        .map_err(|e| CryptoError::invalid_signature(format!("bad P-384 signature: {e}")))?;

    vk.verify(message, &sig)
        .map_err(|_| CryptoError::VerificationFailed { algorithm })
}
