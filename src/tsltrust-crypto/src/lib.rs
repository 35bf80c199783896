//! # tsltrust-crypto
//!
//! Cryptographic primitives for verifying signed trust status lists.
//!
//! The XML layer (canonicalization, reference resolution) lives in
//! `tsltrust-core`; this crate only sees bytes:
//!
//! - **Digests**: SHA-1/256/384/512 for `DigestValue` checks, plus the
//!   SHA-1 content fingerprint that identifies a document.
//! - **Signatures**: RSASSA-PKCS1-v1_5 and ECDSA (P-256, P-384) over the
//!   canonical `SignedInfo`.
//! - **Certificates**: subject, issuer, validity and key identifier of
//!   embedded signer certificates, and issuer-link checks between them.
//!
//! Algorithms are identified by the URIs that appear in the document:
//!
//! ```rust
//! use tsltrust_crypto::{DigestAlgorithm, SignatureAlgorithm};
//!
//! let alg = SignatureAlgorithm::from_uri("http://www.w3.org/2001/04/xmldsig-more#rsa-sha256");
//! assert_eq!(alg.map(|a| a.digest()), Some(DigestAlgorithm::Sha256));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod certificate;
mod error;
mod types;
mod verify;

pub mod digest;

pub use certificate::{KeyType, SignerCertificate};
pub use digest::{sha1_fingerprint, sha256_hex};
pub use error::CryptoError;
pub use types::{DigestAlgorithm, SignatureAlgorithm};
pub use verify::verify_signature;

/// Constant-time byte comparison.
///
/// Used for every `DigestValue` comparison. The length check returns early;
/// digest lengths are fixed by the algorithm and not secret.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;

    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
