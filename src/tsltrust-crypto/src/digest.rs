//! Digest computation and content fingerprints.

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::types::DigestAlgorithm;

/// Compute the digest of `data` with the given algorithm.
#[must_use]
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        DigestAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
        DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// Lowercase hex SHA-1 of the exact bytes given.
///
/// This is the content fingerprint of a trust list: it is taken over the
/// raw, undecoded document so byte-identical inputs always share it.
#[must_use]
pub fn sha1_fingerprint(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Lowercase hex SHA-256 of the given bytes.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
