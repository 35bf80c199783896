//! Cryptographic error types.

use thiserror::Error;

use crate::types::SignatureAlgorithm;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid signature format or length.
    #[error("Invalid signature: {reason}")]
    InvalidSignature {
        /// Reason the signature is invalid.
        reason: String,
    },

    /// Signature verification failed.
    #[error("Signature verification failed: {algorithm:?}")]
    VerificationFailed {
        /// The algorithm that was used.
        algorithm: SignatureAlgorithm,
    },

    /// Invalid public key format or length.
    #[error("Invalid public key: {reason}")]
    InvalidPublicKey {
        /// Reason the key is invalid.
        reason: String,
    },

    /// Certificate could not be decoded.
    #[error("Invalid certificate: {reason}")]
    InvalidCertificate {
        /// Reason the certificate is invalid.
        reason: String,
    },

    /// A certificate was not signed by the presented issuer.
    #[error("Certificate chain broken: {reason}")]
    ChainBroken {
        /// Reason the link failed.
        reason: String,
    },

    /// Algorithm not supported.
    #[error("Algorithm not supported: {algorithm}")]
    UnsupportedAlgorithm {
        /// The unsupported algorithm identifier.
        algorithm: String,
    },

    /// Public key type does not fit the signature algorithm.
    #[error("Key mismatch: {algorithm:?} cannot use a {key_type} key")]
    KeyAlgorithmMismatch {
        /// The requested algorithm.
        algorithm: SignatureAlgorithm,
        /// Description of the key that was supplied.
        key_type: String,
    },
}

impl CryptoError {
    /// Create an invalid signature error.
    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            reason: reason.into(),
        }
    }

    /// Create an invalid public key error.
    pub fn invalid_public_key(reason: impl Into<String>) -> Self {
        Self::InvalidPublicKey {
            reason: reason.into(),
        }
    }

    /// Create an invalid certificate error.
    pub fn invalid_certificate(reason: impl Into<String>) -> Self {
        Self::InvalidCertificate {
            reason: reason.into(),
        }
    }

    /// Create an unsupported algorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }
}
