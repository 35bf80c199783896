//! Error types for trust list operations.
//!
//! Most problems a trust list can have are data, not errors: absent fields,
//! failed signatures, unreachable pointers and version anomalies are all
//! reported through the returned structures. `TrustError` covers what aborts
//! a call outright.

use thiserror::Error;

/// Errors that abort a trust list operation.
#[derive(Debug, Error)]
pub enum TrustError {
    /// The bytes are not a trust status list.
    #[error("Parse error: {reason}")]
    Parse {
        /// Reason parsing failed.
        reason: String,
    },

    /// A locale tag that cannot be used for lookups.
    #[error("Invalid locale tag: {tag:?}")]
    InvalidLocale {
        /// The rejected tag.
        tag: String,
    },

    /// Resolution was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message.
        message: String,
    },

    /// A list was replaced by one that is not newer.
    #[error(
        "Version anomaly for {territory}/{tsl_type}: sequence {current:?} after {previous:?} with different content"
    )]
    VersionAnomaly {
        /// Scheme territory of the list.
        territory: String,
        /// TSL type of the list.
        tsl_type: String,
        /// Sequence number of the accepted instance.
        previous: Option<u64>,
        /// Sequence number of the offending instance.
        current: Option<u64>,
    },

    /// I/O error reading local input.
    #[error("I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
    },

    /// Cryptographic error.
    #[error("Crypto error: {0}")]
    CryptoError(#[from] tsltrust_crypto::CryptoError),
}

impl TrustError {
    /// Create a parse error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Check if this error came from cancellation.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error is caller misuse rather than bad input data.
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::InvalidLocale { .. } | Self::ConfigError { .. })
    }
}

impl From<std::io::Error> for TrustError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}
