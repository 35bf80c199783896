//! Fetching trust lists by URI.
//!
//! The resolver only sees the [`TslFetcher`] trait. [`HttpsFetcher`] is the
//! network implementation used by the command line tool; tests and embedders
//! supply their own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors a fetcher can report for one URI.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// No response within the allotted time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success status.
    #[error("HTTP status {status}")]
    Status {
        /// Status code.
        status: u16,
    },

    /// Connection or protocol failure.
    #[error("Transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// The URI cannot be fetched by this fetcher.
    #[error("Unsupported URI: {uri}")]
    UnsupportedUri {
        /// The URI.
        uri: String,
    },
}

/// Source of raw trust list bytes.
#[async_trait]
pub trait TslFetcher: Send + Sync {
    /// Fetch the bytes published at `uri`, giving up after `timeout`.
    async fn fetch(&self, uri: &str, timeout: Duration) -> Result<Vec<u8>, FetchError>;
}

/// HTTP(S) fetcher backed by `reqwest`.
pub struct HttpsFetcher {
    client: Client,
}

impl HttpsFetcher {
    /// Create a fetcher with the given user agent.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the TLS backend cannot start.
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Transport {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TslFetcher for HttpsFetcher {
    #[instrument(skip(self), fields(uri = %uri))]
    async fn fetch(&self, uri: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let lower = uri.to_ascii_lowercase();
        if !(lower.starts_with("https://") || lower.starts_with("http://")) {
            return Err(FetchError::UnsupportedUri { uri: uri.into() });
        }

        let response = self
            .client
            .get(uri)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;
        debug!(bytes = body.len(), "Fetched trust list");
        Ok(body.to_vec())
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Transport {
            message: format!("Request failed: {e}"),
        }
    }
}
