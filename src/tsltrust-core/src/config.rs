//! Configuration for fetching, resolution and freshness checks.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::TrustError;
use crate::locale::Language;

/// Configuration for the trust list engine.
#[derive(Debug, Clone)]
pub struct TrustConfig {
    /// Timeout applied to each pointer fetch.
    pub fetch_timeout: Duration,
    /// Maximum number of fetches in flight at once.
    pub max_concurrent_fetches: usize,
    /// Maximum pointer depth below a root list.
    pub max_depth: usize,
    /// Language used for localized accessors when the caller gives none.
    pub preferred_language: String,
    /// How long past `NextUpdate` a list is still considered fresh.
    pub stale_grace: Duration,
    /// User agent sent by the HTTPS fetcher.
    pub user_agent: String,
    /// Fixed time for certificate validity checks (defaults to now).
    pub verification_time: Option<DateTime<Utc>>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            max_concurrent_fetches: 8,
            max_depth: 8,
            preferred_language: "en".into(),
            stale_grace: Duration::ZERO,
            user_agent: concat!("tsltrust/", env!("CARGO_PKG_VERSION")).into(),
            verification_time: None,
        }
    }
}

impl TrustConfig {
    /// Check the configuration for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ConfigError`] for a zero timeout or fan-out, and
    /// [`TrustError::InvalidLocale`] for a bad preferred language.
    pub fn validate(&self) -> Result<(), TrustError> {
        if self.fetch_timeout.is_zero() {
            return Err(TrustError::config("fetch_timeout must be non-zero"));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(TrustError::config("max_concurrent_fetches must be at least 1"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(TrustError::config("user_agent must not be empty"));
        }
        self.language()?;
        Ok(())
    }

    /// The preferred language as a validated tag.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidLocale`] if the tag is malformed.
    pub fn language(&self) -> Result<Language, TrustError> {
        Language::parse(&self.preferred_language)
    }
}
