//! Language-tagged values and locale fallback.
//!
//! Lookups try the requested language, then English, then give up with an
//! empty value. The same rule selects names, legal notices and postal
//! addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TrustError;

/// A validated language tag such as `en`, `sv` or `en-GB`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language {
    tag: String,
    primary_len: usize,
}

impl Language {
    /// Parse a language tag.
    ///
    /// The primary subtag must be 2-8 ASCII letters; further subtags,
    /// separated by `-` or `_`, must be 1-8 ASCII alphanumerics.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidLocale`] for anything else.
    pub fn parse(tag: &str) -> Result<Self, TrustError> {
        let invalid = || TrustError::InvalidLocale {
            tag: tag.to_string(),
        };

        let normalized = tag.trim().replace('_', "-").to_ascii_lowercase();
        let mut parts = normalized.split('-');

        let primary = parts.next().ok_or_else(invalid)?;
        if !(2..=8).contains(&primary.len()) || !primary.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(invalid());
        }
        for sub in parts {
            if !(1..=8).contains(&sub.len()) || !sub.bytes().all(|b| b.is_ascii_alphanumeric()) {
                return Err(invalid());
            }
        }

        Ok(Self {
            primary_len: primary.len(),
            tag: normalized,
        })
    }

    /// English, the fallback language.
    #[must_use]
    pub fn english() -> Self {
        Self {
            tag: "en".into(),
            primary_len: 2,
        }
    }

    /// The full normalized tag (lowercase, `-` separated).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.tag
    }

    /// The primary language subtag.
    #[must_use]
    pub fn primary(&self) -> &str {
        &self.tag[..self.primary_len]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

impl std::str::FromStr for Language {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Something carrying an `xml:lang` tag.
pub trait Localized {
    /// The raw tag as found in the document (may be empty).
    fn lang(&self) -> &str;
}

/// A string value with its language tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedString {
    /// Tag from `xml:lang`, empty when the document gave none.
    pub lang: String,
    /// The text content.
    pub value: String,
}

impl LocalizedString {
    /// Create a tagged value.
    pub fn new(lang: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            value: value.into(),
        }
    }
}

impl Localized for LocalizedString {
    fn lang(&self) -> &str {
        &self.lang
    }
}

fn primary_of(tag: &str) -> &str {
    tag.split(|c: char| c == '-' || c == '_').next().unwrap_or_default().trim()
}

/// Select the entry for `lang`, falling back to English.
///
/// An exact tag match beats a primary-subtag match; among equals the first
/// entry in document order wins. Returns `None` when neither the requested
/// language nor English is present.
pub fn select<'a, T: Localized>(entries: &'a [T], lang: &Language) -> Option<&'a T> {
    let exact = |e: &&T| e.lang().trim().replace('_', "-").eq_ignore_ascii_case(lang.as_str());
    let same_primary = |e: &&T| primary_of(e.lang()).eq_ignore_ascii_case(lang.primary());
    let english = |e: &&T| primary_of(e.lang()).eq_ignore_ascii_case("en");

    entries
        .iter()
        .find(exact)
        .or_else(|| entries.iter().find(same_primary))
        .or_else(|| entries.iter().find(english))
}

/// Resolve a localized string, or the empty string when nothing fits.
#[must_use]
pub fn resolve(entries: &[LocalizedString], lang: &Language) -> String {
    select(entries, lang)
        .map(|e| e.value.clone())
        .unwrap_or_default()
}
