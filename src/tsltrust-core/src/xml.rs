//! Shared XML access helpers.
//!
//! Every optional field of a trust list is read through these functions, so
//! "absent" has one meaning throughout: a missing element, an empty element
//! and an unparseable value all come back as `None` or an empty collection.
//! Elements are matched by local name; trust lists in the wild mix prefixes
//! and occasionally namespaces for the same element.

use chrono::{DateTime, NaiveDateTime, Utc};
use roxmltree::{Document, Node, ParsingOptions};

use crate::error::TrustError;
use crate::locale::LocalizedString;

/// XML digital signature namespace.
pub const NS_DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
/// The `xml:` prefix namespace.
pub const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decode raw bytes to text, tolerating a UTF-8 byte-order mark.
///
/// # Errors
///
/// Returns [`TrustError::Parse`] for non-UTF-8 input.
pub fn decode(bytes: &[u8]) -> Result<&str, TrustError> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    std::str::from_utf8(body).map_err(|e| TrustError::parse(format!("input is not UTF-8: {e}")))
}

/// Parse text into a document. DTDs are rejected.
///
/// # Errors
///
/// Returns [`TrustError::Parse`] if the text is not well-formed XML.
pub fn parse_document(text: &str) -> Result<Document<'_>, TrustError> {
    let options = ParsingOptions {
        allow_dtd: false,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options)
        .map_err(|e| TrustError::parse(format!("malformed XML: {e}")))
}

/// First element child with the given local name.
pub fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

/// All element children with the given local name, in document order.
pub fn children<'a, 'i: 'a>(
    node: Node<'a, 'i>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

/// Follow a path of local names from `node`, taking the first match at each step.
pub fn path<'a, 'i>(node: Node<'a, 'i>, names: &[&str]) -> Option<Node<'a, 'i>> {
    names.iter().try_fold(node, |n, name| child(n, name))
}

/// Trimmed text content of an element, including text nested in children.
#[must_use]
pub fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Text of the named child, `None` when missing or blank.
#[must_use]
pub fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name)
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// Text at the end of a path, `None` when missing or blank.
#[must_use]
pub fn path_text(node: Node<'_, '_>, names: &[&str]) -> Option<String> {
    path(node, names)
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// The `xml:lang` of an element, empty when not set.
#[must_use]
pub fn lang_of(node: Node<'_, '_>) -> String {
    node.attribute((NS_XML, "lang"))
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Collect `container/item` entries as language-tagged strings.
///
/// With `container = None` the items are read directly under `node`.
#[must_use]
pub fn localized(node: Node<'_, '_>, container: Option<&str>, item: &str) -> Vec<LocalizedString> {
    let parent = match container {
        Some(name) => match child(node, name) {
            Some(p) => p,
            None => return Vec::new(),
        },
        None => node,
    };
    children(parent, item)
        .map(|n| LocalizedString::new(lang_of(n), text_of(n)))
        .filter(|s| !s.value.is_empty())
        .collect()
}

/// Collect the non-blank `URI` children of `node/container`.
#[must_use]
pub fn uri_list(node: Node<'_, '_>, container: &str) -> Vec<String> {
    match child(node, container) {
        Some(parent) => children(parent, "URI")
            .map(text_of)
            .filter(|t| !t.is_empty())
            .collect(),
        None => Vec::new(),
    }
}

/// Parse an `xsd:dateTime`. Values without a zone are taken as UTC.
#[must_use]
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse a non-negative integer.
#[must_use]
pub fn parse_u64(text: &str) -> Option<u64> {
    text.trim().parse().ok()
}
