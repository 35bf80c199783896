//! XML canonicalization (C14N 1.0/1.1 and Exclusive C14N).
//!
//! Works on a parsed [`roxmltree::Document`]. The parser has already done
//! the input-side normalization canonical XML asks for: line endings are
//! `\n`, attribute values are normalized, entity and character references
//! are expanded and CDATA sections are plain text.
//!
//! Namespace declarations are decided per output element by comparing what
//! the element needs against what its nearest output ancestor rendered. In
//! inclusive mode an element needs every binding in scope; in exclusive
//! mode only the prefixes it visibly uses plus the `PrefixList` ones.
//!
//! Prefixes are not kept by the parser, so they are read back from the
//! source text through node and attribute ranges.

use std::collections::{BTreeMap, BTreeSet};

use roxmltree::{Node, NodeId, NodeType};

use crate::xml::NS_XML;

/// Canonicalization algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Canonical XML 1.0.
    C14n10,
    /// Canonical XML 1.1.
    C14n11,
    /// Exclusive XML Canonicalization 1.0.
    Exclusive,
}

/// A canonicalization method as named by a `CanonicalizationMethod` or
/// `Transform` algorithm URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct C14nMethod {
    /// Algorithm family.
    pub algorithm: Algorithm,
    /// Whether comments are kept.
    pub with_comments: bool,
}

impl C14nMethod {
    /// Canonical XML 1.0 without comments, the default for references.
    pub const DEFAULT: Self = Self {
        algorithm: Algorithm::C14n10,
        with_comments: false,
    };

    /// Resolve an algorithm URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (algorithm, with_comments) = match uri.trim() {
            "http://www.w3.org/TR/2001/REC-xml-c14n-20010315" => (Algorithm::C14n10, false),
            "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments" => {
                (Algorithm::C14n10, true)
            },
            "http://www.w3.org/2006/12/xml-c14n11" => (Algorithm::C14n11, false),
            "http://www.w3.org/2006/12/xml-c14n11#WithComments" => (Algorithm::C14n11, true),
            "http://www.w3.org/2001/10/xml-exc-c14n#" => (Algorithm::Exclusive, false),
            "http://www.w3.org/2001/10/xml-exc-c14n#WithComments" => (Algorithm::Exclusive, true),
            _ => return None,
        };
        Some(Self {
            algorithm,
            with_comments,
        })
    }

    /// The algorithm URI.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match (self.algorithm, self.with_comments) {
            (Algorithm::C14n10, false) => "http://www.w3.org/TR/2001/REC-xml-c14n-20010315",
            (Algorithm::C14n10, true) => {
                "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments"
            },
            (Algorithm::C14n11, false) => "http://www.w3.org/2006/12/xml-c14n11",
            (Algorithm::C14n11, true) => "http://www.w3.org/2006/12/xml-c14n11#WithComments",
            (Algorithm::Exclusive, false) => "http://www.w3.org/2001/10/xml-exc-c14n#",
            (Algorithm::Exclusive, true) => "http://www.w3.org/2001/10/xml-exc-c14n#WithComments",
        }
    }
}

/// Namespace bindings rendered by the nearest output ancestor, keyed by
/// prefix (`""` for the default namespace).
type Rendered = BTreeMap<String, String>;

/// Serializes a node subtree in canonical form.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    method: C14nMethod,
    inclusive_prefixes: BTreeSet<String>,
    exclude: Option<NodeId>,
}

impl Canonicalizer {
    /// Create a canonicalizer for `method`.
    #[must_use]
    pub fn new(method: C14nMethod) -> Self {
        Self {
            method,
            inclusive_prefixes: BTreeSet::new(),
            exclude: None,
        }
    }

    /// Set the exclusive-mode `InclusiveNamespaces PrefixList`.
    ///
    /// `#default` stands for the default namespace. Ignored by the inclusive
    /// algorithms.
    #[must_use]
    pub fn with_inclusive_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inclusive_prefixes = prefixes
            .into_iter()
            .map(|p| match p.as_ref() {
                "#default" => String::new(),
                other => other.to_string(),
            })
            .collect();
        self
    }

    /// Leave the subtree rooted at `node` out of the output.
    #[must_use]
    pub fn excluding(mut self, node: NodeId) -> Self {
        self.exclude = Some(node);
        self
    }

    /// Canonicalize the document (when given the root) or an element subtree.
    #[must_use]
    pub fn canonicalize(&self, apex: Node<'_, '_>) -> String {
        let mut out = String::new();
        if apex.is_root() {
            let mut after_root_element = false;
            for child in apex.children() {
                match child.node_type() {
                    NodeType::Element => {
                        self.element(child, &Rendered::new(), true, &mut out);
                        after_root_element = true;
                    },
                    NodeType::Comment | NodeType::PI => {
                        let mut piece = String::new();
                        self.leaf(child, &mut piece);
                        if piece.is_empty() {
                            continue;
                        }
                        if after_root_element {
                            out.push('\n');
                            out.push_str(&piece);
                        } else {
                            out.push_str(&piece);
                            out.push('\n');
                        }
                    },
                    _ => {},
                }
            }
        } else if apex.is_element() {
            self.element(apex, &Rendered::new(), true, &mut out);
        }
        out
    }

    fn is_excluded(&self, node: Node<'_, '_>) -> bool {
        self.exclude == Some(node.id())
    }

    fn leaf(&self, node: Node<'_, '_>, out: &mut String) {
        match node.node_type() {
            NodeType::Comment if self.method.with_comments => {
                out.push_str("<!--");
                out.push_str(node.text().unwrap_or_default());
                out.push_str("-->");
            },
            NodeType::PI => {
                if let Some(pi) = node.pi() {
                    out.push_str("<?");
                    out.push_str(pi.target);
                    if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
                        out.push(' ');
                        out.push_str(value);
                    }
                    out.push_str("?>");
                }
            },
            NodeType::Text => escape_text(node.text().unwrap_or_default(), out),
            _ => {},
        }
    }

    fn element(&self, node: Node<'_, '_>, rendered: &Rendered, is_apex: bool, out: &mut String) {
        if self.is_excluded(node) {
            return;
        }

        let qname = element_qname(node);
        let attrs = self.attributes(node, is_apex);

        // Bindings this element needs: prefix -> URI, "" URI meaning "no default".
        let in_scope: BTreeMap<&str, &str> = node
            .namespaces()
            .map(|ns| (ns.name().unwrap_or(""), ns.uri()))
            .collect();
        let needed: BTreeSet<&str> = match self.method.algorithm {
            Algorithm::Exclusive => {
                let mut used = BTreeSet::new();
                used.insert(prefix_of(qname));
                for a in &attrs {
                    if !a.prefix.is_empty() && a.prefix != "xml" {
                        used.insert(a.prefix.as_str());
                    }
                }
                for p in &self.inclusive_prefixes {
                    if p.is_empty() || in_scope.contains_key(p.as_str()) {
                        used.insert(p.as_str());
                    }
                }
                used
            },
            Algorithm::C14n10 | Algorithm::C14n11 => {
                let mut all: BTreeSet<&str> = in_scope.keys().copied().collect();
                all.insert("");
                all
            },
        };

        let mut decls: BTreeMap<&str, &str> = BTreeMap::new();
        for prefix in needed {
            let uri = in_scope.get(prefix).copied().unwrap_or("");
            let previous = rendered.get(prefix).map(String::as_str).unwrap_or("");
            // An empty URI only ever undeclares the default namespace.
            if uri != previous && (prefix.is_empty() || !uri.is_empty()) {
                decls.insert(prefix, uri);
            }
        }

        out.push('<');
        out.push_str(qname);
        for (prefix, uri) in &decls {
            if prefix.is_empty() {
                out.push_str(" xmlns=\"");
            } else {
                out.push_str(" xmlns:");
                out.push_str(prefix);
                out.push_str("=\"");
            }
            escape_attr(uri, out);
            out.push('"');
        }
        for a in &attrs {
            out.push(' ');
            if !a.prefix.is_empty() {
                out.push_str(&a.prefix);
                out.push(':');
            }
            out.push_str(&a.local);
            out.push_str("=\"");
            escape_attr(&a.value, out);
            out.push('"');
        }
        out.push('>');

        let mut inner = rendered.clone();
        for (prefix, uri) in decls {
            inner.insert(prefix.to_string(), uri.to_string());
        }

        for child in node.children() {
            match child.node_type() {
                NodeType::Element => self.element(child, &inner, false, out),
                _ => self.leaf(child, out),
            }
        }

        out.push_str("</");
        out.push_str(qname);
        out.push('>');
    }

    fn attributes(&self, node: Node<'_, '_>, is_apex: bool) -> Vec<Attr> {
        let input = node.document().input_text();
        let mut attrs: Vec<Attr> = node
            .attributes()
            .map(|a| {
                let prefix = input
                    .get(a.range_qname())
                    .and_then(|q| q.split_once(':'))
                    .map(|(p, _)| p.to_string())
                    .unwrap_or_default();
                Attr {
                    namespace: a.namespace().unwrap_or("").to_string(),
                    prefix,
                    local: a.name().to_string(),
                    value: a.value().to_string(),
                }
            })
            .collect();

        // A document subset inherits xml:* attributes from omitted ancestors.
        if is_apex && self.method.algorithm != Algorithm::Exclusive {
            for ancestor in node.ancestors().skip(1).filter(|n| n.is_element()) {
                for a in ancestor.attributes() {
                    if a.namespace() != Some(NS_XML) {
                        continue;
                    }
                    let inheritable = match self.method.algorithm {
                        Algorithm::C14n11 => matches!(a.name(), "lang" | "space"),
                        _ => true,
                    };
                    let present = attrs
                        .iter()
                        .any(|x| x.namespace == NS_XML && x.local == a.name());
                    if inheritable && !present {
                        attrs.push(Attr {
                            namespace: NS_XML.to_string(),
                            prefix: "xml".to_string(),
                            local: a.name().to_string(),
                            value: a.value().to_string(),
                        });
                    }
                }
            }
        }

        attrs.sort_by(|x, y| (&x.namespace, &x.local).cmp(&(&y.namespace, &y.local)));
        attrs
    }
}

struct Attr {
    namespace: String,
    prefix: String,
    local: String,
    value: String,
}

/// Qualified name of an element as written in the source.
fn element_qname<'i>(node: Node<'_, 'i>) -> &'i str {
    let input = node.document().input_text();
    input
        .get(node.range().start + 1..)
        .map(|rest| {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
                .unwrap_or(rest.len());
            &rest[..end]
        })
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| node.tag_name().name())
}

fn prefix_of(qname: &str) -> &str {
    qname.split_once(':').map_or("", |(p, _)| p)
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
