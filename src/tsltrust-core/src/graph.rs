//! The trust graph produced by pointer resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::document::TrustStatusList;
use crate::signature::VerificationResult;

/// Identity of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKey {
    /// A list whose bytes were obtained: keyed by content fingerprint.
    Fingerprint {
        /// Lowercase hex SHA-1.
        fingerprint: String,
    },
    /// A list that could not be obtained: keyed by what the pointer declared.
    Declared {
        /// Territory the pointer claimed.
        territory: String,
        /// TSL type the pointer claimed.
        tsl_type: String,
        /// Location the pointer named.
        location: String,
    },
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fingerprint { fingerprint } => write!(f, "sha1:{fingerprint}"),
            Self::Declared {
                territory,
                tsl_type,
                location,
            } => write!(f, "{territory}/{tsl_type} @ {location}"),
        }
    }
}

/// What is known about a node.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeState {
    /// Parsed list with its signature outcome.
    Parsed {
        /// The list.
        #[serde(skip)]
        list: Arc<TrustStatusList>,
        /// Signature outcome.
        verification: VerificationResult,
    },
    /// Bytes were fetched but are not a trust list.
    Unparsable {
        /// Why parsing failed.
        reason: String,
    },
    /// Nothing could be fetched.
    Unreachable {
        /// Why fetching failed.
        reason: String,
    },
}

/// A node of the trust graph.
#[derive(Debug, Clone, Serialize)]
pub struct TrustNode {
    /// Node identity.
    pub key: NodeKey,
    /// Where the node was obtained from (`None` for caller-supplied roots).
    pub source_uri: Option<String>,
    /// Pointer depth at which the node was first reached (0 for roots).
    pub depth: usize,
    /// Node state.
    #[serde(flatten)]
    pub state: NodeState,
}

impl TrustNode {
    /// The parsed list, if any.
    #[must_use]
    pub fn list(&self) -> Option<&Arc<TrustStatusList>> {
        match &self.state {
            NodeState::Parsed { list, .. } => Some(list),
            _ => None,
        }
    }

    /// The signature outcome, if the node was parsed.
    #[must_use]
    pub fn verification(&self) -> Option<&VerificationResult> {
        match &self.state {
            NodeState::Parsed { verification, .. } => Some(verification),
            _ => None,
        }
    }
}

/// Resolution status of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EdgeStatus {
    /// Target fetched and parsed.
    Resolved,
    /// Target could not be fetched.
    Unreachable {
        /// Why.
        reason: String,
    },
    /// Target fetched but is not a trust list.
    Unparsable {
        /// Why.
        reason: String,
    },
    /// Target parsed but its signer does not match the pointer's hints.
    TrustMismatch {
        /// Why.
        reason: String,
    },
}

impl EdgeStatus {
    /// Short label for summaries.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Unreachable { .. } => "unreachable",
            Self::Unparsable { .. } => "unparsable",
            Self::TrustMismatch { .. } => "trust_mismatch",
        }
    }
}

/// A pointer from one list to another.
#[derive(Debug, Clone, Serialize)]
pub struct TrustEdge {
    /// The list holding the pointer.
    pub from: NodeKey,
    /// The pointer's `TSLLocation`.
    pub uri: String,
    /// Target node, once known.
    pub to: Option<NodeKey>,
    /// Resolution status.
    #[serde(flatten)]
    pub status: EdgeStatus,
}

/// Counts describing a resolved graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    /// Number of nodes.
    pub nodes: usize,
    /// Number of parsed nodes whose signature verified.
    pub verified_nodes: usize,
    /// Number of edges.
    pub edges: usize,
    /// Edge count per status label.
    pub edge_status: BTreeMap<&'static str, usize>,
}

/// Trust lists and the pointers between them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrustGraph {
    nodes: BTreeMap<NodeKey, TrustNode>,
    edges: Vec<TrustEdge>,
    roots: Vec<NodeKey>,
}

impl TrustGraph {
    /// Empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node unless one with the same key exists.
    ///
    /// Returns `true` when the node was inserted.
    pub fn insert_node(&mut self, node: TrustNode) -> bool {
        if self.nodes.contains_key(&node.key) {
            return false;
        }
        self.nodes.insert(node.key.clone(), node);
        true
    }

    pub(crate) fn add_root(&mut self, key: NodeKey) {
        if !self.roots.contains(&key) {
            self.roots.push(key);
        }
    }

    pub(crate) fn push_edge(&mut self, edge: TrustEdge) {
        self.edges.push(edge);
    }

    pub(crate) fn edges_mut(&mut self) -> &mut [TrustEdge] {
        &mut self.edges
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, key: &NodeKey) -> Option<&TrustNode> {
        self.nodes.get(key)
    }

    /// Look up a node by content fingerprint.
    #[must_use]
    pub fn node_by_fingerprint(&self, fingerprint: &str) -> Option<&TrustNode> {
        self.nodes.get(&NodeKey::Fingerprint {
            fingerprint: fingerprint.to_string(),
        })
    }

    /// All nodes, ordered by key.
    pub fn nodes(&self) -> impl Iterator<Item = &TrustNode> {
        self.nodes.values()
    }

    /// All edges, in discovery order.
    #[must_use]
    pub fn edges(&self) -> &[TrustEdge] {
        &self.edges
    }

    /// Keys of the root nodes.
    #[must_use]
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// Edges leaving `key`.
    pub fn outgoing<'a>(&'a self, key: &'a NodeKey) -> impl Iterator<Item = &'a TrustEdge> + 'a {
        self.edges.iter().filter(move |e| &e.from == key)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node and edge counts.
    #[must_use]
    pub fn summary(&self) -> ResolutionSummary {
        let mut edge_status = BTreeMap::new();
        for edge in &self.edges {
            *edge_status.entry(edge.status.label()).or_insert(0) += 1;
        }
        ResolutionSummary {
            nodes: self.nodes.len(),
            verified_nodes: self
                .nodes
                .values()
                .filter(|n| n.verification().is_some_and(VerificationResult::is_verified))
                .count(),
            edges: self.edges.len(),
            edge_status,
        }
    }
}
