//! Pointer chain resolution.
//!
//! Starting from root lists, every `OtherTSLPointer` is fetched, parsed and
//! verified, and the result is recorded as a node plus an edge in a
//! [`TrustGraph`]. A failed pointer only marks its own edge; resolution of
//! everything else continues.
//!
//! ```text
//!  roots ─► queue ─► claim URI ─► fetch (timeout) ─► parse ─► verify
//!              ▲         │                                      │
//!              │         └─ already claimed: deferred edge      ▼
//!              └──────────── child pointers ◄── insert node (first wins)
//! ```
//!
//! Fetches run on a [`JoinSet`] bounded by
//! [`TrustConfig::max_concurrent_fetches`]. The URI claims and the graph
//! share one mutex that is never held across an `.await`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use tsltrust_crypto::sha1_fingerprint;

use crate::config::TrustConfig;
use crate::document::TrustStatusList;
use crate::error::TrustError;
use crate::fetch::{FetchError, TslFetcher};
use crate::graph::{EdgeStatus, NodeKey, NodeState, TrustEdge, TrustGraph, TrustNode};
use crate::pointer::{HintCheck, OtherTslPointer};
use crate::signature::SignatureVerifier;

/// A URI waiting to be fetched.
#[derive(Debug, Clone)]
struct Job {
    /// Node holding the pointer; `None` for root URIs.
    from: Option<NodeKey>,
    pointer: Option<OtherTslPointer>,
    uri: String,
    depth: usize,
}

/// An edge whose target URI was claimed by another job.
struct Deferred {
    edge: usize,
    pointer: Option<OtherTslPointer>,
}

#[derive(Default)]
struct State {
    graph: TrustGraph,
    /// Normalized URIs already handed to a fetch.
    claimed: HashSet<String>,
    /// Normalized URI to the node it produced.
    uri_index: HashMap<String, NodeKey>,
    deferred: Vec<Deferred>,
}

/// Resolves pointer chains into a [`TrustGraph`].
pub struct PointerResolver {
    fetcher: Arc<dyn TslFetcher>,
    config: TrustConfig,
    verifier: SignatureVerifier,
}

impl PointerResolver {
    /// Create a resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(fetcher: Arc<dyn TslFetcher>, config: TrustConfig) -> Result<Self, TrustError> {
        config.validate()?;
        let verifier = config
            .verification_time
            .map_or_else(SignatureVerifier::new, SignatureVerifier::at);
        Ok(Self {
            fetcher,
            config,
            verifier,
        })
    }

    /// Resolve the pointer chains below already-parsed root lists.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Cancelled`] if `cancel` fires before resolution
    /// completes. Individual fetch and parse failures are recorded in the
    /// graph instead.
    #[instrument(skip_all, fields(roots = roots.len()))]
    pub async fn resolve(
        &self,
        roots: Vec<TrustStatusList>,
        cancel: &CancellationToken,
    ) -> Result<TrustGraph, TrustError> {
        let mut state = State::default();
        let mut queue = VecDeque::new();

        for list in roots {
            list.verify_signature_with(&self.verifier);
            let key = NodeKey::Fingerprint {
                fingerprint: list.fingerprint().to_string(),
            };
            state.graph.add_root(key.clone());
            let list = Arc::new(list);
            if insert_parsed(&mut state.graph, key.clone(), list.clone(), None, 0) {
                queue.extend(child_jobs(&mut state.graph, &key, &list, 1));
            }
        }

        self.run(state, queue, cancel).await
    }

    /// Fetch root lists by URI, then resolve their pointer chains.
    ///
    /// # Errors
    ///
    /// Same as [`PointerResolver::resolve`].
    #[instrument(skip_all, fields(roots = uris.len()))]
    pub async fn resolve_uris(
        &self,
        uris: &[String],
        cancel: &CancellationToken,
    ) -> Result<TrustGraph, TrustError> {
        let queue = uris
            .iter()
            .map(|uri| Job {
                from: None,
                pointer: None,
                uri: uri.clone(),
                depth: 0,
            })
            .collect();
        self.run(State::default(), queue, cancel).await
    }

    async fn run(
        &self,
        state: State,
        mut queue: VecDeque<Job>,
        cancel: &CancellationToken,
    ) -> Result<TrustGraph, TrustError> {
        let shared = Arc::new(Mutex::new(state));
        let mut tasks: JoinSet<Vec<Job>> = JoinSet::new();

        loop {
            while tasks.len() < self.config.max_concurrent_fetches {
                let Some(job) = queue.pop_front() else { break };
                if cancel.is_cancelled() {
                    tasks.abort_all();
                    return Err(TrustError::Cancelled);
                }
                self.dispatch(&shared, &mut tasks, job);
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    info!("Resolution cancelled");
                    return Err(TrustError::Cancelled);
                },
                joined = tasks.join_next() => match joined {
                    Some(Ok(children)) => queue.extend(children),
                    Some(Err(e)) => warn!(error = %e, "Fetch task failed"),
                    None => {},
                },
            }
        }

        let mut state = lock(&shared);
        link_deferred(&mut state);
        let graph = std::mem::take(&mut state.graph);

        let summary = graph.summary();
        info!(
            nodes = summary.nodes,
            verified = summary.verified_nodes,
            edges = summary.edges,
            status = ?summary.edge_status,
            "Pointer resolution complete"
        );
        Ok(graph)
    }

    /// Claim the job's URI and spawn its fetch, or record a deferred edge.
    fn dispatch(&self, shared: &Arc<Mutex<State>>, tasks: &mut JoinSet<Vec<Job>>, job: Job) {
        let normalized = normalize_uri(&job.uri);
        {
            let mut state = lock(shared);

            if job.depth > self.config.max_depth {
                if let Some(from) = job.from {
                    debug!(uri = %job.uri, depth = job.depth, "Pointer beyond max depth");
                    state.graph.push_edge(TrustEdge {
                        from,
                        uri: job.uri,
                        to: None,
                        status: EdgeStatus::Unreachable {
                            reason: format!(
                                "pointer depth {} exceeds max_depth {}",
                                job.depth, self.config.max_depth
                            ),
                        },
                    });
                }
                return;
            }

            if !state.claimed.insert(normalized.clone()) {
                debug!(uri = %job.uri, "URI already claimed");
                if let Some(from) = job.from {
                    let edge = state.graph.edges().len();
                    state.graph.push_edge(TrustEdge {
                        from,
                        uri: job.uri,
                        to: None,
                        status: EdgeStatus::Unreachable {
                            reason: "target not resolved".into(),
                        },
                    });
                    state.deferred.push(Deferred {
                        edge,
                        pointer: job.pointer,
                    });
                }
                return;
            }
        }

        let fetcher = Arc::clone(&self.fetcher);
        let verifier = self.verifier.clone();
        let timeout = self.config.fetch_timeout;
        let shared = Arc::clone(shared);
        tasks.spawn(async move {
            let fetched = fetch_with_timeout(fetcher.as_ref(), &job.uri, timeout).await;
            record(&shared, &verifier, job, normalized, fetched)
        });
    }
}

async fn fetch_with_timeout(
    fetcher: &dyn TslFetcher,
    uri: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    match tokio::time::timeout(timeout, fetcher.fetch(uri, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

/// Parse and verify a fetch outcome, then record it. Returns child jobs.
fn record(
    shared: &Mutex<State>,
    verifier: &SignatureVerifier,
    job: Job,
    normalized: String,
    fetched: Result<Vec<u8>, FetchError>,
) -> Vec<Job> {
    let parsed = fetched.map(|bytes| {
        let outcome = TrustStatusList::parse(&bytes);
        if let Ok(list) = &outcome {
            list.verify_signature_with(verifier);
        }
        (bytes, outcome)
    });

    let mut state = lock(shared);
    let (key, status, children) = match parsed {
        Err(e) => {
            warn!(uri = %job.uri, error = %e, "Pointer target unreachable");
            let key = declared_key(&job);
            let reason = e.to_string();
            state.graph.insert_node(TrustNode {
                key: key.clone(),
                source_uri: Some(job.uri.clone()),
                depth: job.depth,
                state: NodeState::Unreachable {
                    reason: reason.clone(),
                },
            });
            (key, EdgeStatus::Unreachable { reason }, Vec::new())
        },
        Ok((bytes, Err(e))) => {
            warn!(uri = %job.uri, error = %e, "Pointer target unparsable");
            let key = NodeKey::Fingerprint {
                fingerprint: sha1_fingerprint(&bytes),
            };
            let reason = e.to_string();
            state.graph.insert_node(TrustNode {
                key: key.clone(),
                source_uri: Some(job.uri.clone()),
                depth: job.depth,
                state: NodeState::Unparsable {
                    reason: reason.clone(),
                },
            });
            (key, EdgeStatus::Unparsable { reason }, Vec::new())
        },
        Ok((_, Ok(list))) => {
            let key = NodeKey::Fingerprint {
                fingerprint: list.fingerprint().to_string(),
            };
            let list = Arc::new(list);
            let inserted = insert_parsed(
                &mut state.graph,
                key.clone(),
                list.clone(),
                Some(job.uri.clone()),
                job.depth,
            );
            let status = hint_status(job.pointer.as_ref(), &list);
            if let EdgeStatus::TrustMismatch { reason } = &status {
                warn!(uri = %job.uri, reason = %reason, "Pointer target signer mismatch");
            }
            let children = if inserted {
                child_jobs(&mut state.graph, &key, &list, job.depth + 1)
            } else {
                debug!(uri = %job.uri, "Target already in graph");
                Vec::new()
            };
            (key, status, children)
        },
    };

    state.uri_index.insert(normalized, key.clone());
    match job.from {
        Some(from) => state.graph.push_edge(TrustEdge {
            from,
            uri: job.uri,
            to: Some(key),
            status,
        }),
        None => state.graph.add_root(key),
    }
    children
}

fn insert_parsed(
    graph: &mut TrustGraph,
    key: NodeKey,
    list: Arc<TrustStatusList>,
    source_uri: Option<String>,
    depth: usize,
) -> bool {
    let verification = list.verify_signature().clone();
    debug!(
        node = %key,
        territory = list.scheme_territory(),
        status = ?verification.status,
        "Adding trust list"
    );
    graph.insert_node(TrustNode {
        key,
        source_uri,
        depth,
        state: NodeState::Parsed { list, verification },
    })
}

/// Jobs for the pointers of `list`. Pointers that cannot be followed get
/// an `Unreachable` edge with no target instead.
fn child_jobs(
    graph: &mut TrustGraph,
    from: &NodeKey,
    list: &TrustStatusList,
    depth: usize,
) -> Vec<Job> {
    let mut jobs = Vec::new();
    for p in list.pointers() {
        let Some(reason) = unfollowable(p) else {
            jobs.push(Job {
                from: Some(from.clone()),
                pointer: Some(p.clone()),
                uri: p.location.clone(),
                depth,
            });
            continue;
        };
        debug!(
            location = %p.location,
            mime = ?p.mime_type,
            reason = %reason,
            "Pointer not followed"
        );
        graph.push_edge(TrustEdge {
            from: from.clone(),
            uri: p.location.clone(),
            to: None,
            status: EdgeStatus::Unreachable { reason },
        });
    }
    jobs
}

fn unfollowable(pointer: &OtherTslPointer) -> Option<String> {
    if pointer.location.trim().is_empty() {
        return Some("pointer has no TSLLocation".to_string());
    }
    if !pointer.is_xml() {
        let mime = pointer.mime_type.as_deref().unwrap_or_default();
        return Some(format!("non-XML pointer ({mime}) not followed"));
    }
    None
}

fn hint_status(pointer: Option<&OtherTslPointer>, list: &TrustStatusList) -> EdgeStatus {
    let Some(pointer) = pointer else {
        return EdgeStatus::Resolved;
    };
    let signer = list
        .verification()
        .filter(|v| v.is_verified())
        .and_then(|v| v.signer.as_ref());
    match pointer.check_signer(signer) {
        HintCheck::NoHints | HintCheck::Matched => EdgeStatus::Resolved,
        HintCheck::Mismatch(reason) => EdgeStatus::TrustMismatch { reason },
    }
}

/// Give each deferred edge the status of the node its URI produced.
fn link_deferred(state: &mut State) {
    let deferred = std::mem::take(&mut state.deferred);
    for Deferred { edge, pointer } in deferred {
        let Some(target) = state
            .graph
            .edges()
            .get(edge)
            .and_then(|e| state.uri_index.get(&normalize_uri(&e.uri)))
            .cloned()
        else {
            continue;
        };
        let status = match state.graph.node(&target).map(|n| &n.state) {
            Some(NodeState::Parsed { list, .. }) => hint_status(pointer.as_ref(), list),
            Some(NodeState::Unparsable { reason }) => EdgeStatus::Unparsable {
                reason: reason.clone(),
            },
            Some(NodeState::Unreachable { reason }) => EdgeStatus::Unreachable {
                reason: reason.clone(),
            },
            None => continue,
        };
        if let Some(e) = state.graph.edges_mut().get_mut(edge) {
            e.to = Some(target);
            e.status = status;
        }
    }
}

fn declared_key(job: &Job) -> NodeKey {
    let pointer = job.pointer.as_ref();
    NodeKey::Declared {
        territory: pointer
            .and_then(|p| p.territory.clone())
            .unwrap_or_default(),
        tsl_type: pointer.and_then(|p| p.tsl_type.clone()).unwrap_or_default(),
        location: job.uri.clone(),
    }
}

fn lock(shared: &Mutex<State>) -> MutexGuard<'_, State> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Normalize a URI for visited-set lookups.
///
/// Trims whitespace, drops any fragment, lowercases scheme and host, and
/// strips a trailing slash.
#[must_use]
pub fn normalize_uri(uri: &str) -> String {
    let uri = uri.trim();
    let uri = uri.split_once('#').map_or(uri, |(base, _)| base);

    let normalized = match uri.split_once("://") {
        Some((scheme, rest)) => {
            let (authority, path) = rest
                .find('/')
                .map_or((rest, ""), |i| rest.split_at(i));
            format!(
                "{}://{}{}",
                scheme.to_ascii_lowercase(),
                authority.to_ascii_lowercase(),
                path
            )
        },
        None => uri.to_string(),
    };
    normalized.trim_end_matches('/').to_string()
}
