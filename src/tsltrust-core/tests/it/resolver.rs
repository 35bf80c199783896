//! Pointer chain resolution against a scripted fetcher.

use std::sync::Arc;
use std::time::Duration;

use tsltrust_core::{
    CancellationToken, EdgeStatus, FetchError, NodeKey, NodeState, PointerResolver, TrustConfig,
    TrustError, TrustStatusList, VerificationStatus,
};

use crate::common::{ListBuilder, ScriptedFetcher, TestSigner};

const A: &str = "https://a.example.test/tsl.xml";
const B: &str = "https://b.example.test/tsl.xml";
const C: &str = "https://c.example.test/tsl.xml";
const D: &str = "https://d.example.test/tsl.xml";

fn key_of(list: &TrustStatusList) -> NodeKey {
    NodeKey::Fingerprint {
        fingerprint: list.fingerprint().to_string(),
    }
}

fn resolver(fetcher: &Arc<ScriptedFetcher>, config: TrustConfig) -> PointerResolver {
    PointerResolver::new(fetcher.clone(), config).unwrap()
}

#[tokio::test]
async fn test_cycle_resolves_each_node_once() {
    let a = ListBuilder::new("EU").pointer(B, "SE").build();
    let b = ListBuilder::new("SE").pointer(A, "EU").build();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .serve(A, a.clone())
            .serve(B, b.clone()),
    );

    let root = TrustStatusList::parse(a.as_bytes()).unwrap();
    let root_key = key_of(&root);
    let graph = resolver(&fetcher, TrustConfig::default())
        .resolve(vec![root], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.roots(), [root_key.clone()]);
    assert_eq!(graph.edges().len(), 2);
    assert!(graph.edges().iter().all(|e| e.status == EdgeStatus::Resolved));

    // The pointer back to A lands on the root node.
    let back = graph.edges().iter().find(|e| e.uri == A).unwrap();
    assert_eq!(back.to.as_ref(), Some(&root_key));
    assert_eq!(fetcher.calls(B), 1);
    assert_eq!(fetcher.calls(A), 1);
}

#[tokio::test]
async fn test_cycle_from_uris_links_deferred_edge() {
    let a = ListBuilder::new("EU").pointer(B, "SE").build();
    let b = ListBuilder::new("SE").pointer(A, "EU").build();
    let fetcher = Arc::new(ScriptedFetcher::new().serve(A, a.clone()).serve(B, b));

    let graph = resolver(&fetcher, TrustConfig::default())
        .resolve_uris(&[A.to_string()], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(graph.node_count(), 2);
    assert_eq!(fetcher.calls(A), 1);
    let back = graph.edges().iter().find(|e| e.uri == A).unwrap();
    assert_eq!(back.status, EdgeStatus::Resolved);
    let a_key = key_of(&TrustStatusList::parse(a.as_bytes()).unwrap());
    assert_eq!(back.to.as_ref(), Some(&a_key));
    assert_eq!(graph.roots(), [a_key]);
}

#[tokio::test(start_paused = true)]
async fn test_one_timeout_among_three() {
    let root = ListBuilder::new("EU")
        .pointer(B, "SE")
        .pointer(C, "FI")
        .pointer(D, "DK")
        .build();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .serve(B, ListBuilder::new("SE").build())
            .serve(C, ListBuilder::new("FI").build())
            .serve_after(D, Duration::from_secs(600), ListBuilder::new("DK").build()),
    );
    let config = TrustConfig {
        fetch_timeout: Duration::from_secs(2),
        ..TrustConfig::default()
    };

    let graph = resolver(&fetcher, config)
        .resolve(
            vec![TrustStatusList::parse(root.as_bytes()).unwrap()],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let status = |uri: &str| {
        graph
            .edges()
            .iter()
            .find(|e| e.uri == uri)
            .map(|e| e.status.clone())
            .unwrap()
    };
    assert_eq!(status(B), EdgeStatus::Resolved);
    assert_eq!(status(C), EdgeStatus::Resolved);
    match status(D) {
        EdgeStatus::Unreachable { reason } => assert!(reason.contains("Timed out"), "{reason}"),
        other => panic!("expected unreachable, got {other:?}"),
    }

    let declared = NodeKey::Declared {
        territory: "DK".into(),
        tsl_type: crate::common::EU_GENERIC.into(),
        location: D.into(),
    };
    assert!(matches!(
        graph.node(&declared).map(|n| &n.state),
        Some(NodeState::Unreachable { .. })
    ));
    assert_eq!(graph.summary().edge_status.get("resolved"), Some(&2));
}

#[tokio::test]
async fn test_unparsable_and_failed_fetches_are_recorded() {
    let root = ListBuilder::new("EU").pointer(B, "SE").pointer(C, "FI").build();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .serve(B, "<html><body>moved</body></html>")
            .fail(
                C,
                FetchError::Transport {
                    message: "connection reset".into(),
                },
            ),
    );

    let graph = resolver(&fetcher, TrustConfig::default())
        .resolve(
            vec![TrustStatusList::parse(root.as_bytes()).unwrap()],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let b = graph.edges().iter().find(|e| e.uri == B).unwrap();
    assert!(matches!(b.status, EdgeStatus::Unparsable { .. }));
    let b_node = graph.node(b.to.as_ref().unwrap()).unwrap();
    assert!(matches!(b_node.state, NodeState::Unparsable { .. }));

    let c = graph.edges().iter().find(|e| e.uri == C).unwrap();
    match &c.status {
        EdgeStatus::Unreachable { reason } => assert!(reason.contains("connection reset")),
        other => panic!("expected unreachable, got {other:?}"),
    }
    assert_eq!(graph.node_count(), 3);
}

#[tokio::test]
async fn test_signer_hints_checked() {
    let expected = TestSigner::new("se-expected.test");
    let actual = TestSigner::new("se-actual.test");

    let b = actual.sign(&ListBuilder::new("SE").build());
    let c = expected.sign(&ListBuilder::new("FI").build());
    let root = ListBuilder::new("EU")
        .pointer_signed_by(B, "SE", &expected.cert_der)
        .pointer_signed_by(C, "FI", &expected.cert_der)
        .build();
    let fetcher = Arc::new(ScriptedFetcher::new().serve(B, b).serve(C, c));

    let graph = resolver(&fetcher, TrustConfig::default())
        .resolve(
            vec![TrustStatusList::parse(root.as_bytes()).unwrap()],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let b_edge = graph.edges().iter().find(|e| e.uri == B).unwrap();
    assert!(matches!(b_edge.status, EdgeStatus::TrustMismatch { .. }));
    // The mismatched list is kept, with its own (valid) signature.
    let b_node = graph.node(b_edge.to.as_ref().unwrap()).unwrap();
    assert_eq!(
        b_node.verification().unwrap().status,
        VerificationStatus::Verified
    );

    let c_edge = graph.edges().iter().find(|e| e.uri == C).unwrap();
    assert_eq!(c_edge.status, EdgeStatus::Resolved);
    assert_eq!(graph.summary().verified_nodes, 2);
}

#[tokio::test]
async fn test_depth_limit_recorded() {
    let a = ListBuilder::new("EU").pointer(B, "SE").build();
    let b = ListBuilder::new("SE").pointer(C, "FI").build();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .serve(B, b)
            .serve(C, ListBuilder::new("FI").build()),
    );
    let config = TrustConfig {
        max_depth: 1,
        ..TrustConfig::default()
    };

    let graph = resolver(&fetcher, config)
        .resolve(
            vec![TrustStatusList::parse(a.as_bytes()).unwrap()],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(fetcher.calls(C), 0);
    let c = graph.edges().iter().find(|e| e.uri == C).unwrap();
    match &c.status {
        EdgeStatus::Unreachable { reason } => assert!(reason.contains("max_depth")),
        other => panic!("expected unreachable, got {other:?}"),
    }
    assert!(c.to.is_none());
}

#[tokio::test]
async fn test_unfollowable_pointers_get_edges() {
    let pdf = "https://b.example.test/tsl.pdf";
    let a = ListBuilder::new("EU")
        .pdf_pointer(pdf, "SE")
        .pointer(B, "SE")
        .pointer("", "FI")
        .build();
    let fetcher = Arc::new(ScriptedFetcher::new().serve(B, ListBuilder::new("SE").build()));

    let graph = resolver(&fetcher, TrustConfig::default())
        .resolve(
            vec![TrustStatusList::parse(a.as_bytes()).unwrap()],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(fetcher.total_calls(), 1);
    assert_eq!(graph.edges().len(), 3);

    let pdf_edge = graph.edges().iter().find(|e| e.uri == pdf).unwrap();
    assert!(pdf_edge.to.is_none());
    match &pdf_edge.status {
        EdgeStatus::Unreachable { reason } => {
            assert!(reason.contains("application/pdf"), "{reason}");
        },
        other => panic!("expected unreachable, got {other:?}"),
    }

    let empty = graph.edges().iter().find(|e| e.uri.is_empty()).unwrap();
    assert!(empty.to.is_none());
    assert!(matches!(
        &empty.status,
        EdgeStatus::Unreachable { reason } if reason.contains("no TSLLocation")
    ));

    let b = graph.edges().iter().find(|e| e.uri == B).unwrap();
    assert_eq!(b.status, EdgeStatus::Resolved);
    assert_eq!(graph.summary().edge_status.get("unreachable"), Some(&2));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let a = ListBuilder::new("EU").pointer(B, "SE").build();
    let fetcher = Arc::new(ScriptedFetcher::new().serve(B, ListBuilder::new("SE").build()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = resolver(&fetcher, TrustConfig::default())
        .resolve(vec![TrustStatusList::parse(a.as_bytes()).unwrap()], &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, TrustError::Cancelled));
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_in_flight() {
    let a = ListBuilder::new("EU").pointer(B, "SE").build();
    let fetcher = Arc::new(ScriptedFetcher::new().serve_after(
        B,
        Duration::from_secs(20),
        ListBuilder::new("SE").build(),
    ));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = resolver(&fetcher, TrustConfig::default())
        .resolve(vec![TrustStatusList::parse(a.as_bytes()).unwrap()], &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(fetcher.calls(B), 1);
}
