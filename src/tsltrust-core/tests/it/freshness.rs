//! Staleness and version ordering over built lists.

use std::time::Duration;

use chrono::Utc;
use tsltrust_core::{
    compare, is_stale, FreshnessReport, FreshnessTracker, ListId, TrustError, TrustStatusList,
};

use crate::common::ListBuilder;

fn list(builder: ListBuilder) -> TrustStatusList {
    TrustStatusList::parse(builder.build().as_bytes()).unwrap()
}

#[test]
fn test_se_42_staleness() {
    let now = Utc::now();

    let fresh = list(
        ListBuilder::new("SE")
            .sequence(Some(42))
            .next_update(Some(now + chrono::Duration::days(365))),
    );
    assert_eq!(fresh.scheme_territory(), "SE");
    assert!(!is_stale(&fresh, now, Duration::ZERO));

    let overdue = list(
        ListBuilder::new("SE")
            .sequence(Some(42))
            .next_update(Some(now - chrono::Duration::days(1))),
    );
    assert!(is_stale(&overdue, now, Duration::ZERO));
    assert!(!is_stale(&overdue, now, Duration::from_secs(2 * 86_400)));
}

#[test]
fn test_closed_list_never_stale() {
    let closed = list(ListBuilder::new("SE").next_update(None));
    let far = Utc::now() + chrono::Duration::days(36_500);
    assert!(!is_stale(&closed, far, Duration::ZERO));
}

#[test]
fn test_lower_sequence_is_anomaly() {
    let accepted = list(ListBuilder::new("SE").sequence(Some(42)));
    let older = list(ListBuilder::new("SE").sequence(Some(41)).operator("Rolled back"));

    let report = compare(&accepted, &older);
    assert_eq!(
        report,
        FreshnessReport::VersionAnomaly {
            territory: "SE".into(),
            tsl_type: crate::common::EU_GENERIC.into(),
            previous: Some(42),
            current: Some(41),
        }
    );
    let err = report.into_result().unwrap_err();
    assert!(matches!(
        err,
        TrustError::VersionAnomaly {
            previous: Some(42),
            current: Some(41),
            ..
        }
    ));
}

#[test]
fn test_tracker_sequence_of_instances() {
    let tracker = FreshnessTracker::new();
    let v42 = list(ListBuilder::new("SE").sequence(Some(42)));
    let v43 = list(ListBuilder::new("SE").sequence(Some(43)));
    let replay = list(ListBuilder::new("SE").sequence(Some(43)).operator("Replayed"));
    let id = ListId::of(&v42);

    assert_eq!(tracker.observe(v42.clone()), FreshnessReport::Unchanged);
    assert_eq!(tracker.observe(v42), FreshnessReport::Unchanged);
    assert_eq!(
        tracker.observe(v43.clone()),
        FreshnessReport::Superseded {
            previous: 42,
            current: 43
        }
    );
    assert!(!tracker.observe(replay).is_acceptable());
    assert_eq!(tracker.current(&id).unwrap().fingerprint(), v43.fingerprint());

    // A different territory is tracked separately.
    tracker.observe(list(ListBuilder::new("FI").sequence(Some(1))));
    assert_eq!(tracker.len(), 2);
    assert!(tracker.stale(Utc::now(), Duration::ZERO).is_empty());
}
