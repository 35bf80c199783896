//! Freshness and version tracking.
//!
//! Two instances of the same logical list (same territory and TSL type) are
//! ordered by `TSLSequenceNumber`. A newer instance supersedes the older one;
//! identical content is unchanged; anything else is a [`FreshnessReport::VersionAnomaly`]
//! that is reported, never silently accepted.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::document::TrustStatusList;
use crate::error::TrustError;

/// Outcome of comparing two instances of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FreshnessReport {
    /// The current instance is strictly newer.
    Superseded {
        /// Previous sequence number.
        previous: u64,
        /// Current sequence number.
        current: u64,
    },
    /// Same content.
    Unchanged,
    /// Different content without a higher sequence number.
    VersionAnomaly {
        /// Territory of the list.
        territory: String,
        /// TSL type of the list.
        tsl_type: String,
        /// Previous sequence number.
        previous: Option<u64>,
        /// Current sequence number.
        current: Option<u64>,
    },
}

impl FreshnessReport {
    /// Whether the current instance may replace the previous one.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Self::VersionAnomaly { .. })
    }

    /// Convert an anomaly into an error.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::VersionAnomaly`] for an anomaly.
    pub fn into_result(self) -> Result<Self, TrustError> {
        match self {
            Self::VersionAnomaly {
                territory,
                tsl_type,
                previous,
                current,
            } => Err(TrustError::VersionAnomaly {
                territory,
                tsl_type,
                previous,
                current,
            }),
            other => Ok(other),
        }
    }
}

/// Compare a previously accepted instance with a newly obtained one.
///
/// A missing sequence number on either side cannot prove ordering, so
/// differing content is then an anomaly.
#[must_use]
pub fn compare(previous: &TrustStatusList, current: &TrustStatusList) -> FreshnessReport {
    if previous.fingerprint() == current.fingerprint() {
        return FreshnessReport::Unchanged;
    }
    match (previous.sequence_number(), current.sequence_number()) {
        (Some(p), Some(c)) if c > p => FreshnessReport::Superseded {
            previous: p,
            current: c,
        },
        (p, c) => FreshnessReport::VersionAnomaly {
            territory: current.scheme_territory().to_string(),
            tsl_type: current.tsl_type().to_string(),
            previous: p,
            current: c,
        },
    }
}

/// Whether `now` is past the list's `NextUpdate` plus `grace`.
///
/// Lists without a next update (closed lists) are never stale. Staleness is
/// advisory: it does not invalidate the list.
#[must_use]
pub fn is_stale(list: &TrustStatusList, now: DateTime<Utc>, grace: Duration) -> bool {
    let Some(next_update) = list.next_update() else {
        return false;
    };
    chrono::Duration::from_std(grace)
        .ok()
        .and_then(|grace| next_update.checked_add_signed(grace))
        .is_some_and(|deadline| now > deadline)
}

/// Identity of a logical list across instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListId {
    /// Scheme territory.
    pub territory: String,
    /// TSL type URI.
    pub tsl_type: String,
}

impl ListId {
    /// Identity of `list`.
    #[must_use]
    pub fn of(list: &TrustStatusList) -> Self {
        Self {
            territory: list.scheme_territory().to_string(),
            tsl_type: list.tsl_type().to_string(),
        }
    }
}

struct Tracked {
    current: Arc<TrustStatusList>,
    history: Vec<(DateTime<Utc>, Option<u64>)>,
}

const MAX_HISTORY: usize = 1000;

/// Last accepted instance per logical list.
///
/// Anomalous instances are reported and never replace the accepted one.
#[derive(Default)]
pub struct FreshnessTracker {
    lists: RwLock<HashMap<ListId, Tracked>>,
}

impl FreshnessTracker {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a newly obtained instance.
    ///
    /// The first instance of a list is accepted and reported as unchanged.
    pub fn observe(&self, list: TrustStatusList) -> FreshnessReport {
        let id = ListId::of(&list);
        let mut lists = self.write();

        let now = Utc::now();
        let Some(tracked) = lists.get_mut(&id) else {
            debug!(territory = %id.territory, sequence = ?list.sequence_number(), "Tracking new list");
            let history = vec![(now, list.sequence_number())];
            lists.insert(
                id,
                Tracked {
                    current: Arc::new(list),
                    history,
                },
            );
            return FreshnessReport::Unchanged;
        };

        let report = compare(&tracked.current, &list);
        match &report {
            FreshnessReport::Superseded { previous, current } => {
                debug!(territory = %id.territory, previous, current, "List superseded");
                tracked.history.push((now, Some(*current)));
                if tracked.history.len() > MAX_HISTORY {
                    let excess = tracked.history.len() - MAX_HISTORY;
                    tracked.history.drain(..excess);
                }
                tracked.current = Arc::new(list);
            },
            FreshnessReport::Unchanged => {},
            FreshnessReport::VersionAnomaly {
                previous, current, ..
            } => {
                warn!(
                    territory = %id.territory,
                    tsl_type = %id.tsl_type,
                    ?previous,
                    ?current,
                    "Version anomaly: keeping accepted instance"
                );
            },
        }
        report
    }

    /// The accepted instance of a list.
    #[must_use]
    pub fn current(&self, id: &ListId) -> Option<Arc<TrustStatusList>> {
        self.read().get(id).map(|t| Arc::clone(&t.current))
    }

    /// Accepted sequence numbers of a list with the time each was accepted.
    #[must_use]
    pub fn history(&self, id: &ListId) -> Vec<(DateTime<Utc>, Option<u64>)> {
        self.read()
            .get(id)
            .map(|t| t.history.clone())
            .unwrap_or_default()
    }

    /// Accepted lists that are stale at `now`.
    #[must_use]
    pub fn stale(&self, now: DateTime<Utc>, grace: Duration) -> Vec<ListId> {
        let mut ids: Vec<ListId> = self
            .read()
            .iter()
            .filter(|(_, t)| is_stale(&t.current, now, grace))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of tracked lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock leaves the map consistent: every
    // mutation is a single insert or field assignment.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ListId, Tracked>> {
        self.lists.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ListId, Tracked>> {
        self.lists.write().unwrap_or_else(PoisonError::into_inner)
    }
}
