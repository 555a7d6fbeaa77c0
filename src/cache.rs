//! Thread-safe last-known-fix cache.
//!
//! One writer (the ingestion session, or the mirror poller) and any number
//! of concurrent readers (HTTP handlers). Readers always observe whole
//! records: every update swaps the full [`Fix`] under the lock.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{Fix, FixCandidate, VesselId};

/// Thread-safe cache of last known fixes, keyed by vessel identifier.
///
/// There is no TTL and no eviction: absence of updates simply leaves the
/// last fix in place, and staleness is only visible via `observed_at`.
pub struct FixCache {
    fixes: RwLock<HashMap<VesselId, Fix>>,
}

impl FixCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fixes: RwLock::new(HashMap::new()),
        }
    }

    /// Write a full replacement fix for `vessel_id`.
    ///
    /// A candidate carrying none of {latitude, longitude, speed} is a
    /// no-op. Returns whether a record was written. Replaying the same
    /// update is idempotent.
    pub fn update(
        &self,
        vessel_id: VesselId,
        candidate: FixCandidate,
        observed_at: DateTime<Utc>,
    ) -> bool {
        if candidate.is_vacuous() {
            return false;
        }
        let fix = candidate.into_fix(vessel_id.clone(), observed_at);
        self.fixes.write().insert(vessel_id, fix);
        true
    }

    /// Get a snapshot of one vessel's fix.
    #[must_use]
    pub fn get(&self, vessel_id: &VesselId) -> Option<Fix> {
        self.fixes.read().get(vessel_id).cloned()
    }

    /// Get snapshots for a set of vessels atomically.
    ///
    /// Every requested identifier appears in the result, `None` for
    /// vessels never observed: callers get a stable response shape
    /// regardless of cache contents.
    #[must_use]
    pub fn get_many(&self, vessel_ids: &[VesselId]) -> BTreeMap<VesselId, Option<Fix>> {
        let fixes = self.fixes.read();
        vessel_ids
            .iter()
            .map(|id| (id.clone(), fixes.get(id).cloned()))
            .collect()
    }

    /// Snapshot of everything currently stored.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<VesselId, Fix> {
        self.fixes
            .read()
            .iter()
            .map(|(id, fix)| (id.clone(), fix.clone()))
            .collect()
    }

    /// All identifiers currently stored, sorted.
    #[must_use]
    pub fn known_ids(&self) -> Vec<VesselId> {
        let mut ids: Vec<_> = self.fixes.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Replace the entire cache contents in one swap (mirror ingestion).
    pub fn replace_all(&self, fixes: HashMap<VesselId, Fix>) {
        *self.fixes.write() = fixes;
    }

    /// Drop everything (resubscribe policy, when configured).
    pub fn clear(&self) {
        self.fixes.write().clear();
    }

    /// Number of vessels in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fixes.read().len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FixCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn candidate(lat: f64, lon: f64) -> FixCandidate {
        FixCandidate {
            latitude: Some(lat),
            longitude: Some(lon),
            ..FixCandidate::default()
        }
    }

    #[test]
    fn test_update_and_get() {
        let cache = FixCache::new();
        let id = VesselId::from("244944000");

        assert!(cache.update(id.clone(), candidate(59.3, 18.0), ts("2024-01-01T00:00:00Z")));

        let fix = cache.get(&id).unwrap();
        assert_eq!(fix.latitude, Some(59.3));
        assert_eq!(fix.longitude, Some(18.0));
        assert_eq!(fix.observed_at, ts("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_last_write_wins_wholesale() {
        let cache = FixCache::new();
        let id = VesselId::from("244944000");

        let first = FixCandidate {
            latitude: Some(59.3),
            longitude: Some(18.0),
            navigational_status: Some(0),
            ..FixCandidate::default()
        };
        cache.update(id.clone(), first, ts("2024-01-01T00:00:00Z"));

        // Later update carries speed only: the stored record must not keep
        // the earlier position or status.
        let second = FixCandidate {
            speed_over_ground_knots: Some(12.5),
            ..FixCandidate::default()
        };
        cache.update(id.clone(), second, ts("2024-01-01T00:01:00Z"));

        let fix = cache.get(&id).unwrap();
        assert_eq!(fix.speed_over_ground_knots, Some(12.5));
        assert_eq!(fix.latitude, None);
        assert_eq!(fix.navigational_status, None);
        assert_eq!(fix.observed_at, ts("2024-01-01T00:01:00Z"));
    }

    #[test]
    fn test_vacuous_update_is_noop() {
        let cache = FixCache::new();
        let id = VesselId::from("244944000");

        cache.update(id.clone(), candidate(59.3, 18.0), ts("2024-01-01T00:00:00Z"));

        let vacuous = FixCandidate {
            navigational_status: Some(5),
            ..FixCandidate::default()
        };
        assert!(!cache.update(id.clone(), vacuous, ts("2024-01-01T00:01:00Z")));

        // Prior fix untouched.
        let fix = cache.get(&id).unwrap();
        assert_eq!(fix.latitude, Some(59.3));
        assert_eq!(fix.observed_at, ts("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_replay_is_idempotent() {
        let cache = FixCache::new();
        let id = VesselId::from("244944000");

        cache.update(id.clone(), candidate(59.3, 18.0), ts("2024-01-01T00:00:00Z"));
        let first = cache.get(&id).unwrap();

        cache.update(id.clone(), candidate(59.3, 18.0), ts("2024-01-01T00:00:00Z"));
        assert_eq!(cache.get(&id).unwrap(), first);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_many_echoes_requested_ids() {
        let cache = FixCache::new();
        let a = VesselId::from("A");
        let b = VesselId::from("B");

        // Empty cache still yields every requested key.
        let result = cache.get_many(&[a.clone(), b.clone()]);
        assert_eq!(result.len(), 2);
        assert!(result[&a].is_none());
        assert!(result[&b].is_none());

        cache.update(a.clone(), candidate(1.0, 2.0), ts("2024-01-01T00:00:00Z"));
        let result = cache.get_many(&[a.clone(), b.clone()]);
        assert!(result[&a].is_some());
        assert!(result[&b].is_none());
    }

    #[test]
    fn test_replace_all() {
        let cache = FixCache::new();
        cache.update(
            VesselId::from("1"),
            candidate(1.0, 1.0),
            ts("2024-01-01T00:00:00Z"),
        );

        let id = VesselId::from("2");
        let fix = candidate(2.0, 2.0).into_fix(id.clone(), ts("2024-01-02T00:00:00Z"));
        cache.replace_all(HashMap::from([(id.clone(), fix)]));

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&VesselId::from("1")).is_none());
        assert!(cache.get(&id).is_some());
    }

    #[test]
    fn test_known_ids_sorted() {
        let cache = FixCache::new();
        for id in ["3", "1", "2"] {
            cache.update(
                VesselId::from(id),
                candidate(1.0, 1.0),
                ts("2024-01-01T00:00:00Z"),
            );
        }
        let ids: Vec<_> = cache.known_ids().iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }
}
