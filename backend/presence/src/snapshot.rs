//! Cached analytics snapshot.
//!
//! Written on every add/remove/activity update so dashboards can read one
//! short-lived key instead of recomputing. Cache failures are never surfaced.

use chrono::{DateTime, Utc};
use pulse_core::{AnalyticsSnapshot, PeakCounts};
use tracing::debug;

use crate::tracker::PresenceTracker;

impl PresenceTracker {
    /// The cached snapshot, if one is live and decodable.
    pub async fn cached_snapshot(&self, community: &str) -> Option<AnalyticsSnapshot> {
        let key = self.keys.snapshot(community);
        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    debug!(community, error = %e, "Discarding undecodable analytics snapshot");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(community, error = %e, "Cannot read analytics snapshot");
                None
            }
        }
    }

    /// Cached snapshot when available, otherwise computed live and cached.
    pub async fn analytics(&self, community: &str) -> AnalyticsSnapshot {
        if let Some(snapshot) = self.cached_snapshot(community).await {
            return snapshot;
        }
        let now = self.now();
        let count = self.online_count(community).await;
        let peaks = self.peak_counts(community).await;
        let snapshot = AnalyticsSnapshot::new(count, peaks, now);
        self.write_snapshot(community, &snapshot).await;
        snapshot
    }

    /// Rewrite the cache entry. Peaks are read from the store when not given.
    pub(crate) async fn refresh_snapshot(
        &self,
        community: &str,
        count: u64,
        peaks: Option<PeakCounts>,
        now: DateTime<Utc>,
    ) {
        let peaks = match peaks {
            Some(peaks) => peaks,
            None => match self.try_peak_counts(community, now).await {
                Ok(peaks) => peaks,
                Err(e) => {
                    debug!(community, error = %e, "Skipping snapshot refresh");
                    return;
                }
            },
        };
        self.write_snapshot(community, &AnalyticsSnapshot::new(count, peaks, now))
            .await;
    }

    async fn write_snapshot(&self, community: &str, snapshot: &AnalyticsSnapshot) {
        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(community, error = %e, "Cannot encode analytics snapshot");
                return;
            }
        };
        if let Err(e) = self
            .store
            .set_with_expiry(&self.keys.snapshot(community), &payload, self.settings.snapshot_ttl)
            .await
        {
            debug!(community, error = %e, "Snapshot cache write failed");
        }
    }
}
