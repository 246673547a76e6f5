//! Peak online counters.
//!
//! One counter per community per calendar window (day, ISO week, month). A
//! counter only ever grows inside its window; when the window's key expires
//! the next write starts it again from the current count.

use chrono::{DateTime, Utc};
use pulse_core::{PeakCounts, PeakWindow, StoreResult};
use tracing::warn;

use crate::tracker::PresenceTracker;

impl PresenceTracker {
    /// Peak counts for the current windows; missing counters read as 0.
    pub async fn peak_counts(&self, community: &str) -> PeakCounts {
        self.try_peak_counts(community, self.now())
            .await
            .unwrap_or_else(|e| {
                warn!(community, error = %e, "Cannot read peak counters");
                PeakCounts::default()
            })
    }

    pub(crate) async fn try_peak_counts(
        &self,
        community: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<PeakCounts> {
        let mut peaks = PeakCounts::default();
        for window in PeakWindow::ALL {
            let key = self.keys.peak(community, window, now);
            let value = match self.store.get(&key).await? {
                Some(raw) => raw.parse::<u64>().unwrap_or_else(|e| {
                    warn!(key = %key, error = %e, "Ignoring undecodable peak counter");
                    0
                }),
                None => 0,
            };
            peaks.set(window, value);
        }
        Ok(peaks)
    }

    /// Raise every window's counter to `count` where it is lower.
    /// Returns the counters as held after the update.
    pub(crate) async fn raise_peaks(
        &self,
        community: &str,
        count: u64,
        now: DateTime<Utc>,
    ) -> StoreResult<PeakCounts> {
        let mut peaks = PeakCounts::default();
        for window in PeakWindow::ALL {
            let key = self.keys.peak(community, window, now);
            let held = self.store.raise_to(&key, count, window.ttl()).await?;
            peaks.set(window, held);
        }
        Ok(peaks)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::TimeZone;
    use pulse_core::{PresenceSettings, PresenceStore};
    use pulse_infra::MemoryStore;

    use super::*;
    use crate::tracker::tests::tracker_with;

    #[tokio::test]
    async fn test_peak_tracks_maximum_of_sequence() {
        let store = MemoryStore::new();
        let tracker = tracker_with(&store);

        let mut observed_max = 0;
        let mut last_peak = 0;
        let steps: [(&str, bool); 8] = [
            ("a", true), ("b", true), ("a", false), ("c", true),
            ("d", true), ("b", false), ("c", false), ("e", true),
        ];
        for (member, join) in steps {
            let count = if join {
                tracker.add_member(member, "c1").await
            } else {
                tracker.remove_member(member, "c1").await
            };
            observed_max = observed_max.max(count);

            let peak = tracker.peak_counts("c1").await.daily;
            assert!(peak >= last_peak, "daily peak went down");
            last_peak = peak;
        }
        assert_eq!(last_peak, observed_max);
        assert_eq!(observed_max, 3);
    }

    #[tokio::test]
    async fn test_all_windows_rise_together() {
        let store = MemoryStore::new();
        let tracker = tracker_with(&store);
        tracker.add_member("u1", "c1").await;
        tracker.add_member("u2", "c1").await;

        let peaks = tracker.peak_counts("c1").await;
        assert_eq!(peaks, PeakCounts { daily: 2, weekly: 2, monthly: 2 });

        let daily_key = tracker.keys().peak("c1", PeakWindow::Daily, Utc::now());
        let ttl = store.ttl(&daily_key).await.unwrap();
        assert!(ttl <= PeakWindow::Daily.ttl() && ttl > Duration::from_secs(86_000));
    }

    #[tokio::test]
    async fn test_new_day_starts_new_daily_peak() {
        let store = MemoryStore::new();
        let now = Arc::new(Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap()));
        let clock_time = now.clone();
        let tracker = crate::PresenceTracker::new(Arc::new(store.clone()), PresenceSettings::default())
            .with_clock(Arc::new(move || *clock_time.lock().unwrap()));

        for member in ["u1", "u2", "u3"] {
            tracker.add_member(member, "c1").await;
        }
        tracker.remove_member("u2", "c1").await;
        tracker.remove_member("u3", "c1").await;

        *now.lock().unwrap() = Utc.with_ymd_and_hms(2024, 5, 2, 0, 1, 0).unwrap();
        tracker.update_activity("u1", "c1").await;
        tracker.add_member("u4", "c1").await;

        let peaks = tracker.peak_counts("c1").await;
        assert_eq!(peaks.daily, 2);
        // Same ISO week and month as the day before.
        assert_eq!(peaks.weekly, 3);
        assert_eq!(peaks.monthly, 3);
    }

    #[tokio::test]
    async fn test_undecodable_counter_reads_as_zero() {
        let store = MemoryStore::new();
        let tracker = tracker_with(&store);
        let key = tracker.keys().peak("c1", PeakWindow::Monthly, Utc::now());
        store.set_with_expiry(&key, "not-a-number", Duration::from_secs(60)).await.unwrap();

        assert_eq!(tracker.peak_counts("c1").await.monthly, 0);
    }
}
