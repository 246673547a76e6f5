//! Reconciliation sweep.
//!
//! A presence set's expiry is refreshed by every active member, so a member
//! who went quiet can linger in a busy community's set long after their own
//! activity record expired. The sweep walks every presence set and evicts
//! members whose activity record is gone.
//!
//! Bounded work per round trip: presence-set keys are paged with a cursor
//! scan, and activity records are checked in pipelined batches, both sized by
//! `sweep_batch_size`.

use std::collections::HashSet;

use pulse_core::{StoreResult, SweepReport};
use pulse_logging::{EventLogger, PresenceEvent};
use tracing::{debug, info, warn};

use crate::tracker::PresenceTracker;

impl PresenceTracker {
    /// Evict members whose activity record has lapsed. Returns how many were removed.
    pub async fn cleanup_inactive_members(&self) -> u64 {
        self.sweep().await.removed
    }

    /// Full sweep with per-pass statistics.
    ///
    /// Runs concurrently with writes; a member who pings mid-sweep may be
    /// evicted and simply rejoins on their next activity.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let pattern = self.keys.presence_set_pattern();
        let batch = self.settings.sweep_batch_size.max(1);
        // SCAN may return a key more than once.
        let mut visited = HashSet::new();
        let mut cursor = 0;

        loop {
            let page = match self.store.scan_page(&pattern, cursor, batch).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, "Presence sweep stopped early: cannot scan presence sets");
                    break;
                }
            };

            for key in &page.keys {
                let Some(community) = self.keys.community_from_presence_set(key) else {
                    continue;
                };
                if !visited.insert(community.to_string()) {
                    continue;
                }
                report.communities += 1;

                match self.sweep_community(community, batch).await {
                    Ok((checked, removed)) => {
                        report.members_checked += checked;
                        report.removed += removed;
                    }
                    Err(e) => warn!(community, error = %e, "Skipping community in presence sweep"),
                }
            }

            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        if report.removed > 0 {
            info!(
                communities = report.communities,
                checked = report.members_checked,
                removed = report.removed,
                "Presence sweep evicted inactive members"
            );
            EventLogger::log_event(PresenceEvent::Swept {
                communities: report.communities,
                removed: report.removed,
            });
        } else {
            debug!(communities = report.communities, checked = report.members_checked, "Presence sweep found nothing to evict");
        }
        report
    }

    /// Returns (members checked, members removed) for one community.
    async fn sweep_community(&self, community: &str, batch: usize) -> StoreResult<(u64, u64)> {
        let presence_key = self.keys.presence_set(community);
        let members: Vec<String> = self.store.set_members(&presence_key).await?.into_iter().collect();
        let mut removed = 0;

        for chunk in members.chunks(batch) {
            let activity_keys: Vec<String> = chunk
                .iter()
                .map(|member| self.keys.activity(member, community))
                .collect();
            let alive = self.store.exists_many(&activity_keys).await?;

            for (member, alive) in chunk.iter().zip(alive) {
                if alive {
                    continue;
                }
                if self.store.remove_from_set(&presence_key, member).await? {
                    removed += 1;
                }
                self.store
                    .remove_from_set(&self.keys.member_index(member), community)
                    .await?;
                debug!(member = %member, community, "Evicted inactive member");
            }
        }

        if removed > 0 {
            let count = self.store.set_cardinality(&presence_key).await?;
            self.refresh_snapshot(community, count, None, self.now()).await;
        }
        Ok((members.len() as u64, removed))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use pulse_core::{PresenceSettings, PresenceStore};
    use pulse_infra::MemoryStore;

    use crate::tracker::tests::tracker_with;
    use crate::PresenceTracker;

    #[tokio::test]
    async fn test_cleanup_removes_member_with_lapsed_activity() {
        let store = MemoryStore::new();
        let tracker = tracker_with(&store);
        tracker.add_member("u1", "c1").await;
        tracker.add_member("u2", "c1").await;
        tracker.add_member("u1", "c2").await;

        store.delete(&tracker.keys().activity("u1", "c1")).await.unwrap();

        assert_eq!(tracker.cleanup_inactive_members().await, 1);
        assert!(!tracker.online_members("c1").await.contains("u1"));
        assert_eq!(tracker.member_communities("u1").await, HashSet::from(["c2".to_string()]));
        assert_eq!(tracker.online_count("c1").await, 1);
        assert_eq!(tracker.cached_snapshot("c1").await.unwrap().online_count, 1);

        // Nothing left to reconcile.
        assert_eq!(tracker.cleanup_inactive_members().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_community_keeps_idle_member_until_sweep() {
        let store = MemoryStore::new();
        let tracker = tracker_with(&store);
        tracker.add_member("idle", "c1").await;

        tokio::time::advance(Duration::from_secs(200)).await;
        tracker.add_member("busy", "c1").await;
        tokio::time::advance(Duration::from_secs(150)).await;

        // The set was refreshed by "busy", so "idle" is still listed.
        assert_eq!(tracker.online_count("c1").await, 2);

        let report = tracker.sweep().await;
        assert_eq!(report.communities, 1);
        assert_eq!(report.members_checked, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(tracker.online_members("c1").await, HashSet::from(["busy".to_string()]));
    }

    #[tokio::test]
    async fn test_sweep_pages_through_many_communities() {
        let store = MemoryStore::new();
        let settings = PresenceSettings { sweep_batch_size: 3, ..Default::default() };
        let tracker = PresenceTracker::new(Arc::new(store.clone()), settings);

        for c in 0..10 {
            for m in 0..4 {
                tracker.add_member(&format!("m{m}"), &format!("c{c}")).await;
            }
            store.delete(&tracker.keys().activity("m0", &format!("c{c}"))).await.unwrap();
        }

        let report = tracker.sweep().await;
        assert_eq!(report.communities, 10);
        assert_eq!(report.members_checked, 40);
        assert_eq!(report.removed, 10);
        assert!(tracker.member_communities("m0").await.is_empty());
        assert_eq!(tracker.member_communities("m1").await.len(), 10);
    }

    #[tokio::test]
    async fn test_colon_ids_keep_separate_activity() {
        let store = MemoryStore::new();
        let tracker = tracker_with(&store);
        tracker.add_member("u:1", "x").await;
        tracker.add_member("u", "1:x").await;

        tracker.remove_member("u", "1:x").await;

        assert_eq!(tracker.cleanup_inactive_members().await, 0);
        assert_eq!(tracker.online_members("x").await, HashSet::from(["u:1".to_string()]));
    }

    #[tokio::test]
    async fn test_sweep_visits_every_community_it_empties() {
        let store = MemoryStore::new();
        let settings = PresenceSettings { sweep_batch_size: 1, ..Default::default() };
        let tracker = PresenceTracker::new(Arc::new(store.clone()), settings);

        for c in ["c0", "c1", "c2"] {
            tracker.add_member("m", c).await;
            store.delete(&tracker.keys().activity("m", c)).await.unwrap();
        }

        let report = tracker.sweep().await;
        assert_eq!(report.communities, 3);
        assert_eq!(report.removed, 3);
        assert!(tracker.online_communities().await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_leaves_peaks_alone() {
        let store = MemoryStore::new();
        let tracker = tracker_with(&store);
        for member in ["a", "b", "c"] {
            tracker.add_member(member, "c1").await;
            store.delete(&tracker.keys().activity(member, "c1")).await.unwrap();
        }

        assert_eq!(tracker.cleanup_inactive_members().await, 3);
        assert_eq!(tracker.online_count("c1").await, 0);
        assert_eq!(tracker.peak_counts("c1").await.daily, 3);
        assert!(tracker.online_communities().await.is_empty());
    }
}
