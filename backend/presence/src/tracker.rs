//! Community presence tracker.
//!
//! Tracks which members are online in which communities over an expiring
//! key-value store. The tracker itself holds no mutable state, so any number
//! of instances (in any number of processes) can share one store.
//!
//! Every public operation is fail-open: store errors are logged and turned
//! into zero / empty results, never returned to the caller.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pulse_core::{KeySpace, PresenceSettings, PresenceStore, StoreResult};
use pulse_logging::{EventLogger, PresenceEvent};
use tracing::{debug, warn};

/// Source of wall-clock time for window keys and activity timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct PresenceTracker {
    pub(crate) store: Arc<dyn PresenceStore>,
    pub(crate) keys: KeySpace,
    pub(crate) settings: PresenceSettings,
    clock: Clock,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn PresenceStore>, settings: PresenceSettings) -> Self {
        Self {
            store,
            keys: KeySpace::new(settings.namespace.clone()),
            settings,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock (tests, replay tooling).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &PresenceSettings {
        &self.settings
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Current time from the tracker's clock; picks the peak windows.
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Mark `member` online in `community`. Returns the community's online count.
    ///
    /// Idempotent: repeating the call only refreshes expiries.
    pub async fn add_member(&self, member: &str, community: &str) -> u64 {
        match self.try_add(member, community, self.now()).await {
            Ok(count) => count,
            Err(e) => {
                warn!(member, community, error = %e, "Failed to mark member online");
                self.online_count(community).await
            }
        }
    }

    /// Mark `member` offline in `community`. Returns the community's online count.
    ///
    /// Peak counters are left untouched.
    pub async fn remove_member(&self, member: &str, community: &str) -> u64 {
        match self.try_remove(member, community, self.now()).await {
            Ok(count) => count,
            Err(e) => {
                warn!(member, community, error = %e, "Failed to mark member offline");
                self.online_count(community).await
            }
        }
    }

    /// Record activity for `member` in `community`.
    ///
    /// A member missing from the presence set is treated as a fresh join.
    pub async fn update_activity(&self, member: &str, community: &str) -> u64 {
        match self.try_update(member, community, self.now()).await {
            Ok(count) => count,
            Err(e) => {
                warn!(member, community, error = %e, "Failed to record member activity");
                self.online_count(community).await
            }
        }
    }

    /// Mark `member` online in every community of a login. Returns each community's count.
    pub async fn add_member_to_communities<I, S>(
        &self,
        member: &str,
        communities: I,
    ) -> BTreeMap<String, u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts = BTreeMap::new();
        for community in communities {
            let community = community.as_ref();
            let count = self.add_member(member, community).await;
            counts.insert(community.to_string(), count);
        }
        counts
    }

    /// Mark `member` offline everywhere the reverse index says they are online.
    /// Returns the number of communities left.
    pub async fn remove_member_everywhere(&self, member: &str) -> usize {
        let communities = self.member_communities(member).await;
        for community in &communities {
            self.remove_member(member, community).await;
        }
        communities.len()
    }

    async fn try_add(&self, member: &str, community: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        let presence_key = self.keys.presence_set(community);
        let newly_online = self.store.add_to_set(&presence_key, member).await?;
        self.touch(member, community, now).await?;

        let count = self.store.set_cardinality(&presence_key).await?;
        match self.raise_peaks(community, count, now).await {
            Ok(peaks) => self.refresh_snapshot(community, count, Some(peaks), now).await,
            Err(e) => warn!(community, count, error = %e, "Failed to update peak counters"),
        }

        if newly_online {
            EventLogger::log_event(PresenceEvent::Joined {
                community: community.to_string(),
                member: member.to_string(),
                online: count,
            });
        }
        Ok(count)
    }

    async fn try_remove(&self, member: &str, community: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        let presence_key = self.keys.presence_set(community);
        let was_online = self.store.remove_from_set(&presence_key, member).await?;
        self.store
            .remove_from_set(&self.keys.member_index(member), community)
            .await?;
        self.store.delete(&self.keys.activity(member, community)).await?;

        let count = self.store.set_cardinality(&presence_key).await?;
        self.refresh_snapshot(community, count, None, now).await;

        if was_online {
            EventLogger::log_event(PresenceEvent::Left {
                community: community.to_string(),
                member: member.to_string(),
                online: count,
            });
        }
        Ok(count)
    }

    async fn try_update(&self, member: &str, community: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        let presence_key = self.keys.presence_set(community);
        if !self.store.is_set_member(&presence_key, member).await? {
            debug!(member, community, "Activity from member not marked online; treating as join");
            return self.try_add(member, community, now).await;
        }

        self.touch(member, community, now).await?;
        let count = self.store.set_cardinality(&presence_key).await?;
        self.refresh_snapshot(community, count, None, now).await;
        Ok(count)
    }

    /// Write the activity record and slide the presence set and reverse index
    /// expiries forward by the activity timeout.
    async fn touch(&self, member: &str, community: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let ttl = self.settings.activity_timeout;
        let index_key = self.keys.member_index(member);

        self.store.add_to_set(&index_key, community).await?;
        self.store
            .set_with_expiry(
                &self.keys.activity(member, community),
                &now.timestamp().to_string(),
                ttl,
            )
            .await?;
        self.store.expire(&self.keys.presence_set(community), ttl).await?;
        self.store.expire(&index_key, ttl).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Number of members online in `community`; 0 if the store cannot be read.
    pub async fn online_count(&self, community: &str) -> u64 {
        self.store
            .set_cardinality(&self.keys.presence_set(community))
            .await
            .unwrap_or_else(|e| {
                warn!(community, error = %e, "Cannot read online count");
                0
            })
    }

    /// Members online in `community`; empty if the store cannot be read.
    pub async fn online_members(&self, community: &str) -> HashSet<String> {
        self.store
            .set_members(&self.keys.presence_set(community))
            .await
            .unwrap_or_else(|e| {
                warn!(community, error = %e, "Cannot read online members");
                HashSet::new()
            })
    }

    /// Communities `member` is online in; empty if the store cannot be read.
    pub async fn member_communities(&self, member: &str) -> HashSet<String> {
        self.store
            .set_members(&self.keys.member_index(member))
            .await
            .unwrap_or_else(|e| {
                warn!(member, error = %e, "Cannot read member communities");
                HashSet::new()
            })
    }

    /// Communities that currently have a presence set, sorted.
    ///
    /// On a scan failure the communities collected so far are returned.
    pub async fn online_communities(&self) -> Vec<String> {
        let pattern = self.keys.presence_set_pattern();
        let batch = self.settings.sweep_batch_size.max(1);
        let mut communities = BTreeSet::new();
        let mut cursor = 0;
        loop {
            let page = match self.store.scan_page(&pattern, cursor, batch).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, "Cannot list online communities");
                    break;
                }
            };
            communities.extend(
                page.keys
                    .iter()
                    .filter_map(|key| self.keys.community_from_presence_set(key))
                    .map(str::to_string),
            );
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        communities.into_iter().collect()
    }

    /// True if the backing store answers a ping.
    pub async fn health(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "Presence store health check failed");
                false
            }
        }
    }
}
