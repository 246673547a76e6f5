//! Periodic presence sweep.

use std::sync::Arc;
use std::time::Duration;

use pulse_core::SweepReport;
use pulse_presence::PresenceTracker;
use tokio::sync::watch;

use crate::periodic::run_periodic;

/// Runs [`PresenceTracker::sweep`] on a fixed interval.
pub struct Sweeper {
    tracker: Arc<PresenceTracker>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(tracker: Arc<PresenceTracker>, interval: Duration) -> Self {
        Self { tracker, interval }
    }

    pub async fn run_once(&self) -> SweepReport {
        self.tracker.sweep().await
    }

    /// Sweep every interval until shutdown.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let this = &self;
        run_periodic("presence-sweep", self.interval, shutdown, move || async move {
            this.run_once().await;
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pulse_core::PresenceSettings;
    use pulse_infra::MemoryStore;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_member_left_behind_in_busy_community() {
        let store = MemoryStore::new();
        let tracker = Arc::new(PresenceTracker::new(Arc::new(store), PresenceSettings::default()));
        tracker.add_member("idle", "c1").await;
        tokio::time::sleep(Duration::from_secs(200)).await;
        tracker.add_member("busy", "c1").await;

        let (tx, rx) = watch::channel(false);
        let sweeper = Sweeper::new(tracker.clone(), Duration::from_secs(60));
        let handle = tokio::spawn(sweeper.run(rx));

        // Sweeps at 260s and 320s; "idle" lapses at 300s.
        tokio::time::sleep(Duration::from_secs(130)).await;
        assert_eq!(tracker.online_members("c1").await, HashSet::from(["busy".to_string()]));

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_once_reports_sweep() {
        let tracker = Arc::new(PresenceTracker::new(
            Arc::new(MemoryStore::new()),
            PresenceSettings::default(),
        ));
        tracker.add_member("u1", "c1").await;
        let report = Sweeper::new(tracker, Duration::from_secs(60)).run_once().await;
        assert_eq!(report, SweepReport { communities: 1, members_checked: 1, removed: 0 });
    }
}
