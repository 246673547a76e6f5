use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Default activity timeout: a member without activity for this long is offline.
pub const DEFAULT_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Default lifetime of the cached analytics snapshot.
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(30);

/// Default number of keys / members handled per cleanup round trip.
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 200;

/// Default key namespace.
pub const DEFAULT_NAMESPACE: &str = "presence";

/// Calendar window a peak counter is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakWindow {
    Daily,
    Weekly,
    Monthly,
}

impl PeakWindow {
    pub const ALL: [PeakWindow; 3] = [PeakWindow::Daily, PeakWindow::Weekly, PeakWindow::Monthly];

    /// Expiry applied to the counter whenever it is raised.
    pub fn ttl(self) -> Duration {
        match self {
            PeakWindow::Daily => Duration::from_secs(24 * 3600),
            PeakWindow::Weekly => Duration::from_secs(7 * 24 * 3600),
            PeakWindow::Monthly => Duration::from_secs(30 * 24 * 3600),
        }
    }

    /// Identifier of the calendar window containing `at` (UTC).
    ///
    /// Daily windows are dates, weekly windows are ISO weeks, monthly windows
    /// are calendar months.
    pub fn window_id(self, at: DateTime<Utc>) -> String {
        match self {
            PeakWindow::Daily => at.format("%Y-%m-%d").to_string(),
            PeakWindow::Weekly => {
                let week = at.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            PeakWindow::Monthly => format!("{}-{:02}", at.year(), at.month()),
        }
    }
}

impl fmt::Display for PeakWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeakWindow::Daily => write!(f, "daily"),
            PeakWindow::Weekly => write!(f, "weekly"),
            PeakWindow::Monthly => write!(f, "monthly"),
        }
    }
}

/// Peak online counts for the current day, ISO week and month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakCounts {
    pub daily: u64,
    pub weekly: u64,
    pub monthly: u64,
}

impl PeakCounts {
    pub fn get(&self, window: PeakWindow) -> u64 {
        match window {
            PeakWindow::Daily => self.daily,
            PeakWindow::Weekly => self.weekly,
            PeakWindow::Monthly => self.monthly,
        }
    }

    pub fn set(&mut self, window: PeakWindow, value: u64) {
        match window {
            PeakWindow::Daily => self.daily = value,
            PeakWindow::Weekly => self.weekly = value,
            PeakWindow::Monthly => self.monthly = value,
        }
    }
}

/// Short-lived cached view of a community's presence statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub online_count: u64,
    pub daily_peak: u64,
    pub weekly_peak: u64,
    pub monthly_peak: u64,
    pub last_updated: DateTime<Utc>,
}

impl AnalyticsSnapshot {
    pub fn new(online_count: u64, peaks: PeakCounts, last_updated: DateTime<Utc>) -> Self {
        Self {
            online_count,
            daily_peak: peaks.daily,
            weekly_peak: peaks.weekly,
            monthly_peak: peaks.monthly,
            last_updated,
        }
    }

    pub fn peaks(&self) -> PeakCounts {
        PeakCounts {
            daily: self.daily_peak,
            weekly: self.weekly_peak,
            monthly: self.monthly_peak,
        }
    }
}

/// Outcome of one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Presence sets visited.
    pub communities: u64,
    /// Members whose activity record was checked.
    pub members_checked: u64,
    /// Members removed because their activity record had lapsed.
    pub removed: u64,
}

/// Tunables for the presence tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSettings {
    pub namespace: String,
    pub activity_timeout: Duration,
    pub snapshot_ttl: Duration,
    pub sweep_batch_size: usize,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            activity_timeout: DEFAULT_ACTIVITY_TIMEOUT,
            snapshot_ttl: DEFAULT_SNAPSHOT_TTL,
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
        }
    }
}

/// Which store adapter backs the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Redis => write!(f, "redis"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Connection parameters for the store adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub url: String,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    /// Reconnect attempts before an operation gives up.
    pub retries: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            url: "redis://127.0.0.1:6379/0".to_string(),
            connect_timeout: Duration::from_millis(1500),
            operation_timeout: Duration::from_millis(1500),
            retries: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_ids_follow_calendar() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        assert_eq!(PeakWindow::Daily.window_id(at), "2024-03-07");
        assert_eq!(PeakWindow::Weekly.window_id(at), "2024-W10");
        assert_eq!(PeakWindow::Monthly.window_id(at), "2024-03");
    }

    #[test]
    fn test_midnight_splits_daily_window() {
        let before = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 5, 2, 0, 1, 0).unwrap();
        assert_ne!(PeakWindow::Daily.window_id(before), PeakWindow::Daily.window_id(after));
        // Wednesday to Thursday: same ISO week, same month.
        assert_eq!(PeakWindow::Weekly.window_id(before), PeakWindow::Weekly.window_id(after));
        assert_eq!(PeakWindow::Monthly.window_id(before), PeakWindow::Monthly.window_id(after));
    }

    #[test]
    fn test_iso_week_year_differs_from_calendar_year() {
        // 2021-01-03 is a Sunday belonging to ISO week 53 of 2020.
        let at = Utc.with_ymd_and_hms(2021, 1, 3, 8, 0, 0).unwrap();
        assert_eq!(PeakWindow::Weekly.window_id(at), "2020-W53");
        assert_eq!(PeakWindow::Monthly.window_id(at), "2021-01");
    }

    #[test]
    fn test_window_ttls() {
        assert_eq!(PeakWindow::Daily.ttl(), Duration::from_secs(86_400));
        assert_eq!(PeakWindow::Weekly.ttl(), Duration::from_secs(604_800));
        assert_eq!(PeakWindow::Monthly.ttl(), Duration::from_secs(2_592_000));
    }

    #[test]
    fn test_snapshot_serialization() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        let snapshot = AnalyticsSnapshot::new(
            4,
            PeakCounts { daily: 5, weekly: 9, monthly: 12 },
            at,
        );
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"online_count\":4"));
        let back: AnalyticsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.peaks().weekly, 9);
        assert_eq!(back.last_updated, at);
    }
}
