//! Durable daily online statistics.
//!
//! Peak counters in the presence store expire with their window; the rollup
//! copies each online community's count and peaks into SQLite, one row per
//! community per UTC day.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use pulse_presence::PresenceTracker;
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::periodic::run_periodic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub community_id: String,
    pub stat_date: NaiveDate,
    pub online_count: u64,
    pub daily_peak: u64,
    pub weekly_peak: u64,
    pub monthly_peak: u64,
    pub recorded_at: DateTime<Utc>,
}

pub struct RollupStore {
    conn: Mutex<rusqlite::Connection>,
}

impl RollupStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create rollup directory {}", parent.display()))?;
        }
        let conn = rusqlite::Connection::open(db_path)
            .with_context(|| format!("open rollup store {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(rusqlite::Connection::open_in_memory().context("open in-memory rollup store")?)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS community_online_stats (
                community_id  TEXT NOT NULL,
                stat_date     TEXT NOT NULL,
                online_count  INTEGER NOT NULL,
                daily_peak    INTEGER NOT NULL,
                weekly_peak   INTEGER NOT NULL,
                monthly_peak  INTEGER NOT NULL,
                recorded_at   INTEGER NOT NULL,
                PRIMARY KEY (community_id, stat_date)
            );
            CREATE INDEX IF NOT EXISTS community_online_stats_date
                ON community_online_stats(stat_date);
            "#,
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>> {
        self.conn.lock().map_err(|_| anyhow!("rollup store lock poisoned"))
    }

    /// Insert or merge rows in one transaction. Peaks keep the larger value;
    /// online count and timestamp take the newest.
    pub fn upsert_many(&self, rows: &[DailyStat]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO community_online_stats
                    (community_id, stat_date, online_count, daily_peak, weekly_peak, monthly_peak, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(community_id, stat_date) DO UPDATE SET
                    online_count = excluded.online_count,
                    daily_peak   = MAX(daily_peak, excluded.daily_peak),
                    weekly_peak  = MAX(weekly_peak, excluded.weekly_peak),
                    monthly_peak = MAX(monthly_peak, excluded.monthly_peak),
                    recorded_at  = excluded.recorded_at",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.community_id,
                    row.stat_date.to_string(),
                    row.online_count as i64,
                    row.daily_peak as i64,
                    row.weekly_peak as i64,
                    row.monthly_peak as i64,
                    row.recorded_at.timestamp(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get(&self, community: &str, date: NaiveDate) -> Result<Option<DailyStat>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT community_id, stat_date, online_count, daily_peak, weekly_peak, monthly_peak, recorded_at
             FROM community_online_stats WHERE community_id = ?1 AND stat_date = ?2",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![community, date.to_string()], row_to_stat)?;
        let stat = rows.next().transpose()?;
        Ok(stat)
    }

    /// Most recent days first.
    pub fn history(&self, community: &str, limit: usize) -> Result<Vec<DailyStat>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT community_id, stat_date, online_count, daily_peak, weekly_peak, monthly_peak, recorded_at
             FROM community_online_stats WHERE community_id = ?1
             ORDER BY stat_date DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![community, limit as i64], row_to_stat)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn row_to_stat(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyStat> {
    let date: String = row.get(1)?;
    let stat_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let recorded: i64 = row.get(6)?;
    let recorded_at = DateTime::from_timestamp(recorded, 0).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(6, Type::Integer, "timestamp out of range".into())
    })?;
    Ok(DailyStat {
        community_id: row.get(0)?,
        stat_date,
        online_count: row.get::<_, i64>(2)? as u64,
        daily_peak: row.get::<_, i64>(3)? as u64,
        weekly_peak: row.get::<_, i64>(4)? as u64,
        monthly_peak: row.get::<_, i64>(5)? as u64,
        recorded_at,
    })
}

/// Copies live presence figures into a [`RollupStore`].
pub struct Rollup {
    tracker: Arc<PresenceTracker>,
    stats: Arc<RollupStore>,
    interval: Duration,
}

impl Rollup {
    pub fn new(tracker: Arc<PresenceTracker>, stats: Arc<RollupStore>, interval: Duration) -> Self {
        Self { tracker, stats, interval }
    }

    /// Record today's row for every online community. Returns rows written.
    pub async fn run_once(&self) -> Result<usize> {
        let now = self.tracker.now();
        let stat_date = now.date_naive();
        let mut rows = Vec::new();

        for community in self.tracker.online_communities().await {
            let online_count = self.tracker.online_count(&community).await;
            let peaks = self.tracker.peak_counts(&community).await;
            rows.push(DailyStat {
                community_id: community,
                stat_date,
                online_count,
                daily_peak: peaks.daily,
                weekly_peak: peaks.weekly,
                monthly_peak: peaks.monthly,
                recorded_at: now,
            });
        }

        if rows.is_empty() {
            debug!("Rollup found no online communities");
            return Ok(0);
        }
        self.stats.upsert_many(&rows).context("write daily online stats")?;
        info!(communities = rows.len(), date = %stat_date, "Rolled up online stats");
        Ok(rows.len())
    }

    /// Roll up every interval until shutdown.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let this = &self;
        run_periodic("stats-rollup", self.interval, shutdown, move || async move {
            if let Err(e) = this.run_once().await {
                warn!(error = %e, "Rollup pass failed");
            }
        })
        .await;
    }
}
