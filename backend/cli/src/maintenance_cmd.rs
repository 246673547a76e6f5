//! CLI maintenance commands: the long-running `serve` and one-shot passes.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use pulse_presence::PresenceTracker;
use pulse_scheduler::{Rollup, RollupStore, Sweeper};
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::context::Context;
use crate::terminal_output::{note_success, note_warn, print_json, render_table};

/// Run the sweeper and rollup jobs until Ctrl-C.
pub async fn serve(ctx: &Context) -> Result<()> {
    let scheduler = ctx.config.scheduler_settings();
    if !scheduler.enabled {
        warn!("scheduler.enabled is false; nothing to run");
        return Ok(());
    }

    let tracker = ctx.tracker().await?;
    let stats = ctx.rollup_store()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = tokio::spawn(
        Sweeper::new(tracker.clone(), scheduler.cleanup_interval).run(shutdown_rx.clone()),
    );
    let rollup = tokio::spawn(
        Rollup::new(tracker, stats, scheduler.rollup_interval).run(shutdown_rx),
    );
    info!(
        cleanup_secs = scheduler.cleanup_interval.as_secs(),
        rollup_secs = scheduler.rollup_interval.as_secs(),
        db = %scheduler.rollup_db_path.display(),
        "Pulse maintenance running; Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Shutting down maintenance jobs");
    // Receivers are still held by both jobs.
    let _ = shutdown_tx.send(true);

    let (sweeper, rollup) = tokio::join!(sweeper, rollup);
    sweeper.context("Sweeper task panicked")?;
    rollup.context("Rollup task panicked")?;
    Ok(())
}

pub async fn sweep(tracker: &PresenceTracker, json: bool) -> Result<()> {
    let report = tracker.sweep().await;
    if json {
        return print_json(&report);
    }
    note_success(&format!(
        "swept {} communities, checked {} members, removed {}",
        report.communities, report.members_checked, report.removed
    ));
    Ok(())
}

pub async fn rollup(tracker: Arc<PresenceTracker>, stats: Arc<RollupStore>, json: bool) -> Result<()> {
    let interval = std::time::Duration::ZERO;
    let written = Rollup::new(tracker, stats, interval).run_once().await?;
    if json {
        return print_json(&json!({ "rowsWritten": written }));
    }
    if written == 0 {
        note_warn("no online communities; nothing rolled up");
    } else {
        note_success(&format!("recorded today's stats for {written} communities"));
    }
    Ok(())
}

/// Print stored daily rows for one community, newest first.
pub fn stats(stats: &RollupStore, community: &str, days: usize, json: bool) -> Result<()> {
    let history = stats.history(community, days)?;
    if json {
        return print_json(&history);
    }
    if history.is_empty() {
        note_warn(&format!("no rolled-up stats for {community}"));
        return Ok(());
    }
    let rows: Vec<Vec<String>> = history
        .iter()
        .map(|row| {
            vec![
                row.stat_date.to_string(),
                row.online_count.to_string(),
                row.daily_peak.to_string(),
                row.weekly_peak.to_string(),
                row.monthly_peak.to_string(),
            ]
        })
        .collect();
    print!("{}", render_table(&["Date", "Online", "Daily", "Weekly", "Monthly"], &rows));
    Ok(())
}
