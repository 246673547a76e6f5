//! Config validation: range and consistency checks with user-friendly messages.

use std::time::Duration;

use thiserror::Error;

use crate::schema::PulseConfig;
use pulse_core::StoreBackend;

/// Shortest activity timeout accepted.
pub const MIN_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Below this, members flicker offline between client heartbeats.
const RECOMMENDED_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Largest sweep batch accepted.
pub const MAX_SWEEP_BATCH_SIZE: usize = 10_000;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the effective config and return a report of all errors and warnings.
pub fn validate(config: &PulseConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_store(config, &mut report);
    validate_presence(config, &mut report);
    validate_scheduler(config, &mut report);
    report
}

fn validate_store(config: &PulseConfig, report: &mut ValidationReport) {
    let store = config.store_settings();
    if store.connect_timeout.is_zero() {
        report.error("store.connectTimeoutMs", "must be > 0");
    }
    if store.operation_timeout.is_zero() {
        report.error("store.operationTimeoutMs", "must be > 0");
    }
    if store.backend == StoreBackend::Redis
        && !(store.url.starts_with("redis://") || store.url.starts_with("rediss://"))
    {
        report.error("store.url", "redis backend needs a redis:// or rediss:// URL");
    }
}

fn validate_presence(config: &PulseConfig, report: &mut ValidationReport) {
    let presence = config.presence_settings();
    if presence.namespace.trim().is_empty() {
        report.error("presence.namespace", "cannot be empty");
    }
    if presence.activity_timeout < MIN_ACTIVITY_TIMEOUT {
        report.error(
            "presence.activityTimeoutSecs",
            format!("must be at least {}", MIN_ACTIVITY_TIMEOUT.as_secs()),
        );
    } else if presence.activity_timeout < RECOMMENDED_ACTIVITY_TIMEOUT {
        report.warn(
            "presence.activityTimeoutSecs",
            "under 60s; members may drop offline between heartbeats",
        );
    }
    if presence.snapshot_ttl.is_zero() {
        report.error("presence.snapshotTtlSecs", "must be > 0");
    } else if presence.snapshot_ttl > presence.activity_timeout {
        report.warn(
            "presence.snapshotTtlSecs",
            "longer than the activity timeout; cached snapshots outlive presence",
        );
    }
    if !(1..=MAX_SWEEP_BATCH_SIZE).contains(&presence.sweep_batch_size) {
        report.error(
            "presence.sweepBatchSize",
            format!("must be between 1 and {MAX_SWEEP_BATCH_SIZE}"),
        );
    }
}

fn validate_scheduler(config: &PulseConfig, report: &mut ValidationReport) {
    let scheduler = config.scheduler_settings();
    if scheduler.cleanup_interval.is_zero() {
        report.error("scheduler.cleanupIntervalSecs", "must be > 0");
    } else if scheduler.cleanup_interval > config.presence_settings().activity_timeout {
        report.warn(
            "scheduler.cleanupIntervalSecs",
            "longer than the activity timeout; stale members linger between sweeps",
        );
    }
    if scheduler.rollup_interval.is_zero() {
        report.error("scheduler.rollupIntervalSecs", "must be > 0");
    }
}
