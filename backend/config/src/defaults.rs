//! Config defaults: fills every unset field so the effective config can be
//! shown or written out in full.

use std::path::PathBuf;

use pulse_core::{PresenceSettings, StoreSettings};

use crate::schema::{LoggingConfig, PresenceConfig, PulseConfig, SchedulerConfig, StoreConfig};

/// Default seconds between cleanup sweeps.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Default seconds between rollups into SQLite.
pub const DEFAULT_ROLLUP_INTERVAL_SECS: u64 = 300;

/// Default logging level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `~/.pulse/stats.db`, or `./stats.db` without a home directory.
pub fn default_rollup_db_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".pulse"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stats.db")
}

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: PulseConfig) -> PulseConfig {
    let config = apply_store_defaults(config);
    let config = apply_presence_defaults(config);
    let config = apply_scheduler_defaults(config);
    apply_logging_defaults(config)
}

fn apply_store_defaults(mut config: PulseConfig) -> PulseConfig {
    let base = StoreSettings::default();
    let store = config.store.get_or_insert_with(StoreConfig::default);
    store.backend.get_or_insert(base.backend);
    store.url.get_or_insert(base.url);
    store
        .connect_timeout_ms
        .get_or_insert(base.connect_timeout.as_millis() as u64);
    store
        .operation_timeout_ms
        .get_or_insert(base.operation_timeout.as_millis() as u64);
    store.retries.get_or_insert(base.retries);
    config
}

fn apply_presence_defaults(mut config: PulseConfig) -> PulseConfig {
    let base = PresenceSettings::default();
    let presence = config.presence.get_or_insert_with(PresenceConfig::default);
    presence.namespace.get_or_insert(base.namespace);
    presence
        .activity_timeout_secs
        .get_or_insert(base.activity_timeout.as_secs());
    presence.snapshot_ttl_secs.get_or_insert(base.snapshot_ttl.as_secs());
    presence.sweep_batch_size.get_or_insert(base.sweep_batch_size);
    config
}

fn apply_scheduler_defaults(mut config: PulseConfig) -> PulseConfig {
    let scheduler = config.scheduler.get_or_insert_with(SchedulerConfig::default);
    scheduler.enabled.get_or_insert(true);
    scheduler
        .cleanup_interval_secs
        .get_or_insert(DEFAULT_CLEANUP_INTERVAL_SECS);
    scheduler
        .rollup_interval_secs
        .get_or_insert(DEFAULT_ROLLUP_INTERVAL_SECS);
    if scheduler.rollup_db_path.is_none() {
        scheduler.rollup_db_path = Some(default_rollup_db_path());
    }
    config
}

/// Ensure logging.level is set; file output stays off unless configured.
fn apply_logging_defaults(mut config: PulseConfig) -> PulseConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    logging.json.get_or_insert(false);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_section() {
        let config = apply_all_defaults(PulseConfig::default());
        let presence = config.presence.as_ref().unwrap();
        assert_eq!(presence.activity_timeout_secs, Some(300));
        assert_eq!(presence.snapshot_ttl_secs, Some(30));
        assert_eq!(config.store.as_ref().unwrap().operation_timeout_ms, Some(1500));
        assert_eq!(config.scheduler.as_ref().unwrap().cleanup_interval_secs, Some(60));
        assert_eq!(config.logging.as_ref().unwrap().level.as_deref(), Some("info"));
        assert!(config.logging.as_ref().unwrap().dir.is_none());
    }

    #[test]
    fn keeps_explicit_values() {
        let mut config = PulseConfig::default();
        config.presence = Some(PresenceConfig {
            activity_timeout_secs: Some(90),
            ..Default::default()
        });
        let config = apply_all_defaults(config);
        let presence = config.presence.unwrap();
        assert_eq!(presence.activity_timeout_secs, Some(90));
        assert_eq!(presence.namespace.as_deref(), Some("presence"));
    }
}
