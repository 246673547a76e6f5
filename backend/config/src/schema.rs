//! Pulse runtime configuration schema.
//!
//! Every field is optional on disk; [`crate::defaults`] fills the gaps after
//! parsing, and the accessor methods below turn sections into the settings
//! types the runtime crates consume.

use std::path::PathBuf;
use std::time::Duration;

use pulse_core::{PresenceSettings, StoreBackend, StoreSettings};
use pulse_logging::LogOptions;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration, as read from `pulse.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseConfig {
    /// Presence store connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,

    /// Tracker tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceConfig>,

    /// Background sweep and rollup jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<StoreBackend>,
    /// `redis://[:password@]host[:port][/db]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_timeout_ms: Option<u64>,
    /// Reconnect attempts made by the connection manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceConfig {
    /// Key prefix shared by every presence key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup_interval_secs: Option<u64>,
    /// SQLite file holding the daily online statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup_db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `trace` | `debug` | `info` | `warn` | `error`, or any `EnvFilter` directive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for rolling log files; console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

/// Resolved scheduler section.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub cleanup_interval: Duration,
    pub rollup_interval: Duration,
    pub rollup_db_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

impl PulseConfig {
    pub fn store_settings(&self) -> StoreSettings {
        let base = StoreSettings::default();
        let Some(store) = &self.store else { return base };
        StoreSettings {
            backend: store.backend.unwrap_or(base.backend),
            url: store.url.clone().unwrap_or(base.url),
            connect_timeout: store
                .connect_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(base.connect_timeout),
            operation_timeout: store
                .operation_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(base.operation_timeout),
            retries: store.retries.unwrap_or(base.retries),
        }
    }

    pub fn presence_settings(&self) -> PresenceSettings {
        let base = PresenceSettings::default();
        let Some(presence) = &self.presence else { return base };
        PresenceSettings {
            namespace: presence.namespace.clone().unwrap_or(base.namespace),
            activity_timeout: presence
                .activity_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(base.activity_timeout),
            snapshot_ttl: presence
                .snapshot_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(base.snapshot_ttl),
            sweep_batch_size: presence.sweep_batch_size.unwrap_or(base.sweep_batch_size),
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        let scheduler = self.scheduler.clone().unwrap_or_default();
        SchedulerSettings {
            enabled: scheduler.enabled.unwrap_or(true),
            cleanup_interval: Duration::from_secs(
                scheduler
                    .cleanup_interval_secs
                    .unwrap_or(crate::defaults::DEFAULT_CLEANUP_INTERVAL_SECS),
            ),
            rollup_interval: Duration::from_secs(
                scheduler
                    .rollup_interval_secs
                    .unwrap_or(crate::defaults::DEFAULT_ROLLUP_INTERVAL_SECS),
            ),
            rollup_db_path: scheduler
                .rollup_db_path
                .unwrap_or_else(crate::defaults::default_rollup_db_path),
        }
    }

    pub fn log_options(&self) -> LogOptions {
        let base = LogOptions::default();
        let Some(logging) = &self.logging else { return base };
        LogOptions {
            level: logging.level.clone().unwrap_or(base.level),
            dir: logging.dir.clone(),
            json: logging.json.unwrap_or(base.json),
        }
    }
}
