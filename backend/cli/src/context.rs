use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use pulse_config::{config_file_path, load_and_prepare, log_report, validate, PulseConfig};
use pulse_logging::{init_logger, redact_credentials};
use pulse_presence::PresenceTracker;
use pulse_scheduler::RollupStore;
use tracing::info;

/// Effective configuration plus the handles commands build from it.
pub struct Context {
    pub config: PulseConfig,
    pub config_path: PathBuf,
}

impl Context {
    /// Load config (file, `${VAR}`s, `PULSE_*` overrides, defaults) and start logging.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = config_file_path(explicit);
        let config = load_and_prepare(&config_path)
            .await
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        init_logger(&config.log_options());
        // Warnings found while loading predate the subscriber.
        log_report(&validate(&config));

        Ok(Self { config, config_path })
    }

    pub async fn tracker(&self) -> Result<Arc<PresenceTracker>> {
        let store_settings = self.config.store_settings();
        let store = pulse_infra::connect_store(&store_settings)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to {} store at {}",
                    store_settings.backend,
                    redact_credentials(&store_settings.url)
                )
            })?;
        let tracker = PresenceTracker::new(store, self.config.presence_settings());
        info!(
            store = tracker.store_name(),
            namespace = %tracker.settings().namespace,
            "Presence tracker ready"
        );
        Ok(Arc::new(tracker))
    }

    pub fn rollup_store(&self) -> Result<Arc<RollupStore>> {
        let path = self.config.scheduler_settings().rollup_db_path;
        Ok(Arc::new(RollupStore::open(&path)?))
    }
}
