//! `pulse-config`: Pulse runtime configuration management.
//!
//! Provides:
//! - Typed config schema (store, presence, scheduler, logging)
//! - YAML read/write with backup rotation
//! - `${ENV_VAR}` substitution and `PULSE_*` overrides
//! - Config redaction for safe display
//! - Default value application
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{
    apply_env_overrides, collect_referenced_vars, resolve_env_vars, resolve_env_vars_with,
    MissingEnvVarError,
};
pub use io::{config_file_path, load_raw, write_config};
pub use redact::redact;
pub use schema::{PulseConfig, SchedulerSettings};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load a config file, substitute env vars, apply overrides and defaults, and validate.
///
/// Warnings are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<PulseConfig> {
    let raw = load_raw(path).await?;
    let value = resolve_env_vars(&raw).context("Failed to resolve env vars in config")?;
    prepare(value)
}

fn prepare(value: Value) -> Result<PulseConfig> {
    let config: PulseConfig =
        serde_json::from_value(value).context("Failed to deserialize config")?;
    let config = apply_all_defaults(apply_env_overrides(config));

    let report = validate(&config);
    log_report(&report);
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }
    Ok(config)
}

/// Emit every warning and error of a validation report through `tracing`.
pub fn log_report(report: &ValidationReport) {
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_file_with_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.yaml");
        std::fs::write(
            &path,
            "store:\n  backend: memory\npresence:\n  namespace: \"$${LITERAL}\"\n  activityTimeoutSecs: 90\n",
        )
        .unwrap();

        let config = load_and_prepare(&path).await.unwrap();
        let presence = config.presence_settings();
        assert_eq!(presence.namespace, "${LITERAL}");
        assert_eq!(presence.activity_timeout.as_secs(), 90);
        assert!(config.scheduler.is_some());
    }

    #[test]
    fn invalid_config_fails_to_prepare() {
        let value = serde_json::json!({ "presence": { "sweepBatchSize": 0 } });
        let err = prepare(value).unwrap_err();
        assert!(err.to_string().contains("presence.sweepBatchSize"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let value = serde_json::json!({ "store": { "backend": "postgres" } });
        assert!(prepare(value).is_err());
    }
}
