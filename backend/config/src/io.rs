//! Config file read/write with atomic backup rotation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::env::ENV_CONFIG_PATH;
use crate::schema::PulseConfig;

/// Config file looked up in the working directory by default.
pub const CONFIG_FILE_NAME: &str = "pulse.yaml";

/// Number of rolling backups to keep.
const MAX_BACKUPS: usize = 3;

/// Resolve which config file to read.
/// Priority: explicit path > `PULSE_CONFIG` env > `./pulse.yaml`
pub fn config_file_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var(ENV_CONFIG_PATH) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(CONFIG_FILE_NAME),
    }
}

/// Read the config file as an untyped value tree, ready for `${VAR}` substitution.
///
/// Returns an empty object if the file doesn't exist.
pub async fn load_raw(path: &Path) -> Result<Value> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(if value.is_null() { Value::Object(Default::default()) } else { value })
}

/// Write config to disk atomically (write to temp file, rename).
///
/// Creates a rolling backup of the previous config before overwriting.
pub async fn write_config(config: &PulseConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    if path.exists() {
        rotate_backups(path).await;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;

    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

/// Rotate backup files: pulse.yaml.bak.1 → .bak.2 → ... → .bak.N
async fn rotate_backups(path: &Path) {
    for i in (1..MAX_BACKUPS).rev() {
        let old = path.with_extension(format!("yaml.bak.{i}"));
        let new = path.with_extension(format!("yaml.bak.{}", i + 1));
        if old.exists() {
            if let Err(e) = fs::rename(&old, &new).await {
                warn!(backup = %old.display(), error = %e, "Failed to rotate config backup");
            }
        }
    }

    let bak = path.with_extension("yaml.bak.1");
    if let Err(e) = fs::copy(path, &bak).await {
        warn!(backup = %bak.display(), error = %e, "Failed to back up config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let path = config_file_path(Some(Path::new("/etc/pulse/prod.yaml")));
        assert_eq!(path, PathBuf::from("/etc/pulse/prod.yaml"));
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let value = load_raw(&dir.path().join("absent.yaml")).await.unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[tokio::test]
    async fn empty_file_loads_as_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.yaml");
        std::fs::write(&path, "").unwrap();
        assert_eq!(load_raw(&path).await.unwrap(), serde_json::json!({}));
    }

    #[tokio::test]
    async fn write_then_load_keeps_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("pulse.yaml");

        let mut config = PulseConfig::default();
        config.logging = Some(crate::schema::LoggingConfig {
            level: Some("warn".into()),
            ..Default::default()
        });
        write_config(&config, &path).await.unwrap();
        write_config(&PulseConfig::default(), &path).await.unwrap();

        let backup = std::fs::read_to_string(path.with_extension("yaml.bak.1")).unwrap();
        assert!(backup.contains("level: warn"));
        assert_eq!(load_raw(&path).await.unwrap(), serde_json::json!({}));
    }

    #[tokio::test]
    async fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.yaml");
        std::fs::write(&path, "store: [unclosed").unwrap();
        let err = load_raw(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config YAML"));
    }
}
