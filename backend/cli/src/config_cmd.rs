//! CLI config commands.

use std::path::Path;

use anyhow::{bail, Result};
use pulse_config::{
    apply_all_defaults, collect_referenced_vars, load_raw, redact, write_config, PulseConfig,
};

use crate::terminal_output::{note_success, print_json};

/// Print the effective config with secrets masked.
pub async fn show(config: &PulseConfig, path: &Path, json: bool) -> Result<()> {
    let redacted = redact(&serde_json::to_value(config)?);
    if json {
        return print_json(&redacted);
    }
    print!("{}", render_show(&redacted, path, &load_raw(path).await?)?);
    Ok(())
}

/// YAML body with a header naming the source file and the env vars it reads.
fn render_show(redacted: &serde_json::Value, path: &Path, raw: &serde_json::Value) -> Result<String> {
    let mut out = format!("# effective config (source: {})\n", path.display());
    let vars = collect_referenced_vars(raw);
    if !vars.is_empty() {
        out.push_str(&format!("# env vars: {}\n", vars.join(", ")));
    }
    out.push_str(&serde_yaml::to_string(redacted)?);
    Ok(out)
}

/// Write a fully defaulted config file.
pub async fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite (a backup is kept)", path.display());
    }
    write_config(&apply_all_defaults(PulseConfig::default()), path).await?;
    note_success(&format!("wrote {}", path.display()));
    Ok(())
}
