//! Locating, reading and writing `config.yaml`.
//!
//! SpoofBar keeps a single file. `spoofbar init-config` is the only writer;
//! every other subcommand only reads it.

use crate::schema::SpoofBarConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.yaml";

/// `init-config --force` keeps this many previous files.
const MAX_BACKUPS: usize = 3;

/// `$SPOOFBAR_CONFIG_DIR`, else `~/.spoofbar`. Logs default to a `logs/`
/// directory under it.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SPOOFBAR_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".spoofbar"))
        .unwrap_or_else(|| PathBuf::from(".spoofbar"))
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read `config.yaml`. A controller that was never configured runs with the
/// built-in proxy settings, so a missing or blank file is not an error.
pub async fn load_config(path: &Path) -> Result<SpoofBarConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file; using built-in settings");
        return Ok(SpoofBarConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if raw.trim().is_empty() {
        debug!(path = %path.display(), "Config file is blank; using built-in settings");
        return Ok(SpoofBarConfig::default());
    }

    let config: SpoofBarConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("Invalid SpoofBar config at {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Write the file `init-config` produces.
///
/// The YAML goes to a sibling temp file first and is renamed into place, so a
/// reader never sees a half-written config. An existing file becomes
/// `config.yaml.bak.1`.
pub async fn write_config(config: &SpoofBarConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    if path.exists() {
        rotate_backups(path).await;
    }

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to move config into place at {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

fn backup_path(path: &Path, n: usize) -> PathBuf {
    path.with_extension(format!("yaml.bak.{}", n))
}

/// Shift `.bak.N` up by one (dropping the oldest) and copy the current file to `.bak.1`.
async fn rotate_backups(path: &Path) {
    for n in (1..MAX_BACKUPS).rev() {
        let older = backup_path(path, n);
        if older.exists() {
            if let Err(e) = fs::rename(&older, backup_path(path, n + 1)).await {
                warn!(path = %older.display(), error = %e, "Failed to rotate config backup");
            }
        }
    }

    let newest = backup_path(path, 1);
    if let Err(e) = fs::copy(path, &newest).await {
        warn!(path = %newest.display(), error = %e, "Failed to back up config");
    }
}
