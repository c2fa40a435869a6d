//! `spoofbar-config`: SpoofBar controller configuration.
//!
//! Provides:
//! - Typed config schema (proxy binary, control server, logging)
//! - YAML read/write with backup rotation
//! - `${ENV_VAR}` substitution and `SPOOFBAR_*` overrides
//! - Packaged vs. development executable resolution
//! - Default value application and validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod resolve;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use resolve::resolve_executable;
pub use schema::{LoggingConfig, ProxyConfig, ServerConfig, SpoofBarConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Load a config file, substitute env vars, apply overrides and defaults, then validate.
/// Fails if validation reports errors.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<SpoofBarConfig> {
    let raw_config = load_config(path).await?;
    let env: HashMap<String, String> = std::env::vars().collect();
    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
    prepare(raw_config, &env, config_dir)
}

/// The env-independent half of [`load_and_prepare`].
pub fn prepare(
    config: SpoofBarConfig,
    env: &HashMap<String, String>,
    config_dir: &Path,
) -> Result<SpoofBarConfig> {
    let value: Value =
        serde_json::to_value(&config).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars_with(&value, env).context("Failed to resolve env vars in config")?;
    let config: SpoofBarConfig = serde_json::from_value(value)
        .context("Failed to deserialize config after processing")?;

    let config = apply_env_overrides(config, env);
    let config = apply_all_defaults(config, config_dir);

    let report = validate(&config);
    if !report.is_valid() {
        log_report(&report);
        anyhow::bail!("{} config error(s); first: {}", report.errors.len(), report.errors[0]);
    }

    Ok(config)
}

/// Validate `config` and log every warning and error.
///
/// Call once logging is initialized; loading happens before that.
pub fn log_validation(config: &SpoofBarConfig) -> ValidationReport {
    let report = validate(config);
    log_report(&report);
    report
}

fn log_report(report: &ValidationReport) {
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
    use std::path::PathBuf;

    #[test]
    fn prepare_applies_substitution_overrides_and_defaults() {
        let mut config = SpoofBarConfig::default();
        config.proxy.executable = Some(PathBuf::from("${PROXY_HOME}/spoofdpi"));
        let env: HashMap<String, String> = [
            ("PROXY_HOME".to_string(), "/opt/proxy".to_string()),
            ("SPOOFBAR_PORT".to_string(), "9000".to_string()),
        ]
        .into_iter()
        .collect();

        let config = prepare(config, &env, Path::new("/tmp/spoofbar")).unwrap();
        assert_eq!(config.proxy.executable, Some(PathBuf::from("/opt/proxy/spoofdpi")));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.dir, Some(PathBuf::from("/tmp/spoofbar/logs")));
    }

    #[test]
    fn prepare_rejects_invalid_config() {
        let mut config = SpoofBarConfig::default();
        config.proxy.stderr_limit_bytes = 0;
        let err = prepare(config, &HashMap::new(), Path::new("/tmp")).unwrap_err();
        assert!(err.to_string().contains("stderrLimitBytes"));
    }
}
