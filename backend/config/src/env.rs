//! Environment handling for config values.
//!
//! - `${VAR_NAME}` references in string values are resolved at load time.
//!   Only uppercase `[A-Z_][A-Z0-9_]*` names are matched; `$${VAR}` escapes
//!   to a literal `${VAR}`.
//! - `SPOOFBAR_*` variables override individual fields after substitution.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::schema::SpoofBarConfig;

/// Matches `${VAR}` with an optional leading `$` (the escape form).
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

pub const ENV_EXECUTABLE: &str = "SPOOFBAR_EXECUTABLE";
pub const ENV_PACKAGED: &str = "SPOOFBAR_PACKAGED";
pub const ENV_BIND: &str = "SPOOFBAR_BIND";
pub const ENV_PORT: &str = "SPOOFBAR_PORT";
pub const ENV_LOG_LEVEL: &str = "SPOOFBAR_LOG_LEVEL";

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute `${VAR}` references using a provided map.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let var_name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{var_name}}}");
        }
        match env.get(var_name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: var_name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Apply `SPOOFBAR_*` overrides on top of the file config.
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides(mut config: SpoofBarConfig, env: &HashMap<String, String>) -> SpoofBarConfig {
    if let Some(path) = env.get(ENV_EXECUTABLE).filter(|v| !v.is_empty()) {
        debug!(path = %path, "Executable overridden from environment");
        config.proxy.executable = Some(PathBuf::from(path));
    }
    if let Some(raw) = env.get(ENV_PACKAGED) {
        match parse_bool(raw) {
            Some(packaged) => config.proxy.packaged = packaged,
            None => warn!(var = ENV_PACKAGED, value = %raw, "Ignoring unparseable boolean"),
        }
    }
    if let Some(bind) = env.get(ENV_BIND).filter(|v| !v.is_empty()) {
        config.server.bind = bind.clone();
    }
    if let Some(raw) = env.get(ENV_PORT) {
        match raw.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!(var = ENV_PORT, value = %raw, "Ignoring unparseable port"),
        }
    }
    if let Some(level) = env.get(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
        config.logging.level = level.clone();
    }
    config
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
