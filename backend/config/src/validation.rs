//! Config validation with user-friendly error messages.

use crate::resolve::resolve_executable;
use crate::schema::SpoofBarConfig;
use thiserror::Error;

/// Grace periods above this are almost certainly a unit mistake.
const MAX_REASONABLE_GRACE_MS: u64 = 60_000;

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

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &SpoofBarConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_proxy(config, &mut report);
    validate_server(config, &mut report);
    report
}

fn validate_proxy(config: &SpoofBarConfig, report: &mut ValidationReport) {
    let proxy = &config.proxy;
    if proxy.stderr_limit_bytes == 0 {
        report.error("proxy.stderrLimitBytes", "stderrLimitBytes must be > 0");
    }
    if proxy.stop_grace_ms > MAX_REASONABLE_GRACE_MS {
        report.warn(
            "proxy.stopGraceMs",
            format!("{} ms is a long stop grace period", proxy.stop_grace_ms),
        );
    }
    if proxy.executable.is_none() && proxy.binary_name.contains(['/', '\\']) {
        report.error("proxy.binaryName", "binaryName must be a file name, not a path");
    }
    match resolve_executable(proxy) {
        Ok(path) if !path.exists() => report.warn(
            "proxy.executable",
            format!("{} not found; start will fail until it exists", path.display()),
        ),
        Ok(_) => {}
        Err(e) => report.error("proxy.executable", e.to_string()),
    }
}

fn validate_server(config: &SpoofBarConfig, report: &mut ValidationReport) {
    if config.server.port == 0 {
        report.error("server.port", "port must be > 0");
    }
    if config.server.bind.trim().is_empty() {
        report.error("server.bind", "bind address cannot be empty");
    } else if config.server.bind != "127.0.0.1" && config.server.bind != "localhost" {
        report.warn(
            "server.bind",
            format!("Control API bound to {}; anyone who can reach it can toggle the proxy", config.server.bind),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_config_has_no_errors() {
        let report = validate(&SpoofBarConfig::default());
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn missing_binary_is_a_warning() {
        let mut config = SpoofBarConfig::default();
        config.proxy.executable = Some(PathBuf::from("/definitely/not/here/spoofdpi"));
        let report = validate(&config);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.path == "proxy.executable"));
    }

    #[test]
    fn rejects_zero_port_and_limit() {
        let mut config = SpoofBarConfig::default();
        config.server.port = 0;
        config.proxy.stderr_limit_bytes = 0;
        let report = validate(&config);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"server.port"));
        assert!(paths.contains(&"proxy.stderrLimitBytes"));
    }

    #[test]
    fn warns_on_public_bind() {
        let mut config = SpoofBarConfig::default();
        config.server.bind = "0.0.0.0".into();
        let report = validate(&config);
        assert!(report.warnings.iter().any(|w| w.path == "server.bind"));
    }
}
