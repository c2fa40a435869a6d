//! SpoofBar configuration schema, typed for serde YAML/JSON deserialization.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::defaults::{
    DEFAULT_BIND, DEFAULT_BINARY_NAME, DEFAULT_DISPLAY_NAME, DEFAULT_LOG_LEVEL, DEFAULT_PORT,
    DEFAULT_STDERR_LIMIT_BYTES, DEFAULT_STOP_GRACE_MS,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for SpoofBar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpoofBarConfig {
    /// The supervised proxy binary
    pub proxy: ProxyConfig,

    /// Local control API
    pub server: ServerConfig,

    /// Log output
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Proxy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    /// Name used in user-facing messages ("SpoofDPI is already running").
    pub display_name: String,

    /// Explicit path to the proxy binary. Wins over placement-based resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// File name of the binary inside the resources or development directory.
    pub binary_name: String,

    /// Whether the controller runs from an installed package.
    pub packaged: bool,

    /// Installed resources directory. Defaults to the app bundle's resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources_dir: Option<PathBuf>,

    /// Development directory. Defaults to the directory of the running executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_dir: Option<PathBuf>,

    /// Extra arguments. The proxy is normally started with none.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Set the execute bit on the binary before spawning when it is missing.
    pub ensure_executable: bool,

    /// Maximum stderr bytes retained for crash diagnostics (tail is kept).
    pub stderr_limit_bytes: usize,

    /// How long `stop` lets the proxy exit on SIGTERM before it is killed.
    pub stop_grace_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            executable: None,
            binary_name: DEFAULT_BINARY_NAME.to_string(),
            packaged: false,
            resources_dir: None,
            dev_dir: None,
            args: Vec::new(),
            ensure_executable: true,
            stderr_limit_bytes: DEFAULT_STDERR_LIMIT_BYTES,
            stop_grace_ms: DEFAULT_STOP_GRACE_MS,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,

    /// Directory for the rolling NDJSON log file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            dir: None,
        }
    }
}
