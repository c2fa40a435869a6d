use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use spoofbar_config::{resolve_executable, ProxyConfig};

/// Everything the supervisor needs to launch and stop the proxy.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Name used in command responses.
    pub display_name: String,
    /// Resolved path of the proxy binary.
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Try to set the execute bit before spawning.
    pub ensure_executable: bool,
    /// Cap on retained stderr bytes.
    pub stderr_limit: usize,
    /// SIGTERM grace before a forced kill.
    pub stop_grace: Duration,
}

impl SupervisorConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::from_proxy(&ProxyConfig::default(), PathBuf::new())
        }
    }

    /// Build from the `proxy` config section, resolving the binary location.
    pub fn from_proxy_config(proxy: &ProxyConfig) -> Result<Self> {
        Ok(Self::from_proxy(proxy, resolve_executable(proxy)?))
    }

    fn from_proxy(proxy: &ProxyConfig, executable: PathBuf) -> Self {
        Self {
            display_name: proxy.display_name.clone(),
            executable,
            args: proxy.args.clone(),
            ensure_executable: proxy.ensure_executable,
            stderr_limit: proxy.stderr_limit_bytes,
            stop_grace: Duration::from_millis(proxy.stop_grace_ms),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }
}
