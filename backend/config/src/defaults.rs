//! Config defaults: constants and placement-dependent values filled in after load.

use std::path::Path;

use crate::schema::SpoofBarConfig;

pub const DEFAULT_DISPLAY_NAME: &str = "SpoofDPI";

#[cfg(windows)]
pub const DEFAULT_BINARY_NAME: &str = "spoofdpi.exe";
#[cfg(not(windows))]
pub const DEFAULT_BINARY_NAME: &str = "spoofdpi";

/// Stderr retained for diagnostics (64 KiB).
pub const DEFAULT_STDERR_LIMIT_BYTES: usize = 64 * 1024;

/// SIGTERM grace period before a forced kill.
pub const DEFAULT_STOP_GRACE_MS: u64 = 3_000;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 17890;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log directory name inside the config directory.
pub const LOG_DIR_NAME: &str = "logs";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: SpoofBarConfig, config_dir: &Path) -> SpoofBarConfig {
    let config = apply_proxy_defaults(config);
    apply_logging_defaults(config, config_dir)
}

/// Blank strings in the file mean "use the default".
fn apply_proxy_defaults(mut config: SpoofBarConfig) -> SpoofBarConfig {
    if config.proxy.display_name.trim().is_empty() {
        config.proxy.display_name = DEFAULT_DISPLAY_NAME.to_string();
    }
    if config.proxy.binary_name.trim().is_empty() {
        config.proxy.binary_name = DEFAULT_BINARY_NAME.to_string();
    }
    config
}

/// Logs live next to the config file unless configured elsewhere.
fn apply_logging_defaults(mut config: SpoofBarConfig, config_dir: &Path) -> SpoofBarConfig {
    if config.logging.dir.is_none() {
        config.logging.dir = Some(config_dir.join(LOG_DIR_NAME));
    }
    if config.logging.level.trim().is_empty() {
        config.logging.level = DEFAULT_LOG_LEVEL.to_string();
    }
    config
}
