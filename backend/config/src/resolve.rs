//! Locating the proxy binary for packaged and development placements.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::schema::ProxyConfig;

/// Resolve the proxy executable path.
///
/// Priority: explicit `executable` > packaged resources directory >
/// development directory.
pub fn resolve_executable(proxy: &ProxyConfig) -> Result<PathBuf> {
    if let Some(path) = &proxy.executable {
        return Ok(path.clone());
    }

    let dir = if proxy.packaged {
        match &proxy.resources_dir {
            Some(dir) => dir.clone(),
            None => packaged_resources_dir(&current_exe_dir()?),
        }
    } else {
        match &proxy.dev_dir {
            Some(dir) => dir.clone(),
            None => current_exe_dir()?,
        }
    };

    Ok(dir.join(&proxy.binary_name))
}

fn current_exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Resources of an installed app: `<App>.app/Contents/Resources` when running
/// from `<App>.app/Contents/MacOS`, otherwise the executable's own directory.
pub fn packaged_resources_dir(exe_dir: &Path) -> PathBuf {
    if exe_dir.file_name().is_some_and(|name| name == "MacOS") {
        if let Some(contents) = exe_dir.parent() {
            return contents.join("Resources");
        }
    }
    exe_dir.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_executable_wins() {
        let proxy = ProxyConfig {
            executable: Some(PathBuf::from("/opt/spoofdpi")),
            packaged: true,
            resources_dir: Some(PathBuf::from("/ignored")),
            ..Default::default()
        };
        assert_eq!(resolve_executable(&proxy).unwrap(), PathBuf::from("/opt/spoofdpi"));
    }

    #[test]
    fn packaged_uses_resources_dir() {
        let proxy = ProxyConfig {
            packaged: true,
            resources_dir: Some(PathBuf::from("/Applications/SpoofBar.app/Contents/Resources")),
            binary_name: "spoofdpi".into(),
            ..Default::default()
        };
        assert_eq!(
            resolve_executable(&proxy).unwrap(),
            PathBuf::from("/Applications/SpoofBar.app/Contents/Resources/spoofdpi")
        );
    }

    #[test]
    fn development_uses_dev_dir() {
        let proxy = ProxyConfig {
            dev_dir: Some(PathBuf::from("/src/spoofbar")),
            binary_name: "spoofdpi".into(),
            ..Default::default()
        };
        assert_eq!(
            resolve_executable(&proxy).unwrap(),
            PathBuf::from("/src/spoofbar/spoofdpi")
        );
    }

    #[test]
    fn development_defaults_next_to_executable() {
        let proxy = ProxyConfig::default();
        let resolved = resolve_executable(&proxy).unwrap();
        let exe_dir = std::env::current_exe().unwrap().parent().unwrap().to_path_buf();
        assert_eq!(resolved, exe_dir.join(&proxy.binary_name));
    }

    #[test]
    fn bundle_layout_maps_to_resources() {
        assert_eq!(
            packaged_resources_dir(Path::new("/Applications/SpoofBar.app/Contents/MacOS")),
            PathBuf::from("/Applications/SpoofBar.app/Contents/Resources")
        );
        assert_eq!(
            packaged_resources_dir(Path::new("/usr/lib/spoofbar")),
            PathBuf::from("/usr/lib/spoofbar")
        );
    }
}
