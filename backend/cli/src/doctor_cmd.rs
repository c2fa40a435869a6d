//! CLI Doctor Command
//!
//! Checks that the controller can find and launch the proxy binary.

use std::path::Path;

use anyhow::Result;
use spoofbar_config::{resolve_executable, validate, SpoofBarConfig};

/// Executes the full doctor diagnosis. Returns whether every check passed.
pub async fn run(config: &SpoofBarConfig, config_path: &Path) -> Result<bool> {
    println!("\nRunning SpoofBar doctor...\n");
    println!("Config: {}", config_path.display());

    let is_ok = check_config(config) & check_executable(config) & check_server(config).await;

    println!();
    if is_ok {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Fix the errors above.");
    }

    Ok(is_ok)
}

fn check_config(config: &SpoofBarConfig) -> bool {
    println!("Configuration:");
    let report = validate(config);
    for warning in &report.warnings {
        println!("  [warn]  {}: {}", warning.path, warning.message);
    }
    for error in &report.errors {
        println!("  [error] {}: {}", error.path, error.message);
    }
    if report.errors.is_empty() && report.warnings.is_empty() {
        println!("  [ok]    no problems found");
    }
    report.is_valid()
}

fn check_executable(config: &SpoofBarConfig) -> bool {
    println!("Proxy binary:");
    let path = match resolve_executable(&config.proxy) {
        Ok(path) => path,
        Err(e) => {
            println!("  [error] could not resolve: {}", e);
            return false;
        }
    };
    if !path.is_file() {
        println!("  [error] {} does not exist", path.display());
        return false;
    }
    if is_executable(&path) {
        println!("  [ok]    {}", path.display());
    } else if config.proxy.ensure_executable {
        println!("  [warn]  {} is not executable; it will be fixed on start", path.display());
    } else {
        println!("  [error] {} is not executable", path.display());
        return false;
    }
    true
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

async fn check_server(config: &SpoofBarConfig) -> bool {
    println!("Control API:");
    let addr = config.server.address();
    match tokio::net::TcpListener::bind(&addr).await {
        Ok(_) => println!("  [ok]    {} is free", addr),
        Err(e) => println!("  [info]  {} is in use ({}); a controller may already be running", addr, e),
    }
    true
}
