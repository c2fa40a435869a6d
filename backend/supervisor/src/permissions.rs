//! Execute-permission repair for the proxy binary.
//!
//! Packaging can strip the execute bit from bundled binaries. A failed repair
//! is reported to the caller, which logs it and spawns anyway.

use std::path::Path;

use spoofbar_core::SupervisorError;

/// Mode applied when the binary has no execute bit.
#[cfg(unix)]
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Make `path` executable if it is not already.
///
/// Returns `Ok(true)` when the mode was changed.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> Result<bool, SupervisorError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| SupervisorError::PermissionFixFailure(format!("{}: {}", path.display(), e)))?;
    if metadata.permissions().mode() & 0o111 != 0 {
        return Ok(false);
    }
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(EXECUTABLE_MODE))
        .map_err(|e| SupervisorError::PermissionFixFailure(format!("{}: {}", path.display(), e)))?;
    Ok(true)
}

#[cfg(not(unix))]
pub fn ensure_executable(_path: &Path) -> Result<bool, SupervisorError> {
    Ok(false)
}
