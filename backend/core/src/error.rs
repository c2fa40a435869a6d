use thiserror::Error;

/// Failures surfaced by the process supervisor.
///
/// Every variant is recovered at the supervisor boundary and turned into a
/// command response or a `status-changed` notification; none is fatal to the
/// controller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SupervisorError {
    /// `start` while a process is live. Carries the proxy display name.
    #[error("{0} is already running")]
    AlreadyRunning(String),

    /// `stop` while no process is live. Carries the proxy display name.
    #[error("{0} is not running")]
    NotRunning(String),

    /// The OS refused to create the child process.
    #[error("{0}")]
    SpawnFailure(String),

    /// The child terminated with a non-zero status.
    #[error("{0}")]
    AbnormalExit(String),

    /// Setting the execute bit on the proxy binary failed. Logged only.
    #[error("could not set execute permission: {0}")]
    PermissionFixFailure(String),

    /// The supervisor task has shut down and no longer accepts commands.
    #[error("process supervisor is unavailable")]
    Unavailable,
}

impl SupervisorError {
    /// Rejected commands are caller mistakes, not proxy failures.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::AlreadyRunning(_) | Self::NotRunning(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            SupervisorError::AlreadyRunning("SpoofDPI".into()).to_string(),
            "SpoofDPI is already running"
        );
        assert_eq!(
            SupervisorError::NotRunning("SpoofDPI".into()).to_string(),
            "SpoofDPI is not running"
        );
        assert_eq!(
            SupervisorError::SpawnFailure("No such file or directory (os error 2)".into())
                .to_string(),
            "No such file or directory (os error 2)"
        );
    }

    #[test]
    fn test_rejection_kinds() {
        assert!(SupervisorError::AlreadyRunning("x".into()).is_rejection());
        assert!(SupervisorError::NotRunning("x".into()).is_rejection());
        assert!(!SupervisorError::SpawnFailure("x".into()).is_rejection());
        assert!(!SupervisorError::Unavailable.is_rejection());
    }
}
