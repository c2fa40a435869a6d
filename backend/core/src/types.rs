use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::CommandResult;

/// Response shape for the `start` and `stop` commands.
///
/// `message` is always populated, on success and on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<CommandResult> for CommandResponse {
    fn from(result: CommandResult) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Snapshot of the supervisor state.
///
/// `last_error` is only ever set while `running` is false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorStatus {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl SupervisorStatus {
    /// Seconds since the current process was spawned.
    pub fn uptime_secs(&self) -> Option<i64> {
        self.started_at
            .map(|started| (Utc::now() - started).num_seconds().max(0))
    }
}

/// Response shape for `getStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<i64>,
}

impl From<&SupervisorStatus> for StatusResponse {
    fn from(status: &SupervisorStatus) -> Self {
        Self {
            running: status.running,
            error: status.last_error.clone(),
            pid: status.pid,
            uptime_secs: status.uptime_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SupervisorError;

    #[test]
    fn test_response_from_result() {
        let ok: CommandResponse = Ok::<_, SupervisorError>("SpoofDPI started successfully".to_string()).into();
        assert!(ok.success);
        assert_eq!(ok.message, "SpoofDPI started successfully");

        let err: CommandResponse = Err(SupervisorError::NotRunning("SpoofDPI".into())).into();
        assert!(!err.success);
        assert_eq!(err.message, "SpoofDPI is not running");
    }

    #[test]
    fn test_status_response_shape() {
        let status = SupervisorStatus {
            running: false,
            last_error: Some("Process exited with code 1".into()),
            pid: None,
            started_at: None,
        };
        let json = serde_json::to_value(StatusResponse::from(&status)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"running": false, "error": "Process exited with code 1"})
        );
    }

    #[test]
    fn test_uptime() {
        let status = SupervisorStatus {
            running: true,
            last_error: None,
            pid: Some(42),
            started_at: Some(Utc::now() - chrono::Duration::seconds(5)),
        };
        assert!(status.uptime_secs().unwrap() >= 5);
        assert_eq!(SupervisorStatus::default().uptime_secs(), None);
    }
}
