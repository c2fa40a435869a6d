use serde::{Deserialize, Serialize};

/// The `status-changed` notification delivered to UI listeners.
///
/// `error` is always populated when the transition was caused by a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusChanged {
    pub fn started() -> Self {
        Self {
            running: true,
            error: None,
        }
    }

    pub fn stopped() -> Self {
        Self {
            running: false,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            running: false,
            error: Some(error.into()),
        }
    }
}

impl std::fmt::Display for StatusChanged {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.running, &self.error) {
            (true, _) => write!(f, "running"),
            (false, None) => write!(f, "stopped"),
            (false, Some(e)) => write!(f, "stopped: {}", e),
        }
    }
}
