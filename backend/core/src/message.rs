use tokio::sync::oneshot;

use crate::error::SupervisorError;
use crate::types::SupervisorStatus;

/// Result of a `start`/`stop` command: the success message, or why it was refused.
pub type CommandResult = Result<String, SupervisorError>;

/// Commands accepted by the supervisor's event loop.
///
/// Each carries a reply channel; the loop answers before it handles the next
/// message, so a reply always precedes any notification caused afterwards.
#[derive(Debug)]
pub enum Command {
    Start {
        reply: oneshot::Sender<CommandResult>,
    },
    Stop {
        reply: oneshot::Sender<CommandResult>,
    },
    Status {
        reply: oneshot::Sender<SupervisorStatus>,
    },
    /// Stop any live process and leave the event loop.
    Shutdown { reply: oneshot::Sender<()> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Stop { .. } => "stop",
            Command::Status { .. } => "status",
            Command::Shutdown { .. } => "shutdown",
        }
    }
}
