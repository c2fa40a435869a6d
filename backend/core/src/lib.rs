pub mod error;
pub mod event;
pub mod message;
pub mod traits;
pub mod types;

pub use error::SupervisorError;
pub use event::StatusChanged;
pub use message::Command;
pub use traits::Component;
pub use types::{CommandResponse, StatusResponse, SupervisorStatus};
