pub mod config;
pub mod permissions;
pub mod process;
pub mod stderr_buffer;
pub mod supervisor;
pub mod timeout_kill;

pub use config::SupervisorConfig;
pub use supervisor::{Supervisor, SupervisorHandle};
