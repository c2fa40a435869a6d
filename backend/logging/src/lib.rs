//! Telemetry and structured logging components for SpoofBar.
//!
//! Handles console and rolling NDJSON file output, plus line logging of the
//! supervised proxy's stdout/stderr.

pub mod logger;
pub mod output_logger;

pub use logger::{init_logger, LoggerGuard};
pub use output_logger::{OutputLogger, OutputStream, OUTPUT_TARGET};
