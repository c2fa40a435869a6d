//! Proxy Output Logger
//!
//! The supervised proxy's stdout is informational only; its stderr is
//! diagnostic. Both are forwarded line by line under a dedicated target so
//! they can be filtered with `RUST_LOG=proxy_output=...`.

use tracing::{info, warn};

/// `tracing` target for child process output.
pub const OUTPUT_TARGET: &str = "proxy_output";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

pub struct OutputLogger;

impl OutputLogger {
    /// Log one line of child output. Trailing line breaks are stripped; blank lines are skipped.
    pub fn log_line(pid: Option<u32>, generation: u64, stream: OutputStream, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return;
        }
        match stream {
            OutputStream::Stdout => {
                info!(target: OUTPUT_TARGET, pid = ?pid, generation, stream = stream.as_str(), "{}", line)
            }
            OutputStream::Stderr => {
                warn!(target: OUTPUT_TARGET, pid = ?pid, generation, stream = stream.as_str(), "{}", line)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_names() {
        assert_eq!(OutputStream::Stdout.as_str(), "stdout");
        assert_eq!(OutputStream::Stderr.as_str(), "stderr");
    }

    #[test]
    fn logging_without_subscriber_is_harmless() {
        OutputLogger::log_line(Some(1), 1, OutputStream::Stderr, "listening on :8080\r\n");
        OutputLogger::log_line(None, 2, OutputStream::Stdout, "\n");
    }
}
