//! One OS instance of the proxy, and the watcher task that observes it.
//!
//! The watcher owns the `Child`. It reports exactly one [`ProcessEvent`] per
//! spawn, tagged with the spawn's generation, whether the process died on its
//! own or was terminated through [`ProcessHandle::terminate`].

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use spoofbar_logging::{OutputLogger, OutputStream};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::config::SupervisorConfig;
use crate::stderr_buffer::StderrBuffer;
use crate::timeout_kill;

/// Longest single log line; longer output is logged in pieces.
const MAX_LINE_BYTES: u64 = 8 * 1024;

/// How long to keep reading output after the child has exited. Descendants
/// that inherited the pipes can keep them open indefinitely.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// How a process instance ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    /// Retained stderr tail.
    pub stderr: String,
}

impl ExitReport {
    pub fn from_status(status: ExitStatus, stderr: String) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            stderr,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// `None` for a clean exit. Otherwise the captured stderr, or a generic
    /// description when nothing was written to it.
    pub fn error_message(&self) -> Option<String> {
        if self.success() {
            return None;
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return Some(stderr.to_string());
        }
        Some(match (self.code, self.signal) {
            (Some(code), _) => format!("Process exited with code {}", code),
            (None, Some(signal)) => format!("Process terminated by signal {}", signal),
            (None, None) => "Process exited with unknown status".to_string(),
        })
    }
}

/// Asynchronous outcome of a spawned process.
#[derive(Debug)]
pub enum ProcessEvent {
    /// The exit observer fired.
    Exited { generation: u64, report: ExitReport },
    /// The error observer fired: the process could not be waited on.
    Failed { generation: u64, message: String },
}

impl ProcessEvent {
    pub fn generation(&self) -> u64 {
        match self {
            ProcessEvent::Exited { generation, .. } | ProcessEvent::Failed { generation, .. } => {
                *generation
            }
        }
    }
}

/// Owned reference to one live proxy process.
///
/// Dropping the handle terminates the process as well.
#[derive(Debug)]
pub struct ProcessHandle {
    generation: u64,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    terminate_tx: oneshot::Sender<()>,
    watcher: JoinHandle<()>,
}

impl ProcessHandle {
    /// Spawn the configured executable and start observing it.
    ///
    /// Errors are OS-level spawn failures; nothing is left running in that case.
    pub fn spawn(
        config: &SupervisorConfig,
        generation: u64,
        events: mpsc::Sender<ProcessEvent>,
    ) -> io::Result<Self> {
        let mut child = Command::new(&config.executable)
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        let stderr = Arc::new(Mutex::new(StderrBuffer::new(config.stderr_limit)));

        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(tokio::spawn(pump(out, pid, generation, OutputStream::Stdout, None)));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(tokio::spawn(pump(
                err,
                pid,
                generation,
                OutputStream::Stderr,
                Some(Arc::clone(&stderr)),
            )));
        }

        let (terminate_tx, terminate_rx) = oneshot::channel();
        let watcher = tokio::spawn(watch(
            child,
            Watch {
                generation,
                pid,
                grace: config.stop_grace,
                stderr,
                readers,
                terminate_rx,
                events,
            },
        ));

        Ok(Self {
            generation,
            pid,
            started_at: Utc::now(),
            terminate_tx,
            watcher,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Ask the watcher to terminate the process. Does not wait; the returned
    /// task finishes once the process has been reaped.
    pub fn terminate(self) -> JoinHandle<()> {
        let _ = self.terminate_tx.send(());
        self.watcher
    }
}

struct Watch {
    generation: u64,
    pid: Option<u32>,
    grace: Duration,
    stderr: Arc<Mutex<StderrBuffer>>,
    readers: Vec<JoinHandle<()>>,
    terminate_rx: oneshot::Receiver<()>,
    events: mpsc::Sender<ProcessEvent>,
}

enum Wake {
    Exited(io::Result<ExitStatus>),
    Terminate,
}

async fn watch(mut child: Child, watch: Watch) {
    let Watch {
        generation,
        pid,
        grace,
        stderr,
        readers,
        mut terminate_rx,
        events,
    } = watch;

    // A dropped handle counts as a termination request.
    let wake = tokio::select! {
        status = child.wait() => Wake::Exited(status),
        _ = &mut terminate_rx => Wake::Terminate,
    };
    let waited = match wake {
        Wake::Exited(status) => status,
        Wake::Terminate => {
            debug!(pid = ?pid, generation, "Terminating proxy process");
            timeout_kill::terminate(&mut child, grace).await
        }
    };

    let deadline = Instant::now() + OUTPUT_DRAIN_TIMEOUT;
    for mut reader in readers {
        if timeout_at(deadline, &mut reader).await.is_err() {
            reader.abort();
        }
    }

    let event = match waited {
        Ok(status) => {
            let (stderr, dropped) = {
                let buffer = stderr.lock().await;
                (buffer.text(), buffer.dropped())
            };
            debug!(
                pid = ?pid,
                generation,
                status = %status,
                stderr_dropped = dropped,
                "Proxy process reaped"
            );
            ProcessEvent::Exited {
                generation,
                report: ExitReport::from_status(status, stderr),
            }
        }
        Err(e) => ProcessEvent::Failed {
            generation,
            message: e.to_string(),
        },
    };

    if events.send(event).await.is_err() {
        debug!(generation, "Supervisor gone; dropping process event");
    }
}

/// Forward one output stream to the log, optionally retaining it.
async fn pump<R>(
    stream: R,
    pid: Option<u32>,
    generation: u64,
    kind: OutputStream,
    sink: Option<Arc<Mutex<StderrBuffer>>>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match (&mut reader).take(MAX_LINE_BYTES).read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if let Some(sink) = &sink {
                    sink.lock().await.push(&line);
                }
                OutputLogger::log_line(pid, generation, kind, &String::from_utf8_lossy(&line));
            }
            Err(e) => {
                debug!(pid = ?pid, stream = kind.as_str(), error = %e, "Output stream failed");
                break;
            }
        }
    }
}
