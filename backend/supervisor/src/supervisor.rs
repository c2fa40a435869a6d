use std::ops::ControlFlow;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use spoofbar_core::message::CommandResult;
use spoofbar_core::{Command, Component, StatusChanged, SupervisorError, SupervisorStatus};

use crate::config::SupervisorConfig;
use crate::permissions::ensure_executable;
use crate::process::{ProcessEvent, ProcessHandle};

/// Buffer for commands and for process events.
const CHANNEL_CAPACITY: usize = 32;

/// Buffer for `status-changed` notifications per subscriber.
const NOTIFICATION_CAPACITY: usize = 64;

/// Shutdown waits this long past the stop grace period for the proxy to be reaped.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(1);

/// The Supervisor owns the proxy process: it is the only code that spawns,
/// signals or observes it.
///
/// All state lives inside the event loop started by [`Component::start`].
/// Commands and process events are handled one at a time, so they never
/// interleave.
pub struct Supervisor {
    config: SupervisorConfig,
    notifications: broadcast::Sender<StatusChanged>,
    process_tx: mpsc::Sender<ProcessEvent>,
    process_rx: Mutex<Option<mpsc::Receiver<ProcessEvent>>>,
}

/// Mutable state of the event loop.
///
/// `running` is derived from `handle`, so the two cannot disagree.
#[derive(Debug, Default)]
struct SupervisorState {
    handle: Option<ProcessHandle>,
    last_error: Option<String>,
    /// Generation of the most recent successful spawn.
    generation: u64,
}

impl SupervisorState {
    fn running(&self) -> bool {
        self.handle.is_some()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| h.generation() == generation)
    }

    fn status(&self) -> SupervisorStatus {
        match &self.handle {
            Some(handle) => SupervisorStatus {
                running: true,
                last_error: None,
                pid: handle.pid(),
                started_at: Some(handle.started_at()),
            },
            None => SupervisorStatus {
                running: false,
                last_error: self.last_error.clone(),
                pid: None,
                started_at: None,
            },
        }
    }
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, notifications: broadcast::Sender<StatusChanged>) -> Self {
        let (process_tx, process_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            config,
            notifications,
            process_tx,
            process_rx: Mutex::new(Some(process_rx)),
        }
    }

    /// Start the event loop on the current runtime and return a handle to it.
    pub fn spawn(config: SupervisorConfig) -> SupervisorHandle {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self::spawn_with(config, notifications)
    }

    /// Like [`Supervisor::spawn`], publishing on an existing notification channel.
    pub fn spawn_with(
        config: SupervisorConfig,
        notifications: broadcast::Sender<StatusChanged>,
    ) -> SupervisorHandle {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let supervisor = Self::new(config, notifications.clone());
        tokio::spawn(async move {
            if let Err(e) = Component::start(&supervisor, rx).await {
                error!(error = %e, "Supervisor task failed");
            }
        });
        SupervisorHandle::new(tx, notifications)
    }

    async fn handle_command(&self, state: &mut SupervisorState, command: Command) -> ControlFlow<()> {
        debug!(command = command.name(), "Handling command");
        match command {
            Command::Start { reply } => {
                let _ = reply.send(self.start_process(state));
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.stop_process(state));
            }
            Command::Status { reply } => {
                let _ = reply.send(state.status());
            }
            Command::Shutdown { reply } => {
                self.shutdown(state).await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Spawn the proxy unless one is already live.
    fn start_process(&self, state: &mut SupervisorState) -> CommandResult {
        if let Some(handle) = &state.handle {
            warn!(pid = ?handle.pid(), generation = handle.generation(), "Start rejected; proxy already running");
            return Err(SupervisorError::AlreadyRunning(self.config.display_name.clone()));
        }

        let executable = &self.config.executable;
        if self.config.ensure_executable {
            match ensure_executable(executable) {
                Ok(true) => info!(path = %executable.display(), "Set execute permission on proxy binary"),
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %executable.display(), error = %e, "Spawning without permission fix")
                }
            }
        }

        let generation = state.generation + 1;
        match ProcessHandle::spawn(&self.config, generation, self.process_tx.clone()) {
            Ok(handle) => {
                info!(
                    pid = ?handle.pid(),
                    generation,
                    path = %executable.display(),
                    "Proxy process started"
                );
                state.generation = generation;
                state.handle = Some(handle);
                state.last_error = None;
                // Sent before any event of this generation is handled.
                self.notify(StatusChanged::started());
                Ok(format!("{} started successfully", self.config.display_name))
            }
            Err(e) => {
                let message = e.to_string();
                error!(path = %executable.display(), error = %message, "Failed to start proxy process");
                state.last_error = Some(message.clone());
                Err(SupervisorError::SpawnFailure(message))
            }
        }
    }

    /// Request termination and forget the handle. Does not wait for the process to die.
    fn stop_process(&self, state: &mut SupervisorState) -> CommandResult {
        let Some(handle) = state.handle.take() else {
            return Err(SupervisorError::NotRunning(self.config.display_name.clone()));
        };
        info!(pid = ?handle.pid(), generation = handle.generation(), "Stopping proxy process");
        drop(handle.terminate());
        self.notify(StatusChanged::stopped());
        Ok(format!("{} stopped successfully", self.config.display_name))
    }

    /// Apply an exit/error observation, unless it belongs to an earlier process.
    fn handle_process_event(&self, state: &mut SupervisorState, event: ProcessEvent) {
        let generation = event.generation();
        if !state.is_current(generation) {
            debug!(generation, current = state.generation, "Ignoring event from a previous process");
            return;
        }

        let pid = state.handle.take().and_then(|h| h.pid());
        let notification = match event {
            ProcessEvent::Exited { report, .. } => match report.error_message() {
                None => {
                    info!(pid = ?pid, generation, "Proxy process exited");
                    StatusChanged::stopped()
                }
                Some(message) => {
                    let error = SupervisorError::AbnormalExit(message);
                    warn!(
                        pid = ?pid,
                        generation,
                        code = ?report.code,
                        signal = ?report.signal,
                        error = %error,
                        "Proxy process exited abnormally"
                    );
                    StatusChanged::failed(error.to_string())
                }
            },
            ProcessEvent::Failed { message, .. } => {
                error!(pid = ?pid, generation, error = %message, "Proxy process failed");
                StatusChanged::failed(message)
            }
        };

        state.last_error = notification.error.clone();
        self.notify(notification);
    }

    fn notify(&self, notification: StatusChanged) {
        if self.notifications.send(notification).is_err() {
            debug!("No status listeners");
        }
    }

    /// Stop a live proxy and wait, bounded, for it to be reaped.
    async fn shutdown(&self, state: &mut SupervisorState) {
        let Some(handle) = state.handle.take() else {
            return;
        };
        info!(pid = ?handle.pid(), "Stopping proxy process before shutdown");
        let watcher = handle.terminate();
        if timeout(self.config.stop_grace + SHUTDOWN_SLACK, watcher).await.is_err() {
            warn!("Proxy process was not reaped before shutdown");
        }
    }
}

#[async_trait]
impl Component for Supervisor {
    fn name(&self) -> &str {
        "supervisor"
    }

    async fn start(&self, mut rx: mpsc::Receiver<Command>) -> Result<()> {
        let mut process_rx = self
            .process_rx
            .lock()
            .await
            .take()
            .context("Supervisor event loop is already running")?;
        let mut state = SupervisorState::default();

        info!(executable = %self.config.executable.display(), "Supervisor started");

        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else {
                        self.shutdown(&mut state).await;
                        break;
                    };
                    if self.handle_command(&mut state, command).await.is_break() {
                        break;
                    }
                }
                Some(event) = process_rx.recv() => self.handle_process_event(&mut state, event),
            }
        }

        info!("Supervisor channel closed, shutting down");
        Ok(())
    }
}

/// Cloneable client of a running [`Supervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<Command>,
    notifications: broadcast::Sender<StatusChanged>,
}

impl SupervisorHandle {
    pub fn new(
        commands: mpsc::Sender<Command>,
        notifications: broadcast::Sender<StatusChanged>,
    ) -> Self {
        Self {
            commands,
            notifications,
        }
    }

    pub async fn start(&self) -> CommandResult {
        self.request(|reply| Command::Start { reply }).await?
    }

    pub async fn stop(&self) -> CommandResult {
        self.request(|reply| Command::Stop { reply }).await?
    }

    pub async fn status(&self) -> Result<SupervisorStatus, SupervisorError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Stop any live proxy and end the event loop.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Receive `status-changed` notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChanged> {
        self.notifications.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SupervisorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SupervisorError::Unavailable)?;
        rx.await.map_err(|_| SupervisorError::Unavailable)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn sh(script: &str) -> SupervisorConfig {
        SupervisorConfig::new("/bin/sh")
            .with_args(["-c", script])
            .with_stop_grace(Duration::from_secs(2))
    }

    async fn next_event(rx: &mut broadcast::Receiver<StatusChanged>) -> StatusChanged {
        timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for status-changed")
            .expect("notification channel closed")
    }

    async fn assert_quiet(rx: &mut broadcast::Receiver<StatusChanged>, wait: Duration) {
        if let Ok(event) = timeout(wait, rx.recv()).await {
            panic!("unexpected status-changed: {:?}", event);
        }
    }

    fn assert_consistent(status: &SupervisorStatus) {
        assert_eq!(status.running, status.pid.is_some(), "{:?}", status);
        assert_eq!(status.running, status.started_at.is_some(), "{:?}", status);
        if status.running {
            assert!(status.last_error.is_none());
        }
    }

    #[tokio::test]
    async fn test_start_reports_running() {
        let supervisor = Supervisor::spawn(sh("exec sleep 30"));

        let message = supervisor.start().await.unwrap();
        assert_eq!(message, "SpoofDPI started successfully");

        let status = supervisor.status().await.unwrap();
        assert!(status.running);
        assert_consistent(&status);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_start_is_rejected() {
        let supervisor = Supervisor::spawn(sh("exec sleep 30"));

        supervisor.start().await.unwrap();
        let pid = supervisor.status().await.unwrap().pid;

        let err = supervisor.start().await.unwrap_err();
        assert_eq!(err, SupervisorError::AlreadyRunning("SpoofDPI".into()));
        assert_eq!(err.to_string(), "SpoofDPI is already running");

        // The live process is untouched.
        let status = supervisor.status().await.unwrap();
        assert!(status.running);
        assert_eq!(status.pid, pid);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_binary_fails_synchronously() {
        let supervisor = Supervisor::spawn(SupervisorConfig::new("/definitely/not/here/spoofdpi"));
        let mut events = supervisor.subscribe();

        let err = supervisor.start().await.unwrap_err();
        let SupervisorError::SpawnFailure(message) = &err else {
            panic!("expected spawn failure, got {:?}", err);
        };
        assert!(!message.is_empty());

        let status = supervisor.status().await.unwrap();
        assert!(!status.running);
        assert_eq!(status.last_error.as_deref(), Some(message.as_str()));
        assert_consistent(&status);

        assert_quiet(&mut events, Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn test_clean_exit_has_no_error() {
        let supervisor = Supervisor::spawn(sh("exit 0"));
        let mut events = supervisor.subscribe();

        supervisor.start().await.unwrap();
        assert_eq!(next_event(&mut events).await, StatusChanged::started());
        assert_eq!(next_event(&mut events).await, StatusChanged::stopped());

        let status = supervisor.status().await.unwrap();
        assert!(!status.running);
        assert_eq!(status.last_error, None);
        assert_consistent(&status);
    }

    #[tokio::test]
    async fn test_exit_code_without_stderr() {
        let supervisor = Supervisor::spawn(sh("exit 1"));
        let mut events = supervisor.subscribe();

        supervisor.start().await.unwrap();
        assert_eq!(next_event(&mut events).await, StatusChanged::started());
        assert_eq!(
            next_event(&mut events).await,
            StatusChanged::failed("Process exited with code 1")
        );

        let status = supervisor.status().await.unwrap();
        assert_eq!(status.last_error.as_deref(), Some("Process exited with code 1"));
    }

    #[tokio::test]
    async fn test_crash_reports_stderr_once() {
        let supervisor = Supervisor::spawn(sh("echo boom >&2; exit 3"));
        let mut events = supervisor.subscribe();

        assert!(supervisor.start().await.is_ok());
        // `started` always precedes the exit of the same process.
        assert_eq!(next_event(&mut events).await, StatusChanged::started());
        assert_eq!(next_event(&mut events).await, StatusChanged::failed("boom"));
        assert_quiet(&mut events, Duration::from_millis(300)).await;
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let supervisor = Supervisor::spawn(sh("exec sleep 30"));

        let err = supervisor.stop().await.unwrap_err();
        assert_eq!(err, SupervisorError::NotRunning("SpoofDPI".into()));

        let status = supervisor.status().await.unwrap();
        assert!(!status.running);
        assert_consistent(&status);
    }

    #[tokio::test]
    async fn test_stop_is_immediate() {
        let supervisor = Supervisor::spawn(sh("exec sleep 30"));
        let mut events = supervisor.subscribe();

        supervisor.start().await.unwrap();
        let message = supervisor.stop().await.unwrap();
        assert_eq!(message, "SpoofDPI stopped successfully");
        assert_eq!(next_event(&mut events).await, StatusChanged::started());
        assert_eq!(next_event(&mut events).await, StatusChanged::stopped());

        let status = supervisor.status().await.unwrap();
        assert!(!status.running);
        assert_eq!(status.last_error, None);
        assert_consistent(&status);

        // The SIGTERM exit belongs to a process we already let go of.
        assert_quiet(&mut events, Duration::from_millis(500)).await;
        assert_eq!(supervisor.status().await.unwrap().last_error, None);
    }

    #[tokio::test]
    async fn test_stale_exit_does_not_touch_next_process() {
        // Exits with an error a while after SIGTERM.
        let supervisor = Supervisor::spawn(sh(
            "trap 'sleep 0.3; exit 7' TERM; while true; do sleep 0.05; done",
        ));
        let mut events = supervisor.subscribe();

        supervisor.start().await.unwrap();
        let first_pid = supervisor.status().await.unwrap().pid;
        tokio::time::sleep(Duration::from_millis(200)).await;

        supervisor.stop().await.unwrap();
        supervisor.start().await.unwrap();

        // Long enough for the first process to have exited with code 7.
        tokio::time::sleep(Duration::from_secs(1)).await;

        let status = supervisor.status().await.unwrap();
        assert!(status.running);
        assert_ne!(status.pid, first_pid);
        assert_consistent(&status);
        for expected in [
            StatusChanged::started(),
            StatusChanged::stopped(),
            StatusChanged::started(),
        ] {
            assert_eq!(events.try_recv().unwrap(), expected);
        }
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_crash() {
        let supervisor = Supervisor::spawn(sh("exit 2"));
        let mut events = supervisor.subscribe();

        supervisor.start().await.unwrap();
        assert_eq!(next_event(&mut events).await, StatusChanged::started());
        next_event(&mut events).await;

        supervisor.start().await.unwrap();
        assert_eq!(next_event(&mut events).await, StatusChanged::started());
        assert_eq!(
            next_event(&mut events).await,
            StatusChanged::failed("Process exited with code 2")
        );
    }

    #[tokio::test]
    async fn test_failed_event_ends_current_process_only() {
        let (notifications, mut events) = broadcast::channel(8);
        let supervisor = Supervisor::new(sh("exec sleep 30"), notifications);
        let mut state = SupervisorState::default();

        supervisor.start_process(&mut state).unwrap();
        assert_eq!(events.try_recv().unwrap(), StatusChanged::started());
        let first = state.generation;

        supervisor.handle_process_event(
            &mut state,
            ProcessEvent::Failed {
                generation: first,
                message: "wait failed".into(),
            },
        );
        assert!(!state.running());
        assert_eq!(state.last_error.as_deref(), Some("wait failed"));
        assert_eq!(events.try_recv().unwrap(), StatusChanged::failed("wait failed"));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        supervisor.start_process(&mut state).unwrap();
        assert_eq!(events.try_recv().unwrap(), StatusChanged::started());
        assert_ne!(state.generation, first);

        // A late failure of the first process leaves the restart alone.
        supervisor.handle_process_event(
            &mut state,
            ProcessEvent::Failed {
                generation: first,
                message: "late".into(),
            },
        );
        assert!(state.running());
        assert_eq!(state.last_error, None);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        supervisor.shutdown(&mut state).await;
        assert!(!state.running());
    }

    #[tokio::test]
    async fn test_shutdown_closes_supervisor() {
        let supervisor = Supervisor::spawn(sh("exec sleep 30"));
        supervisor.start().await.unwrap();
        #[cfg(target_os = "linux")]
        let pid = supervisor.status().await.unwrap().pid.unwrap();

        supervisor.shutdown().await.unwrap();
        assert_eq!(supervisor.status().await.unwrap_err(), SupervisorError::Unavailable);

        #[cfg(target_os = "linux")]
        assert!(!std::path::Path::new(&format!("/proc/{}", pid)).exists());
    }

    #[tokio::test]
    async fn test_event_loop_runs_once() {
        let (notifications, _) = broadcast::channel(4);
        let supervisor = Supervisor::new(sh("exit 0"), notifications);

        let (_tx, rx) = mpsc::channel(1);
        let first = {
            let mut guard = supervisor.process_rx.lock().await;
            guard.take()
        };
        assert!(first.is_some());
        assert!(supervisor.start(rx).await.is_err());
        assert_eq!(supervisor.name(), "supervisor");
    }
}
