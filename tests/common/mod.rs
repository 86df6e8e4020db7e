//! Shared integration-test harness for spawning `logpipe` as a relayed
//! child process and talking to it over its stdio pipes.

#![allow(dead_code)]

use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use logpipe::config::RelayConfig;
use logpipe::error::FrameError;
use logpipe::event::LogEvent;
use logpipe::relay::{ControlCommand, ParentMessenger};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Default timeout for reading a single frame from the child.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Path to the `logpipe` binary under test.
#[must_use]
pub fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_logpipe")
}

/// A running `logpipe child` process.
///
/// The child process is killed on drop via `kill_on_drop(true)`.
pub struct ChildProcess {
    child: Child,
    messenger: ParentMessenger<ChildStdout, ChildStdin>,
}

impl ChildProcess {
    /// Spawns `logpipe --quiet child <args>`.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn(args: &[&str]) -> Self {
        let mut child = Command::new(bin())
            .arg("--quiet")
            .arg("child")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn logpipe child");

        let messenger = ParentMessenger::from_child(&mut child, RelayConfig::default())
            .expect("child stdio not captured");
        Self { child, messenger }
    }

    /// Reads the next relayed event.
    ///
    /// Panics on a frame error or if nothing arrives within `timeout`.
    #[allow(clippy::missing_panics_doc)]
    pub async fn read_event(&self, timeout: Duration) -> LogEvent {
        tokio::time::timeout(timeout, self.messenger.read_log_line())
            .await
            .expect("timed out waiting for log frame")
            .unwrap_or_else(|e| panic!("frame error from child: {e}"))
    }

    /// Reads events until the child closes its log pipe.
    #[allow(clippy::missing_panics_doc)]
    pub async fn read_to_end(&self) -> Vec<LogEvent> {
        let mut events = Vec::new();
        loop {
            let next = tokio::time::timeout(DEFAULT_TIMEOUT, self.messenger.read_log_line())
                .await
                .expect("timed out waiting for log frame");
            match next {
                Ok(event) => events.push(event),
                Err(FrameError::Closed) => return events,
                Err(e) => panic!("frame error from child: {e}"),
            }
        }
    }

    /// Sends one control command.
    #[allow(clippy::missing_panics_doc)]
    pub async fn send_command(&self, command: &ControlCommand) {
        self.messenger
            .send_command(command)
            .await
            .expect("failed to send control command");
    }

    /// Closes the control pipe; the child sees end-of-stream.
    #[allow(clippy::missing_panics_doc)]
    pub async fn close_control(&self) {
        self.messenger
            .close_control()
            .await
            .expect("failed to close control pipe");
    }

    /// Waits for the child to exit.
    #[allow(clippy::missing_panics_doc)]
    pub async fn wait(mut self) -> ExitStatus {
        tokio::time::timeout(DEFAULT_TIMEOUT, self.child.wait())
            .await
            .expect("child did not exit in time")
            .expect("failed to wait for child")
    }
}

/// Runs `logpipe <args>` to completion with stdin closed.
#[allow(clippy::missing_panics_doc)]
#[must_use]
pub fn run_command(args: &[&str]) -> Output {
    std::process::Command::new(bin())
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("failed to run logpipe")
}
