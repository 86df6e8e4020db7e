//! Parent side of the relay.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::ControlCommand;
use crate::config::RelayConfig;
use crate::error::{FrameError, RelayError};
use crate::event::{ConvertedEvent, LogEvent};
use crate::frame::FrameCodec;
use crate::output::DistributionEngine;

// ============================================================================
// Messenger
// ============================================================================

/// Parent endpoints: reads log frames, writes control frames.
///
/// Reader and writer sit behind separate async mutexes so a relay can keep
/// reading while commands are sent. The writer is dropped by
/// [`close_control`](Self::close_control), which closes the pipe.
pub struct ParentMessenger<R, W> {
    logs: Mutex<BufReader<R>>,
    control: Mutex<Option<W>>,
    log_codec: FrameCodec<ConvertedEvent>,
    control_codec: FrameCodec<ControlCommand>,
}

impl<R, W> ParentMessenger<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a messenger with limits from [`RelayConfig::from_env`].
    #[must_use]
    pub fn new(logs: R, control: W) -> Self {
        Self::with_config(logs, control, RelayConfig::from_env())
    }

    /// Creates a messenger with explicit limits.
    #[must_use]
    pub fn with_config(logs: R, control: W, config: RelayConfig) -> Self {
        Self {
            logs: Mutex::new(BufReader::with_capacity(config.buffer_size, logs)),
            control: Mutex::new(Some(control)),
            log_codec: FrameCodec::default().with_max_frame_len(config.max_frame_size),
            control_codec: FrameCodec::default().with_max_frame_len(config.max_frame_size),
        }
    }

    /// Waits for the next log frame and rebuilds its event.
    ///
    /// # Errors
    ///
    /// [`FrameError::MalformedFrame`] or [`FrameError::OversizedFrame`] for a
    /// bad frame (the channel stays usable), [`FrameError::IncompleteFrame`]
    /// or [`FrameError::Closed`] once the child closed its end.
    #[allow(clippy::significant_drop_tightening)] // reader is held across the read
    pub async fn read_log_line(&self) -> Result<LogEvent, FrameError> {
        let mut logs = self.logs.lock().await;
        let converted = self.log_codec.read_frame_async(&mut *logs).await?;
        Ok(LogEvent::from(converted))
    }

    /// Encodes and writes one control frame.
    ///
    /// # Errors
    ///
    /// [`RelayError::Frame`] if encoding fails, [`RelayError::Io`] if either
    /// side closed the control pipe.
    pub async fn send_command(&self, command: &ControlCommand) -> Result<(), RelayError> {
        let frame = self.control_codec.encode(command)?;
        let mut guard = self.control.lock().await;
        let control = guard.as_mut().ok_or_else(control_closed)?;
        control.write_all(&frame).await?;
        control.flush().await?;
        drop(guard);
        Ok(())
    }

    /// Flushes and drops the control writer; the child's reader sees
    /// end-of-stream. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`RelayError::Io`] if the final flush or shutdown fails. The writer
    /// is dropped either way.
    pub async fn close_control(&self) -> Result<(), RelayError> {
        let control = self.control.lock().await.take();
        if let Some(mut control) = control {
            control.flush().await?;
            control.shutdown().await?;
        }
        Ok(())
    }

    /// Whether [`close_control`](Self::close_control) has run.
    pub async fn is_control_closed(&self) -> bool {
        self.control.lock().await.is_none()
    }
}

fn control_closed() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "control pipe closed")
}

impl ParentMessenger<ChildStdout, ChildStdin> {
    /// Takes the piped stdout (logs) and stdin (control) of a spawned child.
    ///
    /// # Errors
    ///
    /// [`RelayError::Io`] if either stream was not piped or was already taken.
    pub fn from_child(child: &mut Child, config: RelayConfig) -> Result<Self, RelayError> {
        let logs = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout is not piped"))?;
        let control = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("child stdin is not piped"))?;
        Ok(Self::with_config(logs, control, config))
    }
}

impl<R, W> std::fmt::Debug for ParentMessenger<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentMessenger")
            .field("max_frame_len", &self.log_codec.max_frame_len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Relay
// ============================================================================

/// Re-broadcasts a child's log events into the parent's engine.
///
/// Relayed logger names are prefixed with `<child name>/`.
pub struct ParentRelay<R, W> {
    name: String,
    messenger: ParentMessenger<R, W>,
    engine: Arc<DistributionEngine>,
}

impl<R, W> ParentRelay<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a relay for the child called `name`.
    pub fn new(
        name: impl Into<String>,
        messenger: ParentMessenger<R, W>,
        engine: Arc<DistributionEngine>,
    ) -> Self {
        Self {
            name: name.into(),
            messenger,
            engine,
        }
    }

    /// Child name used as the logger-name prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying endpoints.
    #[must_use]
    pub const fn messenger(&self) -> &ParentMessenger<R, W> {
        &self.messenger
    }

    /// Forwards a control command to the child.
    ///
    /// # Errors
    ///
    /// See [`ParentMessenger::send_command`].
    pub async fn send_command(&self, command: &ControlCommand) -> Result<(), RelayError> {
        self.messenger.send_command(command).await
    }

    /// Relays events until the child closes its log pipe.
    ///
    /// Bad frames are logged and skipped. Returns the number of events
    /// relayed.
    ///
    /// # Errors
    ///
    /// [`RelayError::Frame`] on an I/O failure reading the pipe.
    pub async fn run(&self) -> Result<u64, RelayError> {
        let mut relayed = 0u64;
        loop {
            match self.messenger.read_log_line().await {
                Ok(event) => {
                    self.rebroadcast(event);
                    relayed += 1;
                }
                Err(e @ (FrameError::MalformedFrame { .. } | FrameError::OversizedFrame { .. })) => {
                    warn!(child = %self.name, error = %e, "dropping log frame");
                }
                Err(FrameError::Closed) => {
                    debug!(child = %self.name, relayed, "log channel closed");
                    return Ok(relayed);
                }
                Err(FrameError::IncompleteFrame { partial }) => {
                    warn!(
                        child = %self.name,
                        bytes = partial.len(),
                        "log channel closed mid-frame"
                    );
                    return Ok(relayed);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn rebroadcast(&self, mut event: LogEvent) {
        if !self.name.is_empty() {
            event.logger_name = format!("{}/{}", self.name, event.logger_name);
        }
        self.engine.output(Some(&event));
    }
}

impl<R, W> std::fmt::Debug for ParentRelay<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentRelay")
            .field("name", &self.name)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
