//! Child side of the relay.
//!
//! Outbound, the [`ChildMessenger`] is registered with the child's engine as
//! an ordinary sink paired with a [`FrameFormatter`], so every broadcast is
//! framed and written to the log pipe synchronously. Inbound, a tokio task
//! reads control frames and hands them to a [`ControlHandler`].

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufRead, AsyncRead, BufReader};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ControlCommand, ControlHandler, LoopState};
use crate::config::RelayConfig;
use crate::error::{FrameError, RelayError};
use crate::event::ConvertedEvent;
use crate::format::FrameFormatter;
use crate::frame::FrameCodec;
use crate::output::{DistributionEngine, LogSink};

// ============================================================================
// Messenger
// ============================================================================

/// Writing end of the log pipe.
///
/// Writers are serialized so concurrent frames never interleave.
pub struct ChildMessenger {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ChildMessenger {
    /// Wraps the log pipe writer.
    #[must_use]
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Writes one pre-encoded frame and flushes.
    ///
    /// # Errors
    ///
    /// [`RelayError::Io`] if the pipe is closed or broken.
    pub fn send_log_line(&self, frame: &[u8]) -> Result<(), RelayError> {
        Ok(self.write_frame(frame)?)
    }

    fn write_frame(&self, frame: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(frame)?;
        writer.flush()
    }
}

impl LogSink for ChildMessenger {
    fn write_log(&self, buf: &[u8]) -> std::io::Result<()> {
        self.write_frame(buf)
    }
}

impl std::fmt::Debug for ChildMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildMessenger").finish_non_exhaustive()
    }
}

// ============================================================================
// Relay Loop
// ============================================================================

type ControlReader = Box<dyn AsyncRead + Send + Unpin>;

/// Child-side relay lifecycle: `Idle → Running → Stopped`.
///
/// A loop runs at most once. Dropping a running loop detaches it from the
/// engine and cancels its reader task. Start and stop are serialized, so a
/// stop never observes a half-registered loop.
pub struct RelayLoop {
    state: AtomicU8,
    lifecycle: Mutex<()>,
    engine: Arc<DistributionEngine>,
    handler: Arc<dyn ControlHandler>,
    messenger: Arc<ChildMessenger>,
    control: Mutex<Option<ControlReader>>,
    config: RelayConfig,
    cancel: CancellationToken,
}

impl RelayLoop {
    /// Creates an idle loop over the two pipe ends.
    ///
    /// Limits come from [`RelayConfig::from_env`].
    #[must_use]
    pub fn new(
        engine: Arc<DistributionEngine>,
        handler: Arc<dyn ControlHandler>,
        control: impl AsyncRead + Send + Unpin + 'static,
        logs: impl Write + Send + 'static,
    ) -> Self {
        Self {
            state: AtomicU8::new(LoopState::Idle as u8),
            lifecycle: Mutex::new(()),
            engine,
            handler,
            messenger: Arc::new(ChildMessenger::new(logs)),
            control: Mutex::new(Some(Box::new(control))),
            config: RelayConfig::from_env(),
            cancel: CancellationToken::new(),
        }
    }

    /// Overrides the frame and buffer limits.
    #[must_use]
    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// The log pipe endpoint.
    #[must_use]
    pub const fn messenger(&self) -> &Arc<ChildMessenger> {
        &self.messenger
    }

    /// Starts relaying: registers the messenger with the engine and spawns
    /// the control reader on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`RelayError::NoRuntime`] outside a tokio runtime.
    /// - [`RelayError::InvalidLoopState`] unless the loop is idle.
    ///
    /// The state is unchanged on error.
    #[allow(clippy::significant_drop_tightening)] // held until registration is done
    pub fn start_loop(&self) -> Result<(), RelayError> {
        let runtime = Handle::try_current().map_err(|_| RelayError::NoRuntime)?;
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        self.transition(LoopState::Idle, LoopState::Running, "start")?;

        let frames: FrameCodec<ConvertedEvent> =
            FrameCodec::default().with_max_frame_len(self.config.max_frame_size);
        let formatter = FrameFormatter::new(frames);
        if let Err(e) = self
            .engine
            .add_observer(Arc::clone(&self.messenger) as Arc<dyn LogSink>, Arc::new(formatter))
        {
            self.state.store(LoopState::Idle as u8, Ordering::SeqCst);
            return Err(e.into());
        }

        let control = self
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(control) = control {
            let reader = BufReader::with_capacity(self.config.buffer_size, control);
            let codec = FrameCodec::default().with_max_frame_len(self.config.max_frame_size);
            runtime.spawn(read_control(
                reader,
                codec,
                Arc::clone(&self.handler),
                self.cancel.clone(),
            ));
        }

        info!("relay loop started");
        Ok(())
    }

    /// Stops relaying: detaches the messenger from the engine and cancels
    /// the control reader.
    ///
    /// # Errors
    ///
    /// [`RelayError::InvalidLoopState`] unless the loop is running; the state
    /// is unchanged.
    pub fn stop_loop(&self) -> Result<(), RelayError> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        self.transition(LoopState::Running, LoopState::Stopped, "stop")?;
        self.detach();
        self.cancel.cancel();
        info!("relay loop stopped");
        Ok(())
    }

    /// Resolves once the control channel has ended or the loop was stopped.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    fn transition(
        &self,
        from: LoopState,
        to: LoopState,
        operation: &'static str,
    ) -> Result<(), RelayError> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| RelayError::InvalidLoopState {
                operation,
                state: LoopState::from_u8(actual),
            })
    }

    fn detach(&self) {
        let sink: &dyn LogSink = self.messenger.as_ref();
        if let Err(e) = self.engine.remove_observer(sink) {
            debug!(error = %e, "relay already detached from engine");
        }
    }
}

impl Drop for RelayLoop {
    fn drop(&mut self) {
        if self.state() == LoopState::Running {
            self.detach();
        }
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for RelayLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayLoop")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Reads control frames until the channel ends or `cancel` fires.
///
/// Malformed and oversized frames are skipped. Cancels `cancel` on exit so
/// [`RelayLoop::closed`] observes a closed channel.
async fn read_control<R>(
    mut reader: R,
    codec: FrameCodec<ControlCommand>,
    handler: Arc<dyn ControlHandler>,
    cancel: CancellationToken,
) where
    R: AsyncBufRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => {
                debug!("control reader cancelled");
                return;
            }
            frame = codec.read_frame_async(&mut reader) => frame,
        };

        match frame {
            Ok(command) => {
                debug!(?command, "control command received");
                if let Err(e) = handler.handle_command(command) {
                    warn!(error = %e, "control command rejected");
                }
            }
            Err(e @ (FrameError::MalformedFrame { .. } | FrameError::OversizedFrame { .. })) => {
                warn!(error = %e, "skipping control frame");
            }
            Err(FrameError::Closed) => {
                debug!("control channel closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "control channel failed");
                break;
            }
        }
    }
    cancel.cancel();
}

// ============================================================================
// Tests
// ============================================================================
