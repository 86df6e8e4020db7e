//! Error types for `logpipe`
//!
//! One enum per concern (observer registration, framing, relay lifecycle,
//! formatting, level patterns) aggregated by [`LogPipeError`], which maps
//! every failure to a process exit code for the CLI.

use thiserror::Error;

use crate::relay::LoopState;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `logpipe` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid level pattern, bad arguments)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (spawn failure, broken pipe)
    pub const IO_ERROR: i32 = 3;

    /// Relay error (framing, lifecycle)
    pub const RELAY_ERROR: i32 = 4;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `logpipe` operations.
#[derive(Debug, Error)]
pub enum LogPipeError {
    /// Observer registration error
    #[error(transparent)]
    Observer(#[from] ObserverError),

    /// Relay endpoint or lifecycle error
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// Frame encoding or decoding error
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Invalid level pattern
    #[error(transparent)]
    LevelPattern(#[from] LevelPatternError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LogPipeError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::LevelPattern(_) | Self::Observer(_) => ExitCode::CONFIG_ERROR,
            Self::Relay(_) | Self::Frame(_) => ExitCode::RELAY_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Observer Errors
// ============================================================================

/// Errors returned when mutating the observer list of a
/// [`DistributionEngine`](crate::output::DistributionEngine).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ObserverError {
    /// The sink reports itself as absent
    #[error("nil sink")]
    NilSink,

    /// The formatter reports itself as absent
    #[error("nil formatter")]
    NilFormatter,

    /// The sink is absent or not registered
    #[error("sink not found")]
    SinkNotFound,
}

// ============================================================================
// Frame Errors
// ============================================================================

/// Errors produced while encoding or reading delimited frames.
///
/// None of these tear the stream down: after any of them a reader can try
/// the next frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream ended in the middle of a frame
    #[error("incomplete frame: stream ended after {} bytes without a delimiter", .partial.len())]
    IncompleteFrame {
        /// Bytes read before end-of-stream
        partial: Vec<u8>,
    },

    /// The payload could not be unmarshalled
    #[error("malformed frame '{}': {reason}", String::from_utf8_lossy(.raw))]
    MalformedFrame {
        /// The offending payload, without the delimiter
        raw: Vec<u8>,
        /// Marshaller error message
        reason: String,
    },

    /// The frame exceeded the configured size limit and was discarded
    #[error("frame too large (limit: {limit} bytes)")]
    OversizedFrame {
        /// Configured size limit in bytes
        limit: usize,
    },

    /// The stream ended cleanly between frames
    #[error("channel closed")]
    Closed,

    /// A marshaller emitted the frame delimiter inside a payload
    #[error("marshalled payload contains the frame delimiter")]
    DelimiterInPayload,

    /// Encoding failed
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// I/O error on the underlying stream
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error reported by a [`Marshaller`](crate::frame::Marshaller).
#[derive(Debug, Error)]
#[error("marshal error: {message}")]
pub struct MarshalError {
    /// Human-readable description from the underlying format
    pub message: String,
}

impl From<serde_json::Error> for MarshalError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Relay Errors
// ============================================================================

/// Relay endpoint and lifecycle errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Lifecycle operation not allowed in the current loop state
    #[error("cannot {operation} relay loop while {state}")]
    InvalidLoopState {
        /// Rejected operation (`"start"` or `"stop"`)
        operation: &'static str,
        /// State the loop was in
        state: LoopState,
    },

    /// `start_loop` was called outside a tokio runtime
    #[error("relay loop requires a tokio runtime")]
    NoRuntime,

    /// Registering the relay with the engine failed
    #[error(transparent)]
    Observer(#[from] ObserverError),

    /// Frame error on one of the channels
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// I/O error writing to a pipe
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Format Errors
// ============================================================================

/// Errors returned by [`LogFormatter`](crate::output::LogFormatter)
/// implementations.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Serialization of the event failed
    #[error("format failed: {0}")]
    Serialize(String),

    /// Framing of the event failed
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl From<serde_json::Error> for FormatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

// ============================================================================
// Level Pattern Errors
// ============================================================================

/// Errors parsing log levels and `name:LEVEL` patterns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LevelPatternError {
    /// Unknown level name
    #[error("unknown log level '{value}'{}", .suggestion.as_ref().map(|s| format!(", did you mean '{s}'?")).unwrap_or_default())]
    UnknownLevel {
        /// The rejected level text
        value: String,
        /// Closest known level name, if any is close enough
        suggestion: Option<String>,
    },

    /// Entry is not of the form `name:LEVEL`
    #[error("invalid level pattern entry '{0}', expected name:LEVEL")]
    MalformedEntry(String),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `logpipe` operations.
pub type Result<T> = std::result::Result<T, LogPipeError>;

// ============================================================================
// Tests
// ============================================================================
