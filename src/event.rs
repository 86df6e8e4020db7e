//! Log event model.
//!
//! A [`LogEvent`] is what the application hands to the engine: arguments are
//! still heterogeneous values and the timestamp is a full `DateTime`. A
//! [`ConvertedEvent`] is the display-ready projection produced once per
//! broadcast; it is also the wire form relayed from child to parent.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LevelPatternError;
use crate::render;

// ============================================================================
// Log Level
// ============================================================================

/// Ordered severity of a log event.
///
/// Serialized as its integer code (`Trace = 0` .. `None = 5`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum LogLevel {
    /// Finest-grained diagnostics.
    #[default]
    Trace = 0,
    /// Debugging information.
    Debug = 1,
    /// Normal operational messages.
    Info = 2,
    /// Something unexpected that the program recovered from.
    Warning = 3,
    /// A failure.
    Error = 4,
    /// Disables output when used as a threshold.
    None = 5,
}

impl LogLevel {
    /// All levels in ascending severity.
    pub const ALL: [Self; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::None,
    ];

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::None => "NONE",
        }
    }

    /// Converts an integer code back into a level.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Trace),
            1 => Some(Self::Debug),
            2 => Some(Self::Info),
            3 => Some(Self::Warning),
            4 => Some(Self::Error),
            5 => Some(Self::None),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> Self {
        level as Self
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = LevelPatternError;

    fn try_from(code: u8) -> Result<Self, LevelPatternError> {
        Self::from_code(code).ok_or_else(|| LevelPatternError::UnknownLevel {
            value: code.to_string(),
            suggestion: None,
        })
    }
}

impl FromStr for LogLevel {
    type Err = LevelPatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "NONE" => Ok(Self::None),
            _ => Err(LevelPatternError::UnknownLevel {
                value: s.to_string(),
                suggestion: suggest_level(&upper),
            }),
        }
    }
}

/// Suggest a level name for typo correction.
///
/// Returns the closest match if its Damerau-Levenshtein distance is ≤ 2.
fn suggest_level(input: &str) -> Option<String> {
    LogLevel::ALL
        .iter()
        .map(|l| (l.as_str(), strsim::damerau_levenshtein(input, l.as_str())))
        .filter(|(_, dist)| *dist <= 2)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

// ============================================================================
// Correlation
// ============================================================================

/// Opaque correlation token carried by every event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Correlation(pub String);

impl Correlation {
    /// Creates a correlation token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if no token is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// One heterogeneous log argument.
///
/// The variant decides how [`render`] turns it into text: bytes become hex,
/// strings are hex-encoded only when they are not ASCII-safe, everything else
/// goes through its `Display` impl.
#[derive(Clone)]
pub enum LogArg {
    /// Raw bytes (hashes, keys, payloads).
    Bytes(Vec<u8>),
    /// Text that may or may not be terminal-safe.
    Str(String),
    /// Any other value, rendered with `Display`.
    Display(Arc<dyn fmt::Display + Send + Sync>),
}

impl LogArg {
    /// Wraps an arbitrary displayable value.
    pub fn display(value: impl fmt::Display + Send + Sync + 'static) -> Self {
        Self::Display(Arc::new(value))
    }

    /// Captures an error by its message.
    pub fn error(err: &(dyn std::error::Error + '_)) -> Self {
        Self::Display(Arc::new(err.to_string()))
    }

    /// Wraps text that has already been rendered and must be shown verbatim.
    #[must_use]
    pub fn rendered(text: String) -> Self {
        Self::Display(Arc::new(text))
    }
}

impl fmt::Debug for LogArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Display(d) => f.debug_tuple("Display").field(&d.to_string()).finish(),
        }
    }
}

impl From<&str> for LogArg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for LogArg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for LogArg {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for LogArg {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for LogArg {
    fn from(value: [u8; N]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<Duration> for LogArg {
    fn from(value: Duration) -> Self {
        Self::display(HumanDuration(value))
    }
}

macro_rules! display_arg {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for LogArg {
                fn from(value: $ty) -> Self {
                    Self::display(value)
                }
            }
        )*
    };
}

display_arg!(bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// `Display` adapter printing a duration the way people read it (`4.001µs`).
#[derive(Debug, Clone, Copy)]
struct HumanDuration(Duration);

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

// ============================================================================
// Events
// ============================================================================

/// A structured log record prior to formatting.
#[derive(Debug, Clone, Default)]
pub struct LogEvent {
    /// Name of the emitting logger.
    pub logger_name: String,
    /// Opaque correlation token.
    pub correlation: Correlation,
    /// Human-readable message.
    pub message: String,
    /// Severity.
    pub level: LogLevel,
    /// Key/value style arguments, in order.
    pub args: Vec<LogArg>,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            ..Self::default()
        }
    }

    /// Sets the logger name.
    #[must_use]
    pub fn with_logger_name(mut self, name: impl Into<String>) -> Self {
        self.logger_name = name.into();
        self
    }

    /// Sets the correlation token.
    #[must_use]
    pub fn with_correlation(mut self, correlation: Correlation) -> Self {
        self.correlation = correlation;
        self
    }

    /// Replaces the argument list.
    #[must_use]
    pub fn with_args(mut self, args: Vec<LogArg>) -> Self {
        self.args = args;
        self
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Display-ready projection of a [`LogEvent`].
///
/// Field names follow the wire format (`LoggerName`, `Correlation`, ...).
/// Every field defaults when missing so that `{}` decodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ConvertedEvent {
    /// Name of the emitting logger.
    pub logger_name: String,
    /// Correlation token text.
    pub correlation: String,
    /// Human-readable message.
    pub message: String,
    /// Severity, as its integer code on the wire.
    pub log_level: LogLevel,
    /// Rendered arguments.
    pub args: Vec<String>,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ConvertedEvent {
    /// Renders `event` into its display-ready projection.
    ///
    /// Timestamps outside the `i64` nanosecond range collapse to `0`.
    #[must_use]
    pub fn from_event(event: &LogEvent) -> Self {
        Self {
            logger_name: event.logger_name.clone(),
            correlation: event.correlation.0.clone(),
            message: event.message.clone(),
            log_level: event.level,
            args: render::render_args(&event.args),
            timestamp: event.timestamp.timestamp_nanos_opt().unwrap_or_default(),
        }
    }
}

impl From<ConvertedEvent> for LogEvent {
    /// Rebuilds an event received from another process.
    ///
    /// Arguments were rendered by the sender and are kept verbatim.
    fn from(converted: ConvertedEvent) -> Self {
        Self {
            logger_name: converted.logger_name,
            correlation: Correlation(converted.correlation),
            message: converted.message,
            level: converted.log_level,
            args: converted.args.into_iter().map(LogArg::rendered).collect(),
            timestamp: DateTime::from_timestamp_nanos(converted.timestamp),
        }
    }
}
