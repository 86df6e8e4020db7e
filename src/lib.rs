//! `logpipe` - structured log fan-out and parent/child log relay
//!
//! A [`DistributionEngine`](output::DistributionEngine) broadcasts each log
//! event to a list of (sink, formatter) pairs. The [`relay`] module carries
//! those events from a child process to its parent over a pipe, and carries
//! control commands (level profiles, correlation tokens) the other way.

pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod frame;
pub mod logger;
pub mod observability;
pub mod output;
pub mod relay;
pub mod render;

pub use error::{LogPipeError, Result};
pub use event::{ConvertedEvent, Correlation, LogArg, LogEvent, LogLevel};
pub use logger::{Logger, LoggerRegistry};
pub use output::{DistributionEngine, LogFormatter, LogSink};
