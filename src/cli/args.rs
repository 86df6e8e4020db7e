//! CLI argument definitions
//!
//! All Clap derive structs for `logpipe` command-line parsing.

use std::ffi::OsString;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Structured log fan-out and parent/child log relay.
#[derive(Parser, Debug)]
#[command(name = "logpipe", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all diagnostics.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Diagnostic output format.
    #[arg(long, default_value = "human", global = true, env = "LOGPIPE_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "LOGPIPE_COLOR")]
    pub color: ColorChoice,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a demo child that relays its logs to the parent over stdout.
    Child(ChildArgs),

    /// Spawn a program and re-emit the logs it relays.
    Parent(ParentArgs),
}

// ============================================================================
// Child Command
// ============================================================================

/// Arguments for `child`.
#[derive(Args, Debug)]
pub struct ChildArgs {
    /// Number of log lines to emit.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: u64,

    /// Message of every emitted line.
    #[arg(short, long, default_value = "tick")]
    pub message: String,

    /// Pause between lines (e.g. `50ms`, `1s`).
    #[arg(long, default_value = "0s", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// Initial level pattern (e.g. `*:DEBUG,net:TRACE`).
    #[arg(short, long, env = "LOGPIPE_LEVELS")]
    pub level: Option<String>,

    /// Wait for the first control command before emitting.
    #[arg(long)]
    pub await_control: bool,
}

// ============================================================================
// Parent Command
// ============================================================================

/// Arguments for `parent`.
#[derive(Args, Debug)]
pub struct ParentArgs {
    /// Name prefixed to relayed logger names (defaults to the program name).
    #[arg(long)]
    pub name: Option<String>,

    /// Output format for relayed lines on stderr.
    #[arg(short, long, default_value = "plain")]
    pub format: OutputFormat,

    /// Level pattern pushed to the child before it starts logging.
    #[arg(long, env = "LOGPIPE_CHILD_LEVELS")]
    pub child_levels: Option<String>,

    /// Program to spawn, followed by its arguments.
    #[arg(required = true, last = true, num_args = 1..)]
    pub program: Vec<OsString>,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for relayed lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// `LEVEL[timestamp] [name] [correlation] message key = value`
    #[default]
    Plain,
    /// One JSON object per line.
    Json,
}
