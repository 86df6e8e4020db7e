//! Command-line interface for the `logpipe` binary.

pub mod args;
pub mod commands;
