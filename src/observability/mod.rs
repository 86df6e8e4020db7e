//! Internal diagnostics for `logpipe` itself.
//!
//! Relayed application logs never go through `tracing`; this is only where
//! the crate reports on its own work (dropped frames, loop lifecycle).

pub mod logging;

pub use logging::{LogFormat, init_logging};
