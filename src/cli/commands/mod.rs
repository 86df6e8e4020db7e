//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod child;
pub mod parent;

use crate::cli::args::{Cli, Commands};
use crate::error::{ExitCode, LogPipeError};

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// Returns the process exit code on success.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<i32, LogPipeError> {
    match cli.command {
        Commands::Child(args) => child::run(&args).await.map(|()| ExitCode::SUCCESS),
        Commands::Parent(args) => parent::run(&args).await,
    }
}
