//! `logpipe child`: demo child process.
//!
//! Relays its own log lines as frames on stdout and applies control
//! commands read from stdin.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

use crate::cli::args::ChildArgs;
use crate::error::Result;
use crate::logger::LoggerRegistry;
use crate::output::DistributionEngine;
use crate::relay::{ControlCommand, ControlHandler, RelayLoop};

/// Logger name used for the emitted lines.
pub const CHILD_LOGGER: &str = "child";

/// Applies commands to the registry and signals each one.
struct SignallingHandler {
    registry: Arc<LoggerRegistry>,
    applied: Arc<Notify>,
}

impl ControlHandler for SignallingHandler {
    fn handle_command(&self, command: ControlCommand) -> Result<()> {
        let outcome = self.registry.handle_command(command);
        self.applied.notify_one();
        outcome
    }
}

/// Runs the demo child.
///
/// # Errors
///
/// Returns an error if the initial level pattern is invalid or the relay
/// loop cannot start.
pub async fn run(args: &ChildArgs) -> Result<()> {
    let engine = Arc::new(DistributionEngine::new());
    let registry = Arc::new(LoggerRegistry::new(Arc::clone(&engine)));
    if let Some(pattern) = &args.level {
        registry.set_levels(pattern)?;
    }

    let applied = Arc::new(Notify::new());
    let handler = SignallingHandler {
        registry: Arc::clone(&registry),
        applied: Arc::clone(&applied),
    };
    let relay = RelayLoop::new(
        engine,
        Arc::new(handler),
        tokio::io::stdin(),
        std::io::stdout(),
    );
    relay.start_loop()?;

    if args.await_control {
        debug!("waiting for control command");
        tokio::select! {
            () = applied.notified() => {}
            () = relay.closed() => debug!("control channel closed before any command"),
        }
    }

    let logger = registry.get_or_create(CHILD_LOGGER);
    for seq in 0..args.count {
        logger.info(&args.message, vec!["seq".into(), seq.into()]);
        logger.debug("tick detail", vec!["interval".into(), args.interval.into()]);
        logger.trace("tick payload", vec!["bytes".into(), seq.to_be_bytes().into()]);
        if !args.interval.is_zero() && seq + 1 < args.count {
            tokio::time::sleep(args.interval).await;
        }
    }

    relay.stop_loop()?;
    Ok(())
}
