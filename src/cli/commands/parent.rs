//! `logpipe parent`: spawn a program and re-emit its relayed logs.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{info, warn};

use crate::cli::args::{OutputFormat, ParentArgs};
use crate::config::RelayConfig;
use crate::error::{ExitCode, LogPipeError};
use crate::format::{JsonFormatter, PlainFormatter};
use crate::logger::parse_level_pattern;
use crate::output::{DistributionEngine, LogFormatter, WriterSink};
use crate::relay::{ControlCommand, ParentMessenger, ParentRelay};

/// Runs `program` as a relayed child until it exits.
///
/// The initial profile (if any) is sent first, then the control pipe is
/// closed. Returns the child's exit code.
///
/// # Errors
///
/// Returns an error if the level pattern is invalid, the program cannot be
/// spawned, or reading its log pipe fails.
pub async fn run(args: &ParentArgs) -> Result<i32, LogPipeError> {
    let Some((program, program_args)) = args.program.split_first() else {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "no program given").into());
    };
    if let Some(levels) = &args.child_levels {
        parse_level_pattern(levels)?;
    }

    let name = args.name.clone().unwrap_or_else(|| {
        Path::new(program)
            .file_stem()
            .map_or_else(|| "child".to_string(), |s| s.to_string_lossy().into_owned())
    });

    let mut child = Command::new(program)
        .args(program_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;
    info!(child = %name, pid = child.id(), "spawned child");

    let engine = Arc::new(DistributionEngine::new());
    let formatter: Arc<dyn LogFormatter> = match args.format {
        OutputFormat::Plain => Arc::new(PlainFormatter::new().with_logger_name().with_correlation()),
        OutputFormat::Json => Arc::new(JsonFormatter),
    };
    engine.add_observer(Arc::new(WriterSink::stderr()), formatter)?;

    let messenger = ParentMessenger::from_child(&mut child, RelayConfig::from_env())?;
    let relay = ParentRelay::new(name, messenger, engine);

    if let Some(levels) = &args.child_levels {
        let command = ControlCommand::ApplyProfile {
            levels: levels.clone(),
        };
        if let Err(e) = relay.send_command(&command).await {
            warn!(child = %relay.name(), error = %e, "failed to send level profile");
        }
    }
    if let Err(e) = relay.messenger().close_control().await {
        warn!(child = %relay.name(), error = %e, "failed to close control pipe");
    }

    let relayed = relay.run().await?;
    let status = child.wait().await?;
    info!(child = %relay.name(), relayed, %status, "child exited");

    Ok(status.code().unwrap_or(ExitCode::ERROR))
}
