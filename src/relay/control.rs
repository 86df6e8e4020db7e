//! Control commands sent from parent to child.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A command pushed over the control channel.
///
/// Wire form is a JSON object tagged by `"command"`:
///
/// ```json
/// {"command":"apply_profile","levels":"*:INFO,net:DEBUG"}
/// {"command":"set_correlation","token":"round-7"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Apply a `name:LEVEL,...` level pattern
    ApplyProfile {
        /// Level pattern
        levels: String,
    },
    /// Replace the correlation token stamped on subsequent events
    SetCorrelation {
        /// New token
        token: String,
    },
}

/// Receives control commands decoded by the relay loop.
///
/// Called from the loop's reader task; implementations must not block.
pub trait ControlHandler: Send + Sync {
    /// Applies one command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be applied; the relay loop logs
    /// it and keeps reading.
    fn handle_command(&self, command: ControlCommand) -> Result<()>;
}
