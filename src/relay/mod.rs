//! Parent/child log relay.
//!
//! Two pipes connect the processes: log-line frames flow child → parent and
//! control-command frames flow parent → child. The child side is driven by a
//! [`RelayLoop`]; the parent side by a [`ParentRelay`] that re-broadcasts
//! relayed events into its own [`DistributionEngine`](crate::output::DistributionEngine).

pub mod child;
pub mod control;
pub mod parent;

use std::fmt;

pub use child::{ChildMessenger, RelayLoop};
pub use control::{ControlCommand, ControlHandler};
pub use parent::{ParentMessenger, ParentRelay};

/// Lifecycle state of a [`RelayLoop`].
///
/// Transitions only move forward: `Idle → Running → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    /// Constructed, never started
    Idle = 0,
    /// Reader task running, relay registered with the engine
    Running = 1,
    /// Stopped; cannot be restarted
    Stopped = 2,
}

impl LoopState {
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}
