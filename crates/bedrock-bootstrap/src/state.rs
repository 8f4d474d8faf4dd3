//! Lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bootstrapper lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BootstrapState {
    /// Nothing registered yet, or reset after a shutdown.
    Uninitialized = 0,
    /// Core services and modules are being registered.
    Initializing = 1,
    /// All modules registered.
    Running = 2,
    /// Shutdown hooks are running.
    ShuttingDown = 3,
    /// Hooks ran and the container was cleared. Needs `reset()`.
    Shutdown = 4,
}

impl From<u8> for BootstrapState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Initializing,
            2 => Self::Running,
            3 => Self::ShuttingDown,
            4 => Self::Shutdown,
            _ => Self::Uninitialized,
        }
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Shutdown => "shutdown",
        })
    }
}
