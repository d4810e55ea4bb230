// src/server/mod.rs

//! Supervision of the development HTTP server.
//!
//! - [`manager`] owns the child process and its lifecycle state machine.
//! - [`process`] holds the OS-level helpers: port checks, readiness
//!   detection, output forwarding and graceful termination.

pub mod manager;
pub mod process;

pub use manager::{ServerProcessManager, ServerRestartTask};

/// Lifecycle of the dev server.
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`; `Restarting`
/// covers a whole stop-then-start sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Restarting,
}

/// Read-only view of whether the dev server is up.
pub trait ServerStatus: Send + Sync {
    fn is_running(&self) -> bool;
}
