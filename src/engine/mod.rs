// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the per-task scheduler
//! - the main runtime event loop that reacts to:
//!   - coalesced watch triggers
//!   - direct "run now" requests
//!   - build completions
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. [`handle`] is the cloneable front door other
//! components use to talk to a running engine.

use tokio::sync::oneshot;

use crate::errors::Result;
use crate::graph::BuildRun;
use crate::types::{BindingName, TaskName};

/// Events flowing into the runtime from watchers, executors and callers.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// A watcher closed a coalescing window for this binding.
    BindingTriggered { binding: BindingName },
    /// Run a task unconditionally. `reply` receives the run that started
    /// after this request.
    RunNow {
        task: TaskName,
        reply: Option<oneshot::Sender<Result<BuildRun>>>,
    },
    /// A build finished, successfully or not.
    BuildFinished { run: BuildRun },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod handle;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use handle::SchedulerHandle;
pub use runtime::Runtime;
