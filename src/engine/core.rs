// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces:
//! - an updated scheduler state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for reading
//! events from channels, handing builds to the executor, pushing reload
//! notifications and answering run-now callers.
//!
//! The core has no channels, no Tokio types, and performs no IO.

use crate::engine::event_handlers::{
    handle_binding_trigger, handle_build_finished, handle_run_now, CoreStep,
};
use crate::engine::RuntimeEvent;
use crate::graph::{Scheduler, TaskRunState};

#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    /// Whether no task is running.
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn state_of(&self, task: &str) -> Option<TaskRunState> {
        self.scheduler.state_of(task)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: &RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::BindingTriggered { binding } => {
                handle_binding_trigger(&mut self.scheduler, binding)
            }
            RuntimeEvent::RunNow { task, .. } => handle_run_now(&mut self.scheduler, task),
            RuntimeEvent::BuildFinished { run } => {
                handle_build_finished(&mut self.scheduler, run)
            }
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
