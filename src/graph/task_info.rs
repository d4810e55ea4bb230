// src/graph/task_info.rs

//! Per-task slot state and scheduled build types.

use std::sync::Arc;

use crate::graph::task::Task;
use crate::types::TriggerOrigin;

/// Internal per-task state held by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    Idle,
    Running {
        run_id: u64,
        /// Set when a trigger arrived mid-run. Holds the origin of the
        /// follow-up run; a direct request wins over a watch trigger.
        rerun: Option<TriggerOrigin>,
    },
}

/// Public, read-only view of a task's scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    Idle,
    Running { run_id: u64, rerun_pending: bool },
}

impl From<SlotState> for TaskRunState {
    fn from(state: SlotState) -> Self {
        match state {
            SlotState::Idle => TaskRunState::Idle,
            SlotState::Running { run_id, rerun } => TaskRunState::Running {
                run_id,
                rerun_pending: rerun.is_some(),
            },
        }
    }
}

/// A build the scheduler has decided to start.
#[derive(Debug, Clone)]
pub struct ScheduledBuild {
    pub task: Arc<Task>,
    pub run_id: u64,
    pub origin: TriggerOrigin,
}

impl ScheduledBuild {
    pub fn name(&self) -> &str {
        &self.task.name
    }
}
