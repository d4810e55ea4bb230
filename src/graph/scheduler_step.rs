// src/graph/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::graph::task_info::ScheduledBuild;
use crate::types::TaskName;

/// Structured result of a single scheduler "step".
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Builds that should start now.
    pub newly_scheduled: Vec<ScheduledBuild>,
    /// Busy tasks that now have a follow-up run pending.
    pub queued: Vec<TaskName>,
}

impl SchedulerStep {
    pub fn is_empty(&self) -> bool {
        self.newly_scheduled.is_empty() && self.queued.is_empty()
    }

    pub(crate) fn merge(&mut self, other: SchedulerStep) {
        self.newly_scheduled.extend(other.newly_scheduled);
        self.queued.extend(other.queued);
    }
}
