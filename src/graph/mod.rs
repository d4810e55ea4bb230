// src/graph/mod.rs

//! Tasks, watch bindings and per-task scheduling.
//!
//! - [`task`] defines `Task`, the `TaskRunner` seam and `BuildRun`.
//! - [`graph`] holds the registered tasks and the bindings that trigger them.
//! - [`scheduler`] is the pure state machine enforcing at-most-one run per
//!   task and queue-one-rerun-on-busy.
//! - [`task_info`] provides per-task slot state and scheduled build types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`standard`] assembles the tasks and bindings of a web project.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod standard;
pub mod task;
pub mod task_info;

pub use graph::{TaskGraph, WatchBinding};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task::{BuildOutcome, BuildRun, RunFuture, Task, TaskRunner};
pub use task_info::{ScheduledBuild, TaskRunState};
