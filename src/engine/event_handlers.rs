// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, warn};

use crate::graph::{BuildRun, ScheduledBuild, Scheduler};
use crate::types::TaskName;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Start these builds.
    DispatchBuilds(Vec<ScheduledBuild>),
    /// A browser-visible task succeeded; tell connected clients to reload.
    NotifyReload { task: TaskName },
    /// A direct request named a task that does not exist.
    RejectRunNow { task: TaskName },
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

fn dispatch(builds: Vec<ScheduledBuild>) -> Vec<CoreCommand> {
    if builds.is_empty() {
        Vec::new()
    } else {
        vec![CoreCommand::DispatchBuilds(builds)]
    }
}

/// A watcher fired for `binding`.
pub fn handle_binding_trigger(scheduler: &mut Scheduler, binding: &str) -> CoreStep {
    let step = scheduler.on_trigger(binding);
    if !step.queued.is_empty() {
        debug!(binding = %binding, queued = ?step.queued, "rerun queued for busy tasks");
    }
    CoreStep::running(dispatch(step.newly_scheduled))
}

/// Direct invocation of `task`.
pub fn handle_run_now(scheduler: &mut Scheduler, task: &str) -> CoreStep {
    match scheduler.run_now(task) {
        Ok(step) => CoreStep::running(dispatch(step.newly_scheduled)),
        Err(err) => {
            warn!(task = %task, error = %err, "run-now request rejected");
            CoreStep::running(vec![CoreCommand::RejectRunNow {
                task: task.to_string(),
            }])
        }
    }
}

/// A build finished. Failures only leave the task idle; they never stop the
/// runtime or affect other tasks.
pub fn handle_build_finished(scheduler: &mut Scheduler, run: &BuildRun) -> CoreStep {
    let mut commands = Vec::new();

    let browser_visible = scheduler
        .graph()
        .task(&run.task)
        .is_some_and(|t| t.browser_visible);

    if run.is_success() && browser_visible {
        commands.push(CoreCommand::NotifyReload {
            task: run.task.clone(),
        });
    }

    let step = scheduler.on_completed(run);
    commands.extend(dispatch(step.newly_scheduled));

    CoreStep::running(commands)
}
