// src/exec/executor.rs

//! Wraps a task's run operation with timing and outcome capture.

use std::time::{Instant, SystemTime};

use tracing::{error, info};

use crate::graph::task::{BuildOutcome, BuildRun, Task};
use crate::types::TriggerOrigin;

/// Run `task` once and record what happened.
///
/// Never fails: a compile failure is a [`BuildOutcome::Failure`].
pub async fn execute(task: &Task, run_id: u64, origin: TriggerOrigin) -> BuildRun {
    let started_at = SystemTime::now();
    let clock = Instant::now();
    info!(task = %task.name, run_id, ?origin, "build started");

    let outcome = match task.runner.run().await {
        Ok(outputs) => BuildOutcome::Success { outputs },
        Err(diagnostic) => BuildOutcome::Failure(diagnostic),
    };

    let run = BuildRun {
        task: task.name.clone(),
        run_id,
        origin,
        started_at,
        duration: clock.elapsed(),
        outcome,
    };

    match &run.outcome {
        BuildOutcome::Success { outputs } => info!(
            task = %run.task,
            run_id,
            outputs = outputs.len(),
            duration_ms = run.duration.as_millis() as u64,
            "build succeeded"
        ),
        BuildOutcome::Failure(diagnostic) => error!(
            task = %run.task,
            run_id,
            duration_ms = run.duration.as_millis() as u64,
            "build failed:\n{diagnostic}"
        ),
    }

    run
}
