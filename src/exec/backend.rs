// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime hands scheduled builds to an `ExecutorBackend` and learns
//! about their completion through `RuntimeEvent::BuildFinished`. Tests swap
//! in a fake backend that completes builds without running anything.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::exec::diagnostic::Diagnostic;
use crate::exec::executor::execute;
use crate::graph::task::{BuildOutcome, BuildRun};
use crate::graph::ScheduledBuild;

/// Trait abstracting how scheduled builds are executed.
pub trait ExecutorBackend: Send {
    /// Start the given builds. Must not wait for them to finish; each
    /// completion is reported back as a `RuntimeEvent::BuildFinished`.
    fn spawn_builds(
        &mut self,
        builds: Vec<ScheduledBuild>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: every build runs in its own Tokio task.
pub struct RealExecutorBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl RealExecutorBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { runtime_tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_builds(
        &mut self,
        builds: Vec<ScheduledBuild>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let runtime_tx = self.runtime_tx.clone();

        Box::pin(async move {
            for build in builds {
                let tx = runtime_tx.clone();
                tokio::spawn(async move {
                    let task = build.task.clone();
                    let (run_id, origin) = (build.run_id, build.origin);

                    let run = match tokio::spawn(async move {
                        execute(&build.task, build.run_id, build.origin).await
                    })
                    .await
                    {
                        Ok(run) => run,
                        Err(join_err) => {
                            error!(task = %task.name, run_id, error = %join_err, "build task aborted");
                            BuildRun {
                                task: task.name.clone(),
                                run_id,
                                origin,
                                started_at: SystemTime::now(),
                                duration: Duration::ZERO,
                                outcome: BuildOutcome::Failure(Diagnostic::new(format!(
                                    "build aborted: {join_err}"
                                ))),
                            }
                        }
                    };

                    if tx.send(RuntimeEvent::BuildFinished { run }).await.is_err() {
                        debug!(task = %task.name, run_id, "runtime gone; dropping build result");
                    }
                });
            }
            Ok(())
        })
    }
}
