// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::errors::{DevloopError, Result};
use crate::exec::ExecutorBackend;
use crate::graph::{BuildRun, ScheduledBuild};
use crate::reload::Notifier;
use crate::types::TaskName;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

type Waiter = oneshot::Sender<Result<BuildRun>>;

/// Async IO shell around [`CoreRuntime`].
///
/// It reads `RuntimeEvent`s, feeds them to the core, hands scheduled builds
/// to the `ExecutorBackend`, pushes reload notifications and resolves
/// run-now callers. It never awaits a build, so triggers keep flowing while
/// builds run.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    notifier: Notifier,
    /// Run-now callers waiting for the next dispatch of a task.
    pending_waiters: HashMap<TaskName, Vec<Waiter>>,
    /// Run-now callers waiting for a specific run to finish.
    active_waiters: HashMap<u64, Vec<Waiter>>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        notifier: Notifier,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            notifier,
            pending_waiters: HashMap::new(),
            active_waiters: HashMap::new(),
        }
    }

    /// Main event loop. Returns when shutdown is requested or every sender
    /// is gone.
    pub async fn run(mut self) -> Result<()> {
        info!("devloop runtime started");

        while let Some(mut event) = self.event_rx.recv().await {
            debug!(?event, "runtime received event");

            if let RuntimeEvent::RunNow { task, reply } = &mut event {
                if let Some(reply) = reply.take() {
                    self.pending_waiters
                        .entry(task.clone())
                        .or_default()
                        .push(reply);
                }
            }

            let step = self.core.step(&event);

            if let RuntimeEvent::BuildFinished { run } = &event {
                self.resolve_waiters(run);
            }

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("shutdown requested; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchBuilds(builds) => self.dispatch(builds).await?,
            CoreCommand::NotifyReload { task } => {
                let delivered = self.notifier.notify_all();
                debug!(task = %task, delivered, "reload notification pushed");
            }
            CoreCommand::RejectRunNow { task } => {
                for waiter in self.pending_waiters.remove(&task).unwrap_or_default() {
                    let _ = waiter.send(Err(DevloopError::TaskNotFound(task.clone())));
                }
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, builds: Vec<ScheduledBuild>) -> Result<()> {
        if builds.is_empty() {
            return Ok(());
        }

        for build in &builds {
            if let Some(waiters) = self.pending_waiters.remove(build.name()) {
                self.active_waiters
                    .entry(build.run_id)
                    .or_default()
                    .extend(waiters);
            }
        }

        let names: Vec<_> = builds.iter().map(|b| b.name()).collect();
        let run_ids: Vec<_> = builds.iter().map(|b| b.run_id).collect();
        debug!(?names, ?run_ids, "dispatching builds");

        self.executor.spawn_builds(builds).await
    }

    fn resolve_waiters(&mut self, run: &BuildRun) {
        for waiter in self.active_waiters.remove(&run.run_id).unwrap_or_default() {
            let _ = waiter.send(Ok(run.clone()));
        }
    }
}
