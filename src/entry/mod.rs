// src/entry/mod.rs

//! Named CLI entry points and the execution of their plans.

pub mod graph;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::errors::Result;
use crate::graph::BuildRun;
use crate::types::{BindingName, TaskName};

pub use graph::{EntryGraph, EntryPoint, Plan};

/// One step of an entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    /// Run a task once through the scheduler and wait for the result.
    Run(TaskName),
    /// Start watching a binding; its changes trigger from then on.
    Watch(BindingName),
    /// Launch the dev server if it is not already running.
    StartServer,
}

pub type ActionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What an entry plan acts on. The live implementation talks to the
/// scheduler, the watchers and the server manager.
pub trait EntryContext: Send + Sync + 'static {
    fn run_task(&self, task: &str) -> ActionFuture<'_, Result<BuildRun>>;
    fn watch(&self, binding: &str) -> Result<()>;
    fn start_server(&self) -> ActionFuture<'_, Result<()>>;
}

/// Result of executing a plan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Runs that finished without error.
    pub succeeded: usize,
    /// Runs, server starts and watches that failed.
    pub failed: usize,
    /// Bindings now being watched.
    pub watching: Vec<BindingName>,
}

impl PlanOutcome {
    fn merge(&mut self, other: PlanOutcome) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.watching.extend(other.watching);
    }
}

/// Execute `plan` level by level. Entries within a level run concurrently;
/// actions within an entry run in order. A failing action is counted and
/// logged, and the plan carries on.
pub async fn execute_plan(plan: &Plan, ctx: Arc<dyn EntryContext>) -> PlanOutcome {
    let mut outcome = PlanOutcome::default();

    for (depth, level) in plan.levels.iter().enumerate() {
        let mut set = JoinSet::new();
        for entry in level.iter().cloned() {
            let ctx = Arc::clone(&ctx);
            set.spawn(run_entry(entry, ctx));
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry_outcome) => outcome.merge(entry_outcome),
                Err(err) => {
                    error!(depth, error = %err, "entry point task panicked");
                    outcome.failed += 1;
                }
            }
        }
    }

    outcome.watching.sort();
    outcome
}

async fn run_entry(entry: EntryPoint, ctx: Arc<dyn EntryContext>) -> PlanOutcome {
    let mut outcome = PlanOutcome::default();
    info!(entry = %entry.name, "running entry point");

    for action in &entry.actions {
        match action {
            EntryAction::Run(task) => match ctx.run_task(task).await {
                Ok(run) if run.is_success() => outcome.succeeded += 1,
                Ok(run) => {
                    warn!(entry = %entry.name, task = %task, "build failed");
                    if let Some(diag) = run.diagnostic() {
                        error!(task = %task, "{}", diag);
                    }
                    outcome.failed += 1;
                }
                Err(err) => {
                    error!(entry = %entry.name, task = %task, error = %err, "could not run task");
                    outcome.failed += 1;
                }
            },
            EntryAction::Watch(binding) => match ctx.watch(binding) {
                Ok(()) => outcome.watching.push(binding.clone()),
                Err(err) => {
                    error!(entry = %entry.name, binding = %binding, error = %err, "could not watch");
                    outcome.failed += 1;
                }
            },
            EntryAction::StartServer => match ctx.start_server().await {
                Ok(()) => outcome.succeeded += 1,
                Err(err) => {
                    error!(entry = %entry.name, error = %err, "dev server not started");
                    outcome.failed += 1;
                }
            },
        }
    }

    outcome
}
