// src/graph/task.rs

//! Tasks and the record of a single execution of one.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::exec::Diagnostic;
use crate::types::{TaskName, TriggerOrigin};

/// Boxed future returned by [`TaskRunner::run`].
pub type RunFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<PathBuf>, Diagnostic>> + Send + 'a>>;

/// The run operation of a task.
///
/// Implementations must only write below the task's output root. On success
/// they return the paths they wrote; on failure a [`Diagnostic`].
pub trait TaskRunner: Send + Sync {
    fn run(&self) -> RunFuture<'_>;
}

/// A named, idempotent unit of work.
#[derive(Clone)]
pub struct Task {
    pub name: TaskName,
    /// Include globs, relative to the project root.
    pub include: Vec<String>,
    /// Exclude globs, relative to the project root.
    pub exclude: Vec<String>,
    pub output_root: PathBuf,
    /// Whether a successful run should make connected browsers reload.
    pub browser_visible: bool,
    pub runner: Arc<dyn TaskRunner>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("output_root", &self.output_root)
            .field("browser_visible", &self.browser_visible)
            .finish_non_exhaustive()
    }
}

/// Result of one build run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Success { outputs: Vec<PathBuf> },
    Failure(Diagnostic),
}

/// One execution of a task.
#[derive(Debug, Clone)]
pub struct BuildRun {
    pub task: TaskName,
    pub run_id: u64,
    pub origin: TriggerOrigin,
    pub started_at: SystemTime,
    pub duration: Duration,
    pub outcome: BuildOutcome,
}

impl BuildRun {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Success { .. })
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match &self.outcome {
            BuildOutcome::Failure(d) => Some(d),
            BuildOutcome::Success { .. } => None,
        }
    }
}
