// tests/entry_plan.rs

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use devloop::entry::{execute_plan, ActionFuture, EntryContext, EntryGraph};
use devloop::errors::{DevloopError, Result};
use devloop::exec::Diagnostic;
use devloop::graph::{BuildOutcome, BuildRun};
use devloop::types::TriggerOrigin;
use devloop_test_utils::{init_tracing, with_timeout};

/// Records every action in the order it happened.
#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
    failing_tasks: HashSet<String>,
    server_fails: bool,
}

impl Recorder {
    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn position(&self, entry: &str) -> usize {
        self.log()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{entry} never happened"))
    }
}

impl EntryContext for Recorder {
    fn run_task(&self, task: &str) -> ActionFuture<'_, Result<BuildRun>> {
        let task = task.to_string();
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.log.lock().unwrap().push(format!("run {task}"));
            let outcome = if self.failing_tasks.contains(&task) {
                BuildOutcome::Failure(Diagnostic::new("broken"))
            } else {
                BuildOutcome::Success {
                    outputs: Vec::new(),
                }
            };
            Ok(BuildRun {
                task,
                run_id: 1,
                origin: TriggerOrigin::Direct,
                started_at: SystemTime::now(),
                duration: Duration::ZERO,
                outcome,
            })
        })
    }

    fn watch(&self, binding: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("watch {binding}"));
        Ok(())
    }

    fn start_server(&self) -> ActionFuture<'_, Result<()>> {
        Box::pin(async move {
            self.log.lock().unwrap().push("start server".to_string());
            if self.server_fails {
                Err(DevloopError::Other(anyhow::anyhow!("port taken")))
            } else {
                Ok(())
            }
        })
    }
}

#[tokio::test]
async fn default_builds_everything_before_watching() {
    init_tracing();
    let plan = EntryGraph::standard().unwrap().plan("default").unwrap();
    let ctx = Arc::new(Recorder::default());

    let outcome = with_timeout(execute_plan(&plan, ctx.clone())).await;

    assert_eq!(outcome.failed, 0);
    assert_eq!(
        outcome.watching,
        vec!["assets", "scripts", "server", "styles", "templates"]
    );

    let first_watch = ctx
        .log()
        .iter()
        .position(|e| e.starts_with("watch") && e != "watch scripts")
        .unwrap();
    for built in ["run templates", "run styles", "run assets", "start server"] {
        assert!(ctx.position(built) < first_watch, "{built} after a watch");
    }
    // watchify watches right after its own bundle.
    assert!(ctx.position("run scripts") < ctx.position("watch scripts"));
    assert!(ctx.position("start server") < ctx.position("watch server"));
}

#[tokio::test]
async fn failures_are_counted_and_the_plan_continues() {
    init_tracing();
    let plan = EntryGraph::standard().unwrap().plan("default").unwrap();
    let ctx = Arc::new(Recorder {
        failing_tasks: ["styles".to_string()].into_iter().collect(),
        server_fails: true,
        ..Recorder::default()
    });

    let outcome = with_timeout(execute_plan(&plan, ctx.clone())).await;

    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.watching.len(), 5);
    assert!(ctx.log().contains(&"watch styles".to_string()));
}

#[tokio::test]
async fn one_shot_entry_runs_a_single_task() {
    init_tracing();
    let plan = EntryGraph::standard().unwrap().plan("less").unwrap();
    let ctx = Arc::new(Recorder::default());

    let outcome = with_timeout(execute_plan(&plan, ctx.clone())).await;

    assert_eq!(ctx.log(), vec!["run styles".to_string()]);
    assert_eq!(outcome.succeeded, 1);
    assert!(outcome.watching.is_empty());
    assert!(!plan.is_long_running());
}

#[test]
fn every_documented_entry_exists() {
    let graph = EntryGraph::standard().unwrap();
    let names: Vec<&str> = graph.names().collect();
    for expected in [
        "default",
        "make",
        "make:watch",
        "bundle",
        "watchify",
        "less",
        "less:watch",
        "copy-assets",
        "copy-assets:watch",
        "server:start",
        "server:restart",
        "server:watch",
    ] {
        assert!(names.contains(&expected), "missing {expected}");
    }
}
