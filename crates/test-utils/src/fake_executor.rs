use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use devloop::engine::RuntimeEvent;
use devloop::errors::Result;
use devloop::exec::{Diagnostic, ExecutorBackend};
use devloop::graph::{BuildOutcome, BuildRun, RunFuture, ScheduledBuild, TaskRunner};
use devloop::server::ServerStatus;

/// A fake executor that:
/// - records which tasks were "run"
/// - reports `BuildFinished` for each scheduled build, failing the ones
///   named in `failing`.
///
/// Completions are sent from a spawned task so the runtime loop is never
/// blocked on its own channel.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Shared set of task names whose builds should fail.
    pub fn failing(&self) -> Arc<Mutex<HashSet<String>>> {
        Arc::clone(&self.failing)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_builds(
        &mut self,
        builds: Vec<ScheduledBuild>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = Arc::clone(&self.failing);

        Box::pin(async move {
            for build in builds {
                executed.lock().unwrap().push(build.name().to_string());
                let fail = failing.lock().unwrap().contains(build.name());

                let run = BuildRun {
                    task: build.name().to_string(),
                    run_id: build.run_id,
                    origin: build.origin,
                    started_at: SystemTime::now(),
                    duration: Duration::ZERO,
                    outcome: if fail {
                        BuildOutcome::Failure(Diagnostic::new("fake failure"))
                    } else {
                        BuildOutcome::Success {
                            outputs: Vec::new(),
                        }
                    },
                };

                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(RuntimeEvent::BuildFinished { run }).await;
                });
            }
            Ok(())
        })
    }
}

/// A `TaskRunner` that sleeps, counts its calls and tracks how many of its
/// runs overlap.
#[derive(Debug, Default)]
pub struct FakeRunner {
    delay: Duration,
    fail: AtomicBool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRunner {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous runs observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl TaskRunner for FakeRunner {
    fn run(&self) -> RunFuture<'_> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(Diagnostic::new("fake failure"))
            } else {
                Ok(vec![PathBuf::from("build/out")])
            }
        })
    }
}

/// A server status that tests flip by hand.
#[derive(Debug, Default)]
pub struct StubServerStatus {
    running: AtomicBool,
}

impl StubServerStatus {
    pub fn new(running: bool) -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(running),
        })
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl ServerStatus for StubServerStatus {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
