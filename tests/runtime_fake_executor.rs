// tests/runtime_fake_executor.rs

use std::collections::HashSet;
use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use devloop::engine::{CoreRuntime, Runtime, RuntimeEvent, SchedulerHandle};
use devloop::errors::DevloopError;
use devloop::graph::{BuildOutcome, Scheduler, TaskGraph, TaskRunState};
use devloop::reload::{Notifier, ReloadChannel};
use devloop::types::TriggerOrigin;
use devloop_test_utils::builders::TaskGraphBuilder;
use devloop_test_utils::fake_executor::{FakeExecutor, FakeRunner, StubServerStatus};
use devloop_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// styles (browser-visible), assets and server (not visible).
fn web_graph() -> TaskGraph {
    TaskGraphBuilder::new()
        .task("styles", &["app/style/**/*.less"], true, FakeRunner::new(Duration::ZERO))
        .task("assets", &["app/**"], false, FakeRunner::new(Duration::ZERO))
        .task("server", &["app/server.js"], false, FakeRunner::new(Duration::ZERO))
        .build()
}

struct Harness {
    handle: SchedulerHandle,
    executed: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    reloads: mpsc::Receiver<()>,
    runtime: JoinHandle<devloop::errors::Result<()>>,
}

fn start(server_running: bool) -> Harness {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);

    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());
    let failing = executor.failing();

    let channel = Arc::new(ReloadChannel::new());
    let (_, reloads) = channel.subscribe();
    let notifier = Notifier::new(channel, StubServerStatus::new(server_running));

    let core = CoreRuntime::new(Scheduler::new(web_graph()));
    let runtime = tokio::spawn(Runtime::new(core, rt_rx, executor, notifier).run());

    Harness {
        handle: SchedulerHandle::new(rt_tx),
        executed,
        failing,
        reloads,
        runtime,
    }
}

async fn no_reload(rx: &mut mpsc::Receiver<()>) -> bool {
    timeout(Duration::from_millis(100), rx.recv()).await.is_err()
}

#[tokio::test]
async fn style_change_rebuilds_styles_and_reloads() -> TestResult {
    init_tracing();
    let mut h = start(true);

    h.handle.trigger("styles").await?;
    with_timeout(h.reloads.recv()).await.expect("reload pushed");

    assert_eq!(*h.executed.lock().unwrap(), vec!["styles".to_string()]);
    Ok(())
}

#[tokio::test]
async fn server_entry_change_runs_no_compile_task() -> TestResult {
    init_tracing();
    let mut h = start(true);

    let run = with_timeout(h.handle.run_now("server")).await?;
    assert!(run.is_success());
    assert!(no_reload(&mut h.reloads).await);

    assert_eq!(*h.executed.lock().unwrap(), vec!["server".to_string()]);
    Ok(())
}

#[tokio::test]
async fn asset_copy_does_not_reload() -> TestResult {
    init_tracing();
    let mut h = start(true);

    with_timeout(h.handle.run_now("assets")).await?;
    assert!(no_reload(&mut h.reloads).await);
    Ok(())
}

#[tokio::test]
async fn run_now_resolves_with_the_build_record() -> TestResult {
    init_tracing();
    let h = start(true);

    let run = with_timeout(h.handle.run_now("styles")).await?;
    assert_eq!(run.task, "styles");
    assert_eq!(run.origin, TriggerOrigin::Direct);
    assert!(matches!(run.outcome, BuildOutcome::Success { .. }));
    Ok(())
}

#[tokio::test]
async fn run_now_for_unknown_task_is_rejected() -> TestResult {
    init_tracing();
    let h = start(true);

    let err = with_timeout(h.handle.run_now("deploy")).await.unwrap_err();
    assert!(matches!(err, DevloopError::TaskNotFound(name) if name == "deploy"));
    Ok(())
}

#[tokio::test]
async fn failed_build_stays_quiet_and_next_trigger_retries() -> TestResult {
    init_tracing();
    let mut h = start(true);

    h.failing.lock().unwrap().insert("styles".to_string());
    let run = with_timeout(h.handle.run_now("styles")).await?;
    assert!(!run.is_success());
    assert!(no_reload(&mut h.reloads).await);

    h.failing.lock().unwrap().clear();
    h.handle.trigger("styles").await?;
    with_timeout(h.reloads.recv()).await.expect("reload after fix");

    assert_eq!(h.executed.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn no_reload_while_server_is_down() -> TestResult {
    init_tracing();
    let mut h = start(false);

    with_timeout(h.handle.run_now("styles")).await?;
    assert!(no_reload(&mut h.reloads).await);
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_the_runtime() -> TestResult {
    init_tracing();
    let h = start(true);

    h.handle.shutdown().await?;
    with_timeout(h.runtime).await??;
    Ok(())
}

#[tokio::test]
async fn burst_while_busy_runs_exactly_one_follow_up() -> TestResult {
    init_tracing();

    let runner = FakeRunner::new(Duration::from_millis(50));
    let graph = TaskGraphBuilder::new()
        .task("styles", &["app/style/**/*.less"], true, runner.clone())
        .build();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executor = devloop::exec::RealExecutorBackend::new(rt_tx.clone());
    let notifier = Notifier::new(Arc::new(ReloadChannel::new()), StubServerStatus::new(true));
    let core = CoreRuntime::new(Scheduler::new(graph));
    tokio::spawn(Runtime::new(core, rt_rx, executor, notifier).run());
    let handle = SchedulerHandle::new(rt_tx);

    for _ in 0..5 {
        handle.trigger("styles").await?;
    }
    // Folded into the pending rerun; resolves with the follow-up build.
    let follow_up = with_timeout(handle.run_now("styles")).await?;

    assert_eq!(follow_up.origin, TriggerOrigin::Direct);
    assert_eq!(runner.calls(), 2);
    assert_eq!(runner.max_in_flight(), 1);
    Ok(())
}

#[tokio::test]
async fn core_reports_rerun_pending_for_busy_task() {
    init_tracing();
    let mut core = CoreRuntime::new(Scheduler::new(web_graph()));
    assert!(core.is_idle());

    core.step(&RuntimeEvent::BindingTriggered {
        binding: "styles".to_string(),
    });
    core.step(&RuntimeEvent::BindingTriggered {
        binding: "styles".to_string(),
    });

    assert!(matches!(
        core.state_of("styles"),
        Some(TaskRunState::Running {
            rerun_pending: true,
            ..
        })
    ));
    assert_eq!(core.state_of("assets"), Some(TaskRunState::Idle));
    assert!(!core.is_idle());
}

#[tokio::test]
async fn core_returns_to_idle_after_follow_up_completes() {
    init_tracing();
    let mut core = CoreRuntime::new(Scheduler::new(web_graph()));
    let trigger = RuntimeEvent::BindingTriggered {
        binding: "styles".to_string(),
    };

    core.step(&trigger);
    core.step(&trigger);

    for _ in 0..2 {
        let Some(TaskRunState::Running { run_id, .. }) = core.state_of("styles") else {
            panic!("styles should be running");
        };
        core.step(&RuntimeEvent::BuildFinished {
            run: devloop_test_utils::builders::finished_run("styles", run_id, true),
        });
    }

    assert!(core.is_idle());
}
