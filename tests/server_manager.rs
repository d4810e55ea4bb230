// tests/server_manager.rs

#![cfg(unix)]

use std::error::Error;
use std::net::TcpListener;
use std::sync::Arc;

use devloop::errors::ServerStartError;
use devloop::graph::TaskRunner;
use devloop::server::{ServerProcessManager, ServerRestartTask, ServerState, ServerStatus};
use devloop_test_utils::builders::ConfigFileBuilder;
use devloop_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

const LONG_RUNNING: &str = "echo listening on $PORT; exec sleep 30";

fn free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    listener.local_addr().unwrap().port()
}

fn manager(script: &str, port: u16, stop_timeout: &str) -> ServerProcessManager {
    let cfg = ConfigFileBuilder::new()
        .with_server_cmd("sh", &["-c", script])
        .with_server_host("127.0.0.1")
        .with_server_port(port)
        .with_ready_on_stdout("listening")
        .with_server_timeouts("3s", stop_timeout)
        .build();
    ServerProcessManager::new(cfg.server, std::env::temp_dir(), "app/server.js", Vec::new())
        .unwrap()
}

fn is_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn start_reports_running_with_a_pid() -> TestResult {
    init_tracing();
    let m = manager(LONG_RUNNING, free_port(), "2s");

    with_timeout(m.start()).await?;
    assert_eq!(m.state(), ServerState::Running);
    assert!(m.is_running());
    let pid = m.pid().expect("pid");
    assert!(is_alive(pid));

    assert!(with_timeout(m.stop()).await.is_none());
    assert_eq!(m.state(), ServerState::Stopped);
    assert_eq!(m.pid(), None);
    assert!(!is_alive(pid));
    Ok(())
}

#[tokio::test]
async fn occupied_port_fails_without_spawning() {
    init_tracing();
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    let m = manager(LONG_RUNNING, port, "2s");

    let err = with_timeout(m.start()).await.unwrap_err();
    assert!(matches!(err, ServerStartError::PortUnavailable { port: p, .. } if p == port));
    assert_eq!(m.state(), ServerState::Stopped);
    assert_eq!(m.pid(), None);
}

#[tokio::test]
async fn early_exit_is_reported_with_its_code() {
    init_tracing();
    let m = manager("exit 3", free_port(), "2s");

    let err = with_timeout(m.start()).await.unwrap_err();
    assert!(matches!(err, ServerStartError::ExitedImmediately { code: Some(3) }));
    assert_eq!(m.state(), ServerState::Stopped);
}

#[tokio::test]
async fn restart_leaves_exactly_one_live_process() -> TestResult {
    init_tracing();
    let m = manager(LONG_RUNNING, free_port(), "2s");

    with_timeout(m.start()).await?;
    let first = m.pid().expect("first pid");

    with_timeout(m.restart()).await?;
    let second = m.pid().expect("second pid");
    with_timeout(m.restart()).await?;
    let third = m.pid().expect("third pid");

    assert_ne!(first, second);
    assert_ne!(second, third);
    assert!(!is_alive(first));
    assert!(!is_alive(second));
    assert!(is_alive(third));
    assert_eq!(m.state(), ServerState::Running);

    m.stop().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_restarts_are_serialised() -> TestResult {
    init_tracing();
    let m = Arc::new(manager(LONG_RUNNING, free_port(), "2s"));
    with_timeout(m.start()).await?;

    let (a, b) = tokio::join!(m.restart(), m.restart());
    a?;
    b?;

    let pid = m.pid().expect("pid");
    assert!(is_alive(pid));
    assert_eq!(m.state(), ServerState::Running);

    m.stop().await;
    Ok(())
}

#[tokio::test]
async fn restart_of_stopped_server_starts_it() -> TestResult {
    init_tracing();
    let m = manager(LONG_RUNNING, free_port(), "2s");

    with_timeout(m.restart()).await?;
    assert_eq!(m.state(), ServerState::Running);

    m.stop().await;
    Ok(())
}

#[tokio::test]
async fn stubborn_process_is_killed_after_stop_timeout() -> TestResult {
    init_tracing();
    let m = manager(
        "trap '' TERM; echo listening; while true; do sleep 1; done",
        free_port(),
        "300ms",
    );

    with_timeout(m.start()).await?;
    let pid = m.pid().expect("pid");

    let forced = with_timeout(m.stop()).await.expect("stop had to force");
    assert_eq!(forced.timeout.as_millis(), 300);
    assert_eq!(m.state(), ServerState::Stopped);
    assert!(!is_alive(pid));
    Ok(())
}

#[tokio::test]
async fn restart_task_surfaces_start_failure_as_diagnostic() {
    init_tracing();
    let m = Arc::new(manager("exit 3", free_port(), "2s"));
    let task = ServerRestartTask::new(m.clone());

    let diag = with_timeout(task.run()).await.unwrap_err();
    assert!(diag.message.contains("exit code"), "{diag}");
    assert_eq!(m.state(), ServerState::Stopped);
}

#[tokio::test]
async fn crash_after_ready_is_noticed() -> TestResult {
    init_tracing();
    let m = manager("echo listening; sleep 0.2; exit 1", free_port(), "2s");

    with_timeout(m.start()).await?;
    assert_eq!(m.state(), ServerState::Running);

    with_timeout(async {
        while m.is_running() {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    })
    .await;

    assert_eq!(m.state(), ServerState::Stopped);
    assert_eq!(m.pid(), None);
    assert!(with_timeout(m.stop()).await.is_none());

    // A restart after the crash brings it back.
    with_timeout(m.restart()).await?;
    assert_eq!(m.state(), ServerState::Running);
    assert!(m.pid().is_some());
    m.stop().await;
    Ok(())
}
