// tests/watch_trigger.rs

use std::fs;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use devloop::engine::RuntimeEvent;
use devloop::graph::WatchBinding;
use devloop::watch::{spawn_watchers, watch_binding};
use devloop_test_utils::init_tracing;

fn binding(name: &str, pattern: &str) -> WatchBinding {
    WatchBinding {
        name: name.to_string(),
        patterns: vec![pattern.to_string()],
        exclude: Vec::new(),
        tasks: vec![name.to_string()],
    }
}

async fn next_trigger(rx: &mut mpsc::Receiver<RuntimeEvent>) -> Option<String> {
    match timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(RuntimeEvent::BindingTriggered { binding })) => Some(binding),
        _ => None,
    }
}

#[tokio::test]
async fn burst_of_writes_yields_one_trigger() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("app/style")).unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let _watch = watch_binding(
        dir.path(),
        binding("styles", "app/style/**/*.less"),
        Duration::from_millis(200),
        tx,
    )
    .unwrap();

    for i in 0..5 {
        fs::write(dir.path().join("app/style/app.less"), format!("a{{z-index:{i}}}")).unwrap();
    }

    assert_eq!(next_trigger(&mut rx).await.as_deref(), Some("styles"));
    assert!(timeout(Duration::from_millis(500), rx.recv()).await.is_err());
}

#[tokio::test]
async fn unrelated_file_does_not_trigger() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("app/style")).unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let _watch = watch_binding(
        dir.path(),
        binding("styles", "app/style/**/*.less"),
        Duration::from_millis(50),
        tx,
    )
    .unwrap();

    fs::write(dir.path().join("app/style/notes.txt"), "x").unwrap();
    assert!(timeout(Duration::from_millis(500), rx.recv()).await.is_err());
}

#[tokio::test]
async fn bindings_fire_independently() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("app/style")).unwrap();
    fs::write(dir.path().join("app/server.js"), "").unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let handle = spawn_watchers(
        dir.path(),
        vec![
            binding("styles", "app/style/**/*.less"),
            binding("server", "app/server.js"),
        ],
        Duration::from_millis(50),
        tx,
    );
    assert_eq!(handle.active(), 2);

    fs::write(dir.path().join("app/server.js"), "listen()").unwrap();
    assert_eq!(next_trigger(&mut rx).await.as_deref(), Some("server"));
    assert!(timeout(Duration::from_millis(300), rx.recv()).await.is_err());
}
