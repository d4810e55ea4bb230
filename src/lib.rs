// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod entry;
pub mod errors;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod reload;
pub mod server;
pub mod types;
pub mod watch;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_or_default, ConfigFile};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, SchedulerHandle};
use crate::entry::{execute_plan, ActionFuture, EntryContext, EntryGraph, Plan};
use crate::errors::DevloopError;
use crate::exec::RealExecutorBackend;
use crate::graph::standard::{asset_patterns, standard_graph};
use crate::graph::{BuildRun, Scheduler, WatchBinding};
use crate::reload::{spawn_reload_server, Notifier, ReloadChannel};
use crate::server::{ServerProcessManager, ServerStatus};
use crate::types::BindingName;
use crate::watch::{watch_binding, WatcherHandle};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the entry plan
/// - scheduler / runtime / executor
/// - dev server and live-reload endpoint
/// - per-binding file watchers
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let (config_path, explicit) = match &args.config {
        Some(path) => (PathBuf::from(path), true),
        None => (default_config_path(), false),
    };
    let cfg = load_or_default(&config_path, explicit)?;
    let root = project_root(&config_path)?;

    let entries = EntryGraph::standard()?;
    let plan = entries.plan(&args.entry)?;

    if args.dry_run {
        print_dry_run(&cfg, &root, &plan);
        return Ok(());
    }

    let mut server_env = Vec::new();
    if cfg.livereload.enabled {
        server_env.push((
            "LIVERELOAD_PORT".to_string(),
            cfg.livereload.port.to_string(),
        ));
    }
    let server = Arc::new(ServerProcessManager::new(
        cfg.server.clone(),
        &root,
        &cfg.paths.server_entry_path(),
        server_env,
    )?);

    let channel = Arc::new(ReloadChannel::new());
    let _reload_endpoint = if cfg.livereload.enabled && plan.is_long_running() {
        match spawn_reload_server(&cfg.livereload.host, cfg.livereload.port, channel.clone())
            .await
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "live reload disabled");
                None
            }
        }
    } else {
        None
    };

    let notifier = Notifier::new(channel, server.clone());
    let graph = standard_graph(&cfg, &root, server.clone())?;
    let bindings: BTreeMap<BindingName, WatchBinding> = graph
        .bindings()
        .map(|b| (b.name.clone(), b.clone()))
        .collect();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(rt_tx.clone());
    let core = CoreRuntime::new(Scheduler::new(graph));
    let runtime = Runtime::new(core, rt_rx, executor, notifier);
    let runtime_task = tokio::spawn(runtime.run());
    let handle = SchedulerHandle::new(rt_tx);

    let ctx = Arc::new(LiveContext {
        handle: handle.clone(),
        server: server.clone(),
        root: root.clone(),
        debounce: cfg.debounce,
        bindings,
        watchers: Mutex::new(Vec::new()),
    });

    let outcome = execute_plan(&plan, ctx.clone()).await;
    info!(
        entry = %args.entry,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        watching = ?outcome.watching,
        "entry point finished"
    );

    let stay = !outcome.watching.is_empty() || server.is_running();
    if stay {
        info!("watching for changes; press Ctrl-C to stop");
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
        }
        info!("shutting down");
    }

    ctx.stop_watching();
    if let Err(err) = handle.shutdown().await {
        debug!(error = %err, "runtime already stopped");
    }
    match runtime_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "runtime stopped with an error"),
        Err(err) => warn!(error = %err, "runtime task failed"),
    }
    if let Some(timeout) = server.stop().await {
        warn!(error = %timeout, "dev server had to be killed");
    }

    if !stay && outcome.failed > 0 {
        return Err(DevloopError::BuildsFailed(outcome.failed).into());
    }
    Ok(())
}

/// The live side of an entry plan.
struct LiveContext {
    handle: SchedulerHandle,
    server: Arc<ServerProcessManager>,
    root: PathBuf,
    debounce: Duration,
    bindings: BTreeMap<BindingName, WatchBinding>,
    watchers: Mutex<Vec<WatcherHandle>>,
}

impl LiveContext {
    fn stop_watching(&self) {
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.clear();
        }
    }
}

impl EntryContext for LiveContext {
    fn run_task(&self, task: &str) -> ActionFuture<'_, errors::Result<BuildRun>> {
        let task = task.to_string();
        Box::pin(async move { self.handle.run_now(&task).await })
    }

    fn watch(&self, binding: &str) -> errors::Result<()> {
        let binding = self.bindings.get(binding).cloned().ok_or_else(|| {
            DevloopError::ConfigError(format!("no watch binding named '{binding}'"))
        })?;
        let watcher = watch_binding(&self.root, binding, self.debounce, self.handle.sender())?;
        self.watchers
            .lock()
            .map_err(|_| DevloopError::Other(anyhow::anyhow!("watcher list poisoned")))?
            .push(watcher);
        Ok(())
    }

    fn start_server(&self) -> ActionFuture<'_, errors::Result<()>> {
        Box::pin(async move { self.server.start().await.map_err(DevloopError::from) })
    }
}

/// The directory holding the config file, or the working directory when
/// the config path has no parent component.
fn project_root(config_path: &Path) -> Result<PathBuf> {
    let dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    Ok(dir.canonicalize().unwrap_or(dir))
}

/// Print the resolved configuration and the entry plan.
fn print_dry_run(cfg: &ConfigFile, root: &Path, plan: &Plan) {
    println!("devloop dry-run");
    println!("  root = {}", root.display());
    println!("  build = {}", cfg.paths.build);
    println!("  debounce = {:?}", cfg.debounce);
    println!();

    println!("tasks:");
    for (name, task) in [
        ("templates", &cfg.templates),
        ("scripts", &cfg.scripts),
        ("styles", &cfg.styles),
    ] {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        println!("      entry: {}", task.entry);
        println!("      output: {}", task.output);
        println!("      watch: {:?}", task.watch);
        if !task.exclude.is_empty() {
            println!("      exclude: {:?}", task.exclude);
        }
    }
    let (include, exclude) = asset_patterns(cfg);
    println!("  - assets");
    println!("      watch: {:?}", include);
    println!("      exclude: {:?}", exclude);
    println!("  - server");
    println!("      cmd: {} {:?}", cfg.server.cmd, cfg.server.args);
    println!("      watch: [{:?}]", cfg.paths.server_entry_path());
    println!("      port: {}", cfg.server.port);
    if cfg.livereload.enabled {
        println!(
            "  livereload: {}:{}",
            cfg.livereload.host, cfg.livereload.port
        );
    }
    println!();

    println!("plan:");
    for (depth, level) in plan.levels.iter().enumerate() {
        let names: Vec<&str> = level.iter().map(|e| e.name.as_str()).collect();
        println!("  {depth}: {}", names.join(", "));
    }

    debug!("dry-run complete (no execution)");
}
