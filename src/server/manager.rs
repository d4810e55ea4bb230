// src/server/manager.rs

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};

use regex::Regex;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::config::model::ServerConfig;
use crate::errors::{DevloopError, Result, ServerStartError, ServerStopTimeout};
use crate::exec::Diagnostic;
use crate::graph::task::{RunFuture, TaskRunner};
use crate::server::process::{
    ensure_port_free, forward_output, send_terminate, wait_port_accepting, wait_port_released,
    wait_ready_signal,
};
use crate::server::{ServerState, ServerStatus};

#[derive(Debug, Clone, Copy)]
struct Status {
    state: ServerState,
    pid: Option<u32>,
}

/// Owns the dev server child process.
///
/// Every lifecycle operation holds one async lock for its whole duration,
/// so a `restart()` is a single stop-then-start sequence and concurrent
/// callers queue behind it. There is never more than one child.
#[derive(Debug)]
pub struct ServerProcessManager {
    config: ServerConfig,
    root: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    ready: Option<Regex>,
    lifecycle: Mutex<Option<Child>>,
    status: StdMutex<Status>,
}

impl ServerProcessManager {
    /// `entry` replaces `{entry}` in the configured arguments; `env` is added
    /// to the child's environment next to `PORT`.
    pub fn new(
        config: ServerConfig,
        root: impl Into<PathBuf>,
        entry: &str,
        env: Vec<(String, String)>,
    ) -> Result<Self> {
        let ready = config
            .ready_on_stdout
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| DevloopError::ConfigError(format!("[server].ready_on_stdout: {e}")))?;

        let port = config.port.to_string();
        let args = config
            .args
            .iter()
            .map(|a| a.replace("{entry}", entry).replace("{port}", &port))
            .collect();

        Ok(Self {
            config,
            root: root.into(),
            args,
            env,
            ready,
            lifecycle: Mutex::new(None),
            status: StdMutex::new(Status {
                state: ServerState::Stopped,
                pid: None,
            }),
        })
    }

    pub fn state(&self) -> ServerState {
        self.status
            .lock()
            .map(|s| s.state)
            .unwrap_or(ServerState::Stopped)
    }

    /// OS pid of the live child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.status.lock().ok().and_then(|s| s.pid)
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    fn set_status(&self, state: ServerState, pid: Option<u32>) {
        if let Ok(mut s) = self.status.lock() {
            s.state = state;
            s.pid = pid;
        }
    }

    fn set_state(&self, state: ServerState) {
        if let Ok(mut s) = self.status.lock() {
            s.state = state;
        }
    }

    /// Launch the server and wait until it is ready.
    ///
    /// Readiness is the configured stdout pattern or, without one, the port
    /// accepting connections. If neither happens within the start timeout
    /// the server is treated as ready and a warning is logged.
    pub async fn start(&self) -> std::result::Result<(), ServerStartError> {
        let mut slot = self.lifecycle.lock().await;
        self.start_locked(&mut slot, false).await
    }

    /// Terminate the server and wait until the process is gone and the port
    /// is free. Returns the timeout error if termination had to be forced.
    pub async fn stop(&self) -> Option<ServerStopTimeout> {
        let mut slot = self.lifecycle.lock().await;
        self.stop_locked(&mut slot, false).await
    }

    /// `stop()` then `start()`, atomically with respect to other callers.
    pub async fn restart(&self) -> std::result::Result<(), ServerStartError> {
        let mut slot = self.lifecycle.lock().await;
        self.set_state(ServerState::Restarting);
        info!(port = self.config.port, "restarting dev server");
        self.stop_locked(&mut slot, true).await;
        self.start_locked(&mut slot, true).await
    }

    async fn start_locked(
        &self,
        slot: &mut Option<Child>,
        restarting: bool,
    ) -> std::result::Result<(), ServerStartError> {
        if let Some(child) = slot.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                debug!(pid = ?child.id(), "dev server already running");
                self.set_state(ServerState::Running);
                return Ok(());
            }
            *slot = None;
        }

        if !restarting {
            self.set_status(ServerState::Starting, None);
        }
        let port = self.config.port;

        if let Err(source) = ensure_port_free(&self.config.host, port).await {
            self.set_status(ServerState::Stopped, None);
            let err = ServerStartError::PortUnavailable { port, source };
            warn!(port, error = %err, "dev server not started");
            return Err(err);
        }

        let mut child = Command::new(&self.config.cmd)
            .args(&self.args)
            .current_dir(&self.root)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env("PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                self.set_status(ServerState::Stopped, None);
                ServerStartError::Spawn { source }
            })?;

        let pid = child.id();
        self.set_status(ServerState::Starting, pid);
        info!(pid = ?pid, port, cmd = %self.config.cmd, "dev server spawned");

        let (ready_tx, ready_rx) = oneshot::channel();
        let ready_tx = self.ready.as_ref().map(|_| ready_tx);
        if let Some(stdout) = child.stdout.take() {
            forward_output(stdout, "stdout", self.ready.clone(), ready_tx);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(stderr, "stderr", None, None);
        }

        let host = self.config.host.clone();
        let use_signal = self.ready.is_some();
        let ready = async move {
            if use_signal {
                wait_ready_signal(ready_rx).await;
            } else {
                wait_port_accepting(&host, port).await;
            }
        };

        tokio::select! {
            status = child.wait() => {
                self.set_status(ServerState::Stopped, None);
                let code = status.ok().and_then(|s| s.code());
                let err = ServerStartError::ExitedImmediately { code };
                warn!(port, error = %err, "dev server not started");
                return Err(err);
            }
            _ = ready => {
                info!(pid = ?pid, port, "dev server ready");
            }
            _ = tokio::time::sleep(self.config.start_timeout) => {
                warn!(
                    pid = ?pid,
                    port,
                    timeout = ?self.config.start_timeout,
                    "dev server did not report readiness in time; assuming it is up"
                );
            }
        }

        *slot = Some(child);
        self.set_status(ServerState::Running, pid);
        Ok(())
    }

    async fn stop_locked(
        &self,
        slot: &mut Option<Child>,
        restarting: bool,
    ) -> Option<ServerStopTimeout> {
        let Some(mut child) = slot.take() else {
            if !restarting {
                self.set_status(ServerState::Stopped, None);
            }
            return None;
        };

        if !restarting {
            self.set_state(ServerState::Stopping);
        }

        let pid = child.id();
        let mut forced = None;

        if let Ok(Some(status)) = child.try_wait() {
            debug!(pid = ?pid, ?status, "dev server had already exited");
        } else {
            if let Some(pid) = pid {
                if let Err(err) = send_terminate(pid).await {
                    warn!(pid, error = %err, "failed to request dev server shutdown");
                }
            }

            let timeout = self.config.stop_timeout;
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(status) => debug!(pid = ?pid, ?status, "dev server exited"),
                Err(_) => {
                    let err = ServerStopTimeout { timeout };
                    warn!(pid = ?pid, error = %err, "killing dev server");
                    if let Err(kill_err) = child.kill().await {
                        warn!(pid = ?pid, error = %kill_err, "failed to kill dev server");
                    }
                    forced = Some(err);
                }
            }
        }

        if !wait_port_released(&self.config.host, self.config.port, self.config.stop_timeout).await
        {
            warn!(port = self.config.port, "port still busy after dev server exit");
        }

        if restarting {
            self.set_status(ServerState::Restarting, None);
        } else {
            self.set_status(ServerState::Stopped, None);
        }
        info!(pid = ?pid, "dev server stopped");
        forced
    }
}

impl ServerProcessManager {
    /// If the child has exited on its own, drop it and go to `Stopped`.
    ///
    /// Skipped while a lifecycle operation holds the lock; that operation
    /// sets the state itself.
    fn reap_exited(&self) {
        let Ok(mut slot) = self.lifecycle.try_lock() else {
            return;
        };
        let exited = match slot.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => {
                warn!(pid = ?self.pid(), %status, "dev server exited unexpectedly");
                true
            }
            Some(Ok(None)) => false,
            Some(Err(err)) => {
                warn!(error = %err, "could not query dev server status");
                false
            }
            None => true,
        };
        if exited {
            *slot = None;
            self.set_status(ServerState::Stopped, None);
        }
    }
}

impl ServerStatus for ServerProcessManager {
    fn is_running(&self) -> bool {
        if self.state() != ServerState::Running {
            return false;
        }
        self.reap_exited();
        self.state() == ServerState::Running
    }
}

/// The server restart, as a schedulable task. Bursts of entry-file changes
/// coalesce like any other build.
#[derive(Debug, Clone)]
pub struct ServerRestartTask {
    manager: Arc<ServerProcessManager>,
}

impl ServerRestartTask {
    pub fn new(manager: Arc<ServerProcessManager>) -> Self {
        Self { manager }
    }
}

impl TaskRunner for ServerRestartTask {
    fn run(&self) -> RunFuture<'_> {
        Box::pin(async move {
            self.manager
                .restart()
                .await
                .map(|()| Vec::new())
                .map_err(|e| Diagnostic::new(e.to_string()))
        })
    }
}
