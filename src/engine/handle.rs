// src/engine/handle.rs

use tokio::sync::{mpsc, oneshot};

use crate::engine::RuntimeEvent;
use crate::errors::{DevloopError, Result};
use crate::graph::BuildRun;

/// Cloneable handle for talking to a running engine.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<RuntimeEvent>,
}

impl SchedulerHandle {
    pub fn new(tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { tx }
    }

    /// Run `task` unconditionally and wait for the resulting build.
    ///
    /// If the task is already running, this resolves with the follow-up
    /// run, which always starts after the request.
    pub async fn run_now(&self, task: &str) -> Result<BuildRun> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeEvent::RunNow {
            task: task.to_string(),
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| {
            DevloopError::Other(anyhow::anyhow!(
                "runtime stopped before '{task}' finished"
            ))
        })?
    }

    /// Act as if a watcher fired for `binding`.
    pub async fn trigger(&self, binding: &str) -> Result<()> {
        self.send(RuntimeEvent::BindingTriggered {
            binding: binding.to_string(),
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(RuntimeEvent::ShutdownRequested).await
    }

    /// The raw event sender, for watchers.
    pub fn sender(&self) -> mpsc::Sender<RuntimeEvent> {
        self.tx.clone()
    }

    async fn send(&self, event: RuntimeEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| DevloopError::Other(anyhow::anyhow!("runtime is not running")))
    }
}
