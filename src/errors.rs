// src/errors.rs

//! Crate-wide error types.
//!
//! Only configuration and wiring errors ever reach the binary boundary.
//! Everything that can go wrong while the orchestrator is running
//! ([`WatchError`], [`ServerStartError`], [`ServerStopTimeout`], compile
//! diagnostics) is local to one binding or task and gets logged instead.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::BindingName;

#[derive(Error, Debug)]
pub enum DevloopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown entry point: {0}")]
    UnknownEntry(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in entry graph: {0}")]
    EntryCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    ServerStart(#[from] ServerStartError),

    #[error("{0} build(s) failed")]
    BuildsFailed(usize),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The filesystem watch for one binding could not be established.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("invalid glob pattern for binding '{binding}': {source}")]
    Pattern {
        binding: BindingName,
        #[source]
        source: globset::Error,
    },

    #[error("failed to watch {path:?} for binding '{binding}': {source}")]
    Establish {
        binding: BindingName,
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// The dev server could not be brought up.
#[derive(Error, Debug)]
pub enum ServerStartError {
    #[error("port {port} is not available: {source}")]
    PortUnavailable {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn dev server: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    #[error("dev server exited during startup (exit code {code:?})")]
    ExitedImmediately { code: Option<i32> },
}

/// Graceful stop exceeded its bound and the process was killed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("dev server did not exit within {timeout:?}; forced termination")]
pub struct ServerStopTimeout {
    pub timeout: Duration,
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevloopError>;
