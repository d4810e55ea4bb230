// src/exec/mod.rs

//! Build execution layer.
//!
//! - [`executor`] runs one task and turns its result into a `BuildRun`.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`, which tests can replace with a fake.
//! - [`command`] implements compile tasks that shell out to a compiler.
//! - [`copy_assets`] implements the incremental static asset copy.
//! - [`diagnostic`] is the structured failure value of a run.

pub mod backend;
pub mod command;
pub mod copy_assets;
pub mod diagnostic;
pub mod executor;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use command::CommandTask;
pub use copy_assets::CopyAssetsTask;
pub use diagnostic::{Diagnostic, SourceLocation};
pub use executor::execute;
