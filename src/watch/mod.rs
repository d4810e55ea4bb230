// src/watch/mod.rs

//! File watching and change coalescing.
//!
//! This module is responsible for:
//! - Compiling `watch` / `exclude` glob patterns per binding.
//! - Deriving which directories to hand to the OS watcher (`notify`).
//! - Collapsing bursts of filesystem events into one trigger per binding.
//! - Content hashing, used by the asset copier to skip unchanged files.
//!
//! It does **not** know about tasks or scheduling; it only turns filesystem
//! changes into binding-level triggers.

pub mod debounce;
pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::coalesce;
pub use hash::compute_file_hash;
pub use patterns::{watch_roots, PathMatcher};
pub use watcher::{spawn_watchers, watch_binding, WatcherHandle};
