// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::engine::RuntimeEvent;
use crate::errors::WatchError;
use crate::graph::WatchBinding;
use crate::watch::debounce::coalesce;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::{watch_roots, PathMatcher};

/// Keeps the per-binding OS watchers alive. Dropping it stops watching.
pub struct WatcherHandle {
    watchers: Vec<RecommendedWatcher>,
}

impl WatcherHandle {
    /// Number of bindings that are actually being watched.
    pub fn active(&self) -> usize {
        self.watchers.len()
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("active", &self.watchers.len())
            .finish()
    }
}

/// Start one independent watcher per binding.
///
/// A binding whose watch cannot be established is reported once and left
/// inactive; the other bindings are unaffected.
pub fn spawn_watchers(
    root: impl Into<PathBuf>,
    bindings: Vec<WatchBinding>,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> WatcherHandle {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    let mut watchers = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let name = binding.name.clone();
        match spawn_binding_watcher(&root, binding, debounce, runtime_tx.clone()) {
            Ok(w) => watchers.push(w),
            Err(err) => {
                error!(binding = %name, error = %err, "watch disabled for binding");
            }
        }
    }

    WatcherHandle { watchers }
}

/// Start the watcher for a single binding, reporting failure to the caller.
pub fn watch_binding(
    root: impl Into<PathBuf>,
    binding: WatchBinding,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle, WatchError> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);
    let watcher = spawn_binding_watcher(&root, binding, debounce, runtime_tx)?;
    Ok(WatcherHandle {
        watchers: vec![watcher],
    })
}

fn spawn_binding_watcher(
    root: &Path,
    binding: WatchBinding,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<RecommendedWatcher, WatchError> {
    let matcher =
        PathMatcher::new(&binding.patterns, &binding.exclude).map_err(|source| {
            WatchError::Pattern {
                binding: binding.name.clone(),
                source,
            }
        })?;

    let (signal_tx, signal_rx) = mpsc::unbounded_channel::<()>();

    let mut watcher = {
        let event_root = root.to_path_buf();
        let name = binding.name.clone();
        RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_relevant(&event_root, &matcher, &event) {
                        trace!(binding = %name, ?event, "relevant change");
                        let _ = signal_tx.send(());
                    }
                }
                Err(err) => {
                    warn!(binding = %name, error = %err, "file watch error");
                }
            },
            Config::default(),
        )
        .map_err(|source| WatchError::Establish {
            binding: binding.name.clone(),
            path: root.to_path_buf(),
            source,
        })?
    };

    for (dir, mode) in watch_roots(root, &binding.patterns) {
        watcher
            .watch(&dir, mode)
            .map_err(|source| WatchError::Establish {
                binding: binding.name.clone(),
                path: dir.clone(),
                source,
            })?;
        debug!(binding = %binding.name, dir = ?dir, ?mode, "watching directory");
    }

    info!(binding = %binding.name, patterns = ?binding.patterns, "watch established");

    tokio::spawn(coalesce(binding.name, signal_rx, debounce, runtime_tx));

    Ok(watcher)
}

/// Whether a raw notify event concerns a path the binding cares about.
fn is_relevant(root: &Path, matcher: &PathMatcher, event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|path| {
        relative_str(root, path)
            .map(|rel| matcher.matches(&rel))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn matcher() -> PathMatcher {
        PathMatcher::new(&["app/style/**/*.less".to_string()], &[]).unwrap()
    }

    #[test]
    fn access_events_are_ignored() {
        let root = Path::new("/p");
        let ev = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(root.join("app/style/app.less"));
        assert!(!is_relevant(root, &matcher(), &ev));
    }

    #[test]
    fn modify_of_matching_path_is_relevant() {
        let root = Path::new("/p");
        let ev = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(root.join("app/style/app.less"));
        assert!(is_relevant(root, &matcher(), &ev));
    }

    #[test]
    fn create_of_other_path_is_not_relevant() {
        let root = Path::new("/p");
        let ev = Event::new(EventKind::Create(CreateKind::File))
            .add_path(root.join("app/js/app.ts"));
        assert!(!is_relevant(root, &matcher(), &ev));
    }
}
