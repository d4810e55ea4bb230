// src/exec/copy_assets.rs

//! Incremental copy of static assets from the app root into the build root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::exec::diagnostic::{Diagnostic, SourceLocation};
use crate::graph::task::{RunFuture, TaskRunner};
use crate::watch::hash::compute_file_hash;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::PathMatcher;

/// Copies every file under the app root that passes the include/exclude
/// patterns to the same relative path under the build root.
///
/// Files whose content hash equals the destination's current content are
/// left alone; the destination is re-read on every run, so edits made to
/// the build tree by anything else are overwritten. Excluded directories
/// are not descended into.
#[derive(Debug, Clone)]
pub struct CopyAssetsTask {
    root: PathBuf,
    app_dir: PathBuf,
    build_dir: PathBuf,
    matcher: PathMatcher,
}

impl CopyAssetsTask {
    /// Patterns are relative to `root`, like every other task's.
    pub fn new(
        root: impl Into<PathBuf>,
        app_dir: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        include: &[String],
        exclude: &[String],
    ) -> std::result::Result<Self, globset::Error> {
        Ok(Self {
            root: root.into(),
            app_dir: app_dir.into(),
            build_dir: build_dir.into(),
            matcher: PathMatcher::new(include, exclude)?,
        })
    }

    async fn copy(&self) -> std::result::Result<Vec<PathBuf>, Diagnostic> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.copy_tree())
            .await
            .map_err(|e| Diagnostic::new(format!("asset copy was aborted: {e}")))?
    }

    fn copy_tree(&self) -> std::result::Result<Vec<PathBuf>, Diagnostic> {
        let mut written = Vec::new();
        let mut stack = vec![self.app_dir.clone()];

        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir)
                .map_err(|e| Diagnostic::new(format!("reading {:?}: {e}", dir)))?;

            for entry in entries {
                let path = entry
                    .map_err(|e| Diagnostic::new(format!("reading {:?}: {e}", dir)))?
                    .path();
                let Some(rel) = relative_str(&self.root, &path) else {
                    continue;
                };

                if path.is_dir() {
                    if self.matcher.is_excluded(&rel) {
                        trace!(dir = %rel, "skipping excluded directory");
                    } else {
                        stack.push(path);
                    }
                    continue;
                }

                if !self.matcher.matches(&rel) {
                    continue;
                }

                if self.copy_one(&path).map_err(|e| located(&rel, e))? {
                    written.push(self.destination(&path).map_err(|e| located(&rel, e))?);
                }
            }
        }

        written.sort();
        debug!(written = written.len(), "asset copy finished");
        Ok(written)
    }

    fn destination(&self, src: &Path) -> Result<PathBuf> {
        let rel = src
            .strip_prefix(&self.app_dir)
            .map_err(|_| anyhow!("{:?} is outside the app root", src))?;
        Ok(self.build_dir.join(rel))
    }

    /// Returns `true` if the destination was (re)written.
    fn copy_one(&self, src: &Path) -> Result<bool> {
        let dest = self.destination(src)?;
        let src_hash = compute_file_hash(src)?;

        if dest.is_file() && compute_file_hash(&dest)? == src_hash {
            return Ok(false);
        }

        let parent = dest
            .parent()
            .ok_or_else(|| anyhow!("{:?} has no parent directory", dest))?;
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;

        let mut tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temporary file in {:?}", parent))?;
        let mut input = fs::File::open(src).with_context(|| format!("opening {:?}", src))?;
        io::copy(&mut input, tmp.as_file_mut()).with_context(|| format!("copying {:?}", src))?;
        tmp.persist(&dest)
            .map_err(|e| anyhow!("writing {:?}: {}", dest, e.error))?;

        trace!(dest = ?dest, "asset written");
        Ok(true)
    }
}

fn located(rel: &str, err: anyhow::Error) -> Diagnostic {
    Diagnostic {
        message: format!("{err:#}"),
        location: Some(SourceLocation {
            file: rel.to_string(),
            line: None,
            column: None,
        }),
    }
}

impl TaskRunner for CopyAssetsTask {
    fn run(&self) -> RunFuture<'_> {
        Box::pin(self.copy())
    }
}
