// src/exec/command.rs

//! Compile tasks backed by an external compiler command.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::model::CompileTaskConfig;
use crate::exec::diagnostic::Diagnostic;
use crate::graph::task::{RunFuture, TaskRunner};
use crate::types::TaskName;

const STAGING_PREFIX: &str = ".devloop-staging-";

/// Runs a shell command line that compiles `entry` into `output`.
///
/// The compiler writes into a private staging directory inside the build
/// directory. Produced files are moved into place only when the command
/// succeeds, so a failed compile leaves the previous output untouched.
#[derive(Debug, Clone)]
pub struct CommandTask {
    name: TaskName,
    root: PathBuf,
    build_dir: PathBuf,
    cmd: String,
    entry: String,
    output: String,
}

impl CommandTask {
    /// `root` is the project root the command runs in; `build_dir` is where
    /// `output` (relative) ends up.
    pub fn new(
        name: impl Into<TaskName>,
        root: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        cfg: &CompileTaskConfig,
    ) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            build_dir: build_dir.into(),
            cmd: cfg.cmd.clone(),
            entry: cfg.entry.clone(),
            output: cfg.output.clone(),
        }
    }

    /// Final location of the compiled artifact.
    pub fn output_path(&self) -> PathBuf {
        self.build_dir.join(&self.output)
    }

    /// Substitute `{entry}`, `{output}` and `{out_dir}` in the command line.
    pub fn render(&self, output: &Path) -> String {
        let out_dir = output.parent().unwrap_or(output);
        self.cmd
            .replace("{entry}", &self.entry)
            .replace("{output}", &output.to_string_lossy())
            .replace("{out_dir}", &out_dir.to_string_lossy())
    }

    async fn compile(&self) -> std::result::Result<Vec<PathBuf>, Diagnostic> {
        tokio::fs::create_dir_all(&self.build_dir)
            .await
            .map_err(|e| {
                Diagnostic::new(format!(
                    "creating build directory {:?}: {e}",
                    self.build_dir
                ))
            })?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.build_dir)
            .map_err(|e| Diagnostic::new(format!("creating staging directory: {e}")))?;

        let staged_output = staging.path().join(&self.output);
        if let Some(parent) = staged_output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Diagnostic::new(format!("creating {:?}: {e}", parent)))?;
        }

        let command_line = self.render(&staged_output);
        info!(task = %self.name, cmd = %command_line, "running compiler");

        let output = shell(&command_line)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Diagnostic::new(format!("failed to spawn `{command_line}`: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines() {
            debug!(task = %self.name, "stdout: {}", line);
        }
        for line in stderr.lines() {
            debug!(task = %self.name, "stderr: {}", line);
        }

        if !output.status.success() {
            let combined = if stderr.trim().is_empty() {
                stdout.into_owned()
            } else if stdout.trim().is_empty() {
                stderr.into_owned()
            } else {
                format!("{stderr}\n{stdout}")
            };
            return Err(Diagnostic::from_compiler_output(
                &combined,
                output.status.code(),
            ));
        }

        if !staged_output.is_file() {
            return Err(Diagnostic::new(format!(
                "compiler exited successfully but did not write {}",
                self.output
            )));
        }

        let staging_root = staging.path().to_path_buf();
        let build_dir = self.build_dir.clone();
        let promoted = tokio::task::spawn_blocking(move || promote(&staging_root, &build_dir))
            .await
            .map_err(|e| Diagnostic::new(format!("promoting outputs: {e}")))?
            .map_err(|e| Diagnostic::new(format!("promoting outputs: {e:#}")))?;

        Ok(promoted)
    }
}

impl TaskRunner for CommandTask {
    fn run(&self) -> RunFuture<'_> {
        Box::pin(self.compile())
    }
}

/// Build a shell command appropriate for the platform.
pub(crate) fn shell(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_line);
        c
    }
}

/// Move every file under `staging` to the same relative path under `dest`.
///
/// Every target is prepared and checked before the first rename, so a
/// conflict (a directory where a file should go, an uncreatable parent)
/// leaves `dest` untouched. The renames themselves stay on one filesystem,
/// since the staging directory lives inside `dest`.
fn promote(staging: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut moves = Vec::new();
    let mut stack = vec![staging.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).with_context(|| format!("reading {:?}", dir))? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let rel = path
                .strip_prefix(staging)
                .with_context(|| format!("{:?} is outside the staging directory", path))?;
            let target = dest.join(rel);
            if target.is_dir() {
                bail!("{:?} is a directory; refusing to replace it with a file", target);
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {:?}", parent))?;
            }
            moves.push((path, target));
        }
    }

    let mut promoted = Vec::with_capacity(moves.len());
    for (from, to) in moves {
        std::fs::rename(&from, &to).with_context(|| format!("moving {:?} to {:?}", from, to))?;
        promoted.push(to);
    }

    promoted.sort();
    Ok(promoted)
}
