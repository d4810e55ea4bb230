#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use devloop::config::model::{RawCompileTask, RawConfigFile};
use devloop::config::ConfigFile;
use devloop::exec::Diagnostic;
use devloop::graph::{BuildOutcome, BuildRun, Task, TaskGraph, TaskRunner, WatchBinding};
use devloop::types::TriggerOrigin;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_app(mut self, app: &str) -> Self {
        self.config.paths.app = app.to_string();
        self
    }

    pub fn with_build(mut self, build: &str) -> Self {
        self.config.paths.build = build.to_string();
        self
    }

    pub fn with_debounce(mut self, debounce: &str) -> Self {
        self.config.watch.debounce = debounce.to_string();
        self
    }

    pub fn with_asset_exclude(mut self, pattern: &str) -> Self {
        self.config.assets.exclude.push(pattern.to_string());
        self
    }

    pub fn with_templates(mut self, task: RawCompileTask) -> Self {
        self.config.tasks.templates = task;
        self
    }

    pub fn with_scripts(mut self, task: RawCompileTask) -> Self {
        self.config.tasks.scripts = task;
        self
    }

    pub fn with_styles(mut self, task: RawCompileTask) -> Self {
        self.config.tasks.styles = task;
        self
    }

    pub fn with_server_cmd(mut self, cmd: &str, args: &[&str]) -> Self {
        self.config.server.cmd = cmd.to_string();
        self.config.server.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_server_host(mut self, host: &str) -> Self {
        self.config.server.host = host.to_string();
        self
    }

    pub fn with_server_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_ready_on_stdout(mut self, pattern: &str) -> Self {
        self.config.server.ready_on_stdout = pattern.to_string();
        self
    }

    pub fn with_server_timeouts(mut self, start: &str, stop: &str) -> Self {
        self.config.server.start_timeout = start.to_string();
        self.config.server.stop_timeout = stop.to_string();
        self
    }

    pub fn with_livereload_port(mut self, port: u16) -> Self {
        self.config.livereload.port = port;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RawCompileTask`.
pub struct CompileTaskBuilder {
    task: RawCompileTask,
}

impl CompileTaskBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: RawCompileTask {
                cmd: Some(cmd.to_string()),
                ..RawCompileTask::default()
            },
        }
    }

    pub fn entry(mut self, entry: &str) -> Self {
        self.task.entry = Some(entry.to_string());
        self
    }

    pub fn output(mut self, output: &str) -> Self {
        self.task.output = Some(output.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.task
            .watch
            .get_or_insert_with(Vec::new)
            .push(pattern.to_string());
        self
    }

    pub fn build(self) -> RawCompileTask {
        self.task
    }
}

/// Builder for a `TaskGraph` of hand-made tasks. Each task gets a binding of
/// the same name.
pub struct TaskGraphBuilder {
    graph: TaskGraph,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: TaskGraph::new(),
        }
    }

    pub fn task(
        mut self,
        name: &str,
        include: &[&str],
        browser_visible: bool,
        runner: Arc<dyn TaskRunner>,
    ) -> Self {
        let task = Task {
            name: name.to_string(),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            output_root: PathBuf::from("build"),
            browser_visible,
            runner,
        };
        let binding = WatchBinding::for_task(&task);
        self.graph.add_task(task).expect("duplicate task in builder");
        self.graph.bind(binding).expect("duplicate binding in builder");
        self
    }

    /// An extra binding that fans out to several tasks.
    pub fn binding(mut self, name: &str, patterns: &[&str], tasks: &[&str]) -> Self {
        self.graph
            .bind(WatchBinding {
                name: name.to_string(),
                patterns: patterns.iter().map(|s| s.to_string()).collect(),
                exclude: Vec::new(),
                tasks: tasks.iter().map(|s| s.to_string()).collect(),
            })
            .expect("invalid binding in builder");
        self
    }

    pub fn build(self) -> TaskGraph {
        self.graph
    }
}

impl Default for TaskGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A finished run record, for feeding the scheduler directly.
pub fn finished_run(task: &str, run_id: u64, success: bool) -> BuildRun {
    BuildRun {
        task: task.to_string(),
        run_id,
        origin: TriggerOrigin::Watch,
        started_at: SystemTime::now(),
        duration: Duration::ZERO,
        outcome: if success {
            BuildOutcome::Success {
                outputs: Vec::new(),
            }
        } else {
            BuildOutcome::Failure(Diagnostic::new("failed"))
        },
    }
}
