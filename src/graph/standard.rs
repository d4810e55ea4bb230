// src/graph/standard.rs

//! The task graph of a web project: templates, scripts, styles, static
//! assets and the dev server entry.

use std::path::Path;
use std::sync::Arc;

use crate::config::model::{join, CompileTaskConfig, ConfigFile};
use crate::errors::{DevloopError, Result};
use crate::exec::{CommandTask, CopyAssetsTask};
use crate::graph::graph::{TaskGraph, WatchBinding};
use crate::graph::task::{Task, TaskRunner};
use crate::server::{ServerProcessManager, ServerRestartTask};

pub const TEMPLATES: &str = "templates";
pub const SCRIPTS: &str = "scripts";
pub const STYLES: &str = "styles";
pub const ASSETS: &str = "assets";
pub const SERVER: &str = "server";

/// Names of all standard tasks, in a stable order.
pub const ALL_TASKS: [&str; 5] = [TEMPLATES, SCRIPTS, STYLES, ASSETS, SERVER];

/// Include and exclude patterns of the asset copy.
///
/// Everything under the app root, minus the template and stylesheet source
/// trees. Those two exclusions are always present; configured excludes are
/// appended after them.
pub fn asset_patterns(cfg: &ConfigFile) -> (Vec<String>, Vec<String>) {
    let include = vec![join(&cfg.paths.app, "**")];

    let template_dir = cfg.paths.template_dir();
    let style_dir = cfg.paths.style_dir();
    let mut exclude = vec![
        template_dir.clone(),
        join(&template_dir, "**"),
        style_dir.clone(),
        join(&style_dir, "**"),
    ];
    exclude.extend(cfg.asset_exclude.iter().cloned());

    (include, exclude)
}

fn compile_task(
    name: &str,
    build_dir: &Path,
    cfg: &CompileTaskConfig,
    runner: Arc<dyn TaskRunner>,
) -> Task {
    let output = build_dir.join(&cfg.output);
    Task {
        name: name.to_string(),
        include: cfg.watch.clone(),
        exclude: cfg.exclude.clone(),
        output_root: output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| build_dir.to_path_buf()),
        browser_visible: true,
        runner,
    }
}

/// Build the standard graph, asking `runner_for` for each task's run
/// operation. Every task gets a binding of the same name and patterns.
pub fn standard_graph_with<F>(cfg: &ConfigFile, build_dir: &Path, mut runner_for: F) -> Result<TaskGraph>
where
    F: FnMut(&str) -> Result<Arc<dyn TaskRunner>>,
{
    let (asset_include, asset_exclude) = asset_patterns(cfg);

    let tasks = vec![
        compile_task(TEMPLATES, build_dir, &cfg.templates, runner_for(TEMPLATES)?),
        compile_task(SCRIPTS, build_dir, &cfg.scripts, runner_for(SCRIPTS)?),
        compile_task(STYLES, build_dir, &cfg.styles, runner_for(STYLES)?),
        Task {
            name: ASSETS.to_string(),
            include: asset_include,
            exclude: asset_exclude,
            output_root: build_dir.to_path_buf(),
            browser_visible: false,
            runner: runner_for(ASSETS)?,
        },
        Task {
            name: SERVER.to_string(),
            include: vec![cfg.paths.server_entry_path()],
            exclude: Vec::new(),
            output_root: build_dir.to_path_buf(),
            browser_visible: false,
            runner: runner_for(SERVER)?,
        },
    ];

    let mut graph = TaskGraph::new();
    for task in tasks {
        let binding = WatchBinding::for_task(&task);
        graph.add_task(task)?;
        graph.bind(binding)?;
    }
    Ok(graph)
}

/// Build the standard graph with the real compilers, asset copier and
/// server restart. `root` must be absolute.
pub fn standard_graph(
    cfg: &ConfigFile,
    root: &Path,
    server: Arc<ServerProcessManager>,
) -> Result<TaskGraph> {
    let build_dir = root.join(&cfg.paths.build);
    let app_dir = root.join(&cfg.paths.app);

    standard_graph_with(cfg, &build_dir, |name| {
        let runner: Arc<dyn TaskRunner> = match name {
            TEMPLATES => Arc::new(CommandTask::new(name, root, &build_dir, &cfg.templates)),
            SCRIPTS => Arc::new(CommandTask::new(name, root, &build_dir, &cfg.scripts)),
            STYLES => Arc::new(CommandTask::new(name, root, &build_dir, &cfg.styles)),
            ASSETS => {
                let (include, exclude) = asset_patterns(cfg);
                Arc::new(
                    CopyAssetsTask::new(root, &app_dir, &build_dir, &include, &exclude)
                        .map_err(|e| DevloopError::ConfigError(format!("asset patterns: {e}")))?,
                )
            }
            SERVER => Arc::new(ServerRestartTask::new(server.clone())),
            other => return Err(DevloopError::TaskNotFound(other.to_string())),
        };
        Ok(runner)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;
    use crate::graph::task::RunFuture;

    struct Noop;

    impl TaskRunner for Noop {
        fn run(&self) -> RunFuture<'_> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn cfg() -> ConfigFile {
        ConfigFile::try_from(RawConfigFile::default()).unwrap()
    }

    #[test]
    fn asset_exclusions_cannot_be_dropped_by_config() {
        let mut cfg = cfg();
        cfg.asset_exclude = vec!["app/**/*.md".to_string()];
        let (include, exclude) = asset_patterns(&cfg);
        assert_eq!(include, vec!["app/**".to_string()]);
        assert_eq!(
            exclude,
            vec![
                "app/elm".to_string(),
                "app/elm/**".to_string(),
                "app/style".to_string(),
                "app/style/**".to_string(),
                "app/**/*.md".to_string(),
            ]
        );
    }

    #[test]
    fn every_task_has_a_matching_binding() {
        let graph = standard_graph_with(&cfg(), Path::new("/p/build"), |_| {
            Ok(Arc::new(Noop) as Arc<dyn TaskRunner>)
        })
        .unwrap();

        for name in ALL_TASKS {
            let binding = graph.binding(name).expect("binding");
            assert_eq!(binding.tasks, vec![name.to_string()]);
        }
        assert_eq!(graph.binding(SERVER).unwrap().patterns, vec!["app/server.js".to_string()]);
        assert!(graph.task(STYLES).unwrap().browser_visible);
        assert!(!graph.task(ASSETS).unwrap().browser_visible);
        assert_eq!(
            graph.task(STYLES).unwrap().output_root,
            Path::new("/p/build/css")
        );
    }
}
