// src/config/validate.rs

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use globset::Glob;
use regex::Regex;

use crate::config::model::{
    join, CompileTaskConfig, ConfigFile, PathsSection, RawCompileTask, RawConfigFile,
    RawServerSection, ServerConfig,
};
use crate::errors::{DevloopError, Result};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DevloopError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_paths(&raw.paths)?;

        let debounce = duration_field("[watch].debounce", &raw.watch.debounce)?;

        let templates = resolve_compile_task(
            "templates",
            &raw.tasks.templates,
            CompileTaskConfig {
                cmd: "elm make {entry} --yes --output {output}".to_string(),
                entry: join(&raw.paths.template_dir(), "Main.elm"),
                output: "js/Main.js".to_string(),
                watch: vec![
                    join(&raw.paths.app, "**/*.elm"),
                    "elm-package.json".to_string(),
                ],
                exclude: Vec::new(),
            },
        )?;

        let scripts = resolve_compile_task(
            "scripts",
            &raw.tasks.scripts,
            CompileTaskConfig {
                cmd: "browserify {entry} --debug -p tsify \
                      -t [ babelify --presets es2015 --extensions .ts,.js ] -o {output}"
                    .to_string(),
                entry: join(&raw.paths.script_dir(), "app.ts"),
                output: "js/bundle.js".to_string(),
                watch: vec![
                    join(&raw.paths.script_dir(), "**/*.ts"),
                    join(&raw.paths.script_dir(), "**/*.js"),
                ],
                exclude: Vec::new(),
            },
        )?;

        let styles = resolve_compile_task(
            "styles",
            &raw.tasks.styles,
            CompileTaskConfig {
                cmd: "lessc --source-map {entry} {output}".to_string(),
                entry: join(&raw.paths.style_dir(), "app.less"),
                output: "css/bundle.css".to_string(),
                watch: vec![join(&raw.paths.style_dir(), "**/*.less")],
                exclude: Vec::new(),
            },
        )?;

        validate_globs("[assets].exclude", &raw.assets.exclude)?;

        let server = resolve_server(&raw.server)?;

        if raw.livereload.port == 0 {
            return Err(config_error("[livereload].port must be non-zero"));
        }
        if raw.livereload.enabled && raw.livereload.port == server.port {
            return Err(config_error(format!(
                "[livereload].port and [server].port must differ (both are {})",
                server.port
            )));
        }

        Ok(ConfigFile {
            paths: raw.paths,
            debounce,
            templates,
            scripts,
            styles,
            asset_exclude: raw.assets.exclude,
            server,
            livereload: raw.livereload,
        })
    }
}

fn config_error(msg: impl Into<String>) -> DevloopError {
    DevloopError::ConfigError(msg.into())
}

fn duration_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| config_error(format!("{field}: {e}")))
}

fn validate_globs(field: &str, patterns: &[String]) -> Result<()> {
    for pat in patterns {
        Glob::new(pat)
            .map_err(|e| config_error(format!("{field}: invalid glob pattern '{pat}': {e}")))?;
    }
    Ok(())
}

/// Lexically normalise a relative path: drop `.` components and resolve
/// `..` where possible.
fn normalize(path: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in Path::new(path).components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn validate_paths(paths: &PathsSection) -> Result<()> {
    let fields = [
        ("app", &paths.app),
        ("build", &paths.build),
        ("templates", &paths.templates),
        ("scripts", &paths.scripts),
        ("styles", &paths.styles),
        ("server_entry", &paths.server_entry),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(config_error(format!("[paths].{name} must not be empty")));
        }
    }

    // The excluded source subtrees must be real subdirectories of the app root.
    for (name, value) in [("templates", &paths.templates), ("styles", &paths.styles)] {
        if normalize(value).as_os_str().is_empty() {
            return Err(config_error(format!(
                "[paths].{name} must name a subdirectory of the app root, got '{value}'"
            )));
        }
    }

    if normalize(&paths.templates) == normalize(&paths.styles) {
        return Err(config_error(format!(
            "[paths].templates and [paths].styles must differ (both are '{}')",
            paths.templates
        )));
    }

    let app = normalize(&paths.app);
    let build = normalize(&paths.build);
    if build.starts_with(&app) || (!app.as_os_str().is_empty() && app.starts_with(&build)) {
        return Err(config_error(format!(
            "[paths].build ('{}') must not overlap the app root ('{}')",
            paths.build, paths.app
        )));
    }

    Ok(())
}

fn resolve_compile_task(
    name: &str,
    raw: &RawCompileTask,
    defaults: CompileTaskConfig,
) -> Result<CompileTaskConfig> {
    let resolved = CompileTaskConfig {
        cmd: raw.cmd.clone().unwrap_or(defaults.cmd),
        entry: raw.entry.clone().unwrap_or(defaults.entry),
        output: raw.output.clone().unwrap_or(defaults.output),
        watch: raw.watch.clone().unwrap_or(defaults.watch),
        exclude: raw.exclude.clone(),
    };

    if resolved.cmd.trim().is_empty() {
        return Err(config_error(format!("[tasks.{name}].cmd must not be empty")));
    }
    if resolved.watch.is_empty() {
        return Err(config_error(format!(
            "[tasks.{name}].watch must contain at least one pattern"
        )));
    }

    let output = Path::new(&resolved.output);
    if resolved.output.trim().is_empty()
        || output.is_absolute()
        || output
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(config_error(format!(
            "[tasks.{name}].output must be a relative path inside the build directory, got '{}'",
            resolved.output
        )));
    }

    validate_globs(&format!("[tasks.{name}].watch"), &resolved.watch)?;
    validate_globs(&format!("[tasks.{name}].exclude"), &resolved.exclude)?;

    Ok(resolved)
}

fn resolve_server(raw: &RawServerSection) -> Result<ServerConfig> {
    if raw.cmd.trim().is_empty() {
        return Err(config_error("[server].cmd must not be empty"));
    }
    if raw.port == 0 {
        return Err(config_error("[server].port must be non-zero"));
    }

    let ready_on_stdout = if raw.ready_on_stdout.is_empty() {
        None
    } else {
        Regex::new(&raw.ready_on_stdout).map_err(|e| {
            config_error(format!(
                "[server].ready_on_stdout is not a valid regex: {e}"
            ))
        })?;
        Some(raw.ready_on_stdout.clone())
    };

    let start_timeout = duration_field("[server].start_timeout", &raw.start_timeout)?;
    let stop_timeout = duration_field("[server].stop_timeout", &raw.stop_timeout)?;
    if start_timeout.is_zero() || stop_timeout.is_zero() {
        return Err(config_error(
            "[server].start_timeout and [server].stop_timeout must be non-zero",
        ));
    }

    Ok(ServerConfig {
        cmd: raw.cmd.clone(),
        args: raw.args.clone(),
        host: raw.host.clone(),
        port: raw.port,
        ready_on_stdout,
        start_timeout,
        stop_timeout,
    })
}
