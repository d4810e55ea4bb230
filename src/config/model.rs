// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// Every section is optional; an empty file (or no file at all) describes
/// the conventional layout:
///
/// ```toml
/// [paths]
/// app = "app"
/// build = "build"
/// templates = "elm"
/// scripts = "js"
/// styles = "style"
/// server_entry = "server.js"
///
/// [watch]
/// debounce = "50ms"
///
/// [tasks.styles]
/// cmd = "lessc --source-map {entry} {output}"
/// output = "css/bundle.css"
///
/// [server]
/// port = 3000
/// stop_timeout = "3s"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub tasks: RawTasksSection,

    #[serde(default)]
    pub assets: AssetsSection,

    #[serde(default)]
    pub server: RawServerSection,

    #[serde(default)]
    pub livereload: LiveReloadSection,
}

/// `[paths]` section.
///
/// `app` and `build` are relative to the project root; the source subtrees
/// and the server entry are relative to `app`.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_app")]
    pub app: String,
    #[serde(default = "default_build")]
    pub build: String,
    #[serde(default = "default_templates")]
    pub templates: String,
    #[serde(default = "default_scripts")]
    pub scripts: String,
    #[serde(default = "default_styles")]
    pub styles: String,
    #[serde(default = "default_server_entry")]
    pub server_entry: String,
}

fn default_app() -> String {
    "app".to_string()
}

fn default_build() -> String {
    "build".to_string()
}

fn default_templates() -> String {
    "elm".to_string()
}

fn default_scripts() -> String {
    "js".to_string()
}

fn default_styles() -> String {
    "style".to_string()
}

fn default_server_entry() -> String {
    "server.js".to_string()
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            app: default_app(),
            build: default_build(),
            templates: default_templates(),
            scripts: default_scripts(),
            styles: default_styles(),
            server_entry: default_server_entry(),
        }
    }
}

impl PathsSection {
    /// `<app>/<templates>`, relative to the project root.
    pub fn template_dir(&self) -> String {
        join(&self.app, &self.templates)
    }

    pub fn script_dir(&self) -> String {
        join(&self.app, &self.scripts)
    }

    pub fn style_dir(&self) -> String {
        join(&self.app, &self.styles)
    }

    pub fn server_entry_path(&self) -> String {
        join(&self.app, &self.server_entry)
    }
}

pub(crate) fn join(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    let rel = rel.trim_start_matches("./").trim_matches('/');
    if base.is_empty() || base == "." {
        rel.to_string()
    } else {
        format!("{base}/{rel}")
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Coalescing window for filesystem events, e.g. `"50ms"`.
    #[serde(default = "default_debounce")]
    pub debounce: String,
}

fn default_debounce() -> String {
    "50ms".to_string()
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
        }
    }
}

/// `[tasks.templates]`, `[tasks.scripts]`, `[tasks.styles]`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTasksSection {
    #[serde(default)]
    pub templates: RawCompileTask,
    #[serde(default)]
    pub scripts: RawCompileTask,
    #[serde(default)]
    pub styles: RawCompileTask,
}

/// One compile task as written in the config. Unset fields fall back to
/// defaults derived from `[paths]`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCompileTask {
    /// Shell command line. `{entry}`, `{output}` and `{out_dir}` are
    /// substituted before running.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Entry file handed to the compiler, relative to the project root.
    #[serde(default)]
    pub entry: Option<String>,

    /// Output file, relative to the build directory.
    #[serde(default)]
    pub output: Option<String>,

    /// Watch patterns, relative to the project root. Replaces the defaults.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A compile task with every field resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileTaskConfig {
    pub cmd: String,
    pub entry: String,
    pub output: String,
    pub watch: Vec<String>,
    pub exclude: Vec<String>,
}

/// `[assets]` section.
///
/// The template and stylesheet subtrees are always excluded; `exclude`
/// can only add to that.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssetsSection {
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[server]` section as written.
#[derive(Debug, Clone, Deserialize)]
pub struct RawServerSection {
    #[serde(default = "default_server_cmd")]
    pub cmd: String,
    /// Arguments; `{entry}` is replaced with the server entry path.
    #[serde(default = "default_server_args")]
    pub args: Vec<String>,
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Regex matched against the server's stdout to detect readiness.
    /// An empty string means "wait for the port to accept connections".
    #[serde(default = "default_ready_on_stdout")]
    pub ready_on_stdout: String,
    #[serde(default = "default_start_timeout")]
    pub start_timeout: String,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: String,
}

fn default_server_cmd() -> String {
    "node".to_string()
}

fn default_server_args() -> Vec<String> {
    vec!["{entry}".to_string()]
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_ready_on_stdout() -> String {
    "listening".to_string()
}

fn default_start_timeout() -> String {
    "5s".to_string()
}

fn default_stop_timeout() -> String {
    "3s".to_string()
}

impl Default for RawServerSection {
    fn default() -> Self {
        Self {
            cmd: default_server_cmd(),
            args: default_server_args(),
            host: default_server_host(),
            port: default_server_port(),
            ready_on_stdout: default_ready_on_stdout(),
            start_timeout: default_start_timeout(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

/// Validated `[server]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub cmd: String,
    pub args: Vec<String>,
    pub host: String,
    pub port: u16,
    pub ready_on_stdout: Option<String>,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
}

/// `[livereload]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LiveReloadSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_livereload_host")]
    pub host: String,
    #[serde(default = "default_livereload_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_livereload_host() -> String {
    "127.0.0.1".to_string()
}

fn default_livereload_port() -> u16 {
    35729
}

impl Default for LiveReloadSection {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_livereload_host(),
            port: default_livereload_port(),
        }
    }
}

/// Validated configuration. Construct through `ConfigFile::try_from`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub debounce: Duration,
    pub templates: CompileTaskConfig,
    pub scripts: CompileTaskConfig,
    pub styles: CompileTaskConfig,
    pub asset_exclude: Vec<String>,
    pub server: ServerConfig,
    pub livereload: LiveReloadSection,
}
