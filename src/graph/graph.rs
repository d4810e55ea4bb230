// src/graph/graph.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{DevloopError, Result};
use crate::graph::task::Task;
use crate::types::{BindingName, TaskName};

/// A set of glob patterns and the task(s) a match should trigger.
///
/// Patterns are relative to the project root. One changed file may satisfy
/// several bindings; each of them fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBinding {
    pub name: BindingName,
    pub patterns: Vec<String>,
    pub exclude: Vec<String>,
    pub tasks: Vec<TaskName>,
}

impl WatchBinding {
    /// A binding with the same name, patterns and excludes as `task`,
    /// triggering only that task.
    pub fn for_task(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            patterns: task.include.clone(),
            exclude: task.exclude.clone(),
            tasks: vec![task.name.clone()],
        }
    }
}

/// Registered tasks plus the bindings that trigger them.
#[derive(Debug, Default, Clone)]
pub struct TaskGraph {
    tasks: BTreeMap<TaskName, Arc<Task>>,
    bindings: BTreeMap<BindingName, WatchBinding>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(DevloopError::ConfigError(format!(
                "task '{}' is defined twice",
                task.name
            )));
        }
        self.tasks.insert(task.name.clone(), Arc::new(task));
        Ok(())
    }

    /// Register a trigger source. Every task it names must already exist.
    pub fn bind(&mut self, binding: WatchBinding) -> Result<()> {
        if let Some(missing) = binding.tasks.iter().find(|t| !self.tasks.contains_key(*t)) {
            return Err(DevloopError::TaskNotFound(missing.clone()));
        }
        if self.bindings.contains_key(&binding.name) {
            return Err(DevloopError::ConfigError(format!(
                "binding '{}' is registered twice",
                binding.name
            )));
        }
        self.bindings.insert(binding.name.clone(), binding);
        Ok(())
    }

    pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
        self.tasks.get(name)
    }

    pub fn binding(&self, name: &str) -> Option<&WatchBinding> {
        self.bindings.get(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.tasks.values()
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn bindings(&self) -> impl Iterator<Item = &WatchBinding> {
        self.bindings.values()
    }
}
