// src/entry/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::entry::EntryAction;
use crate::errors::{DevloopError, Result};
use crate::graph::standard::{ASSETS, SCRIPTS, SERVER, STYLES, TEMPLATES};

/// A named CLI target: prerequisites that run first, then its own actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub after: Vec<String>,
    pub actions: Vec<EntryAction>,
}

impl EntryPoint {
    fn new(name: &str, after: &[&str], actions: Vec<EntryAction>) -> Self {
        Self {
            name: name.to_string(),
            after: after.iter().map(|s| s.to_string()).collect(),
            actions,
        }
    }
}

/// Entry points to run for one invocation, grouped into levels. Entries in
/// a level are independent of each other and run concurrently; a level
/// starts after the previous one has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub levels: Vec<Vec<EntryPoint>>,
}

impl Plan {
    pub fn entries(&self) -> impl Iterator<Item = &EntryPoint> {
        self.levels.iter().flatten()
    }

    /// Whether the plan leaves something running (a watch or the server).
    pub fn is_long_running(&self) -> bool {
        self.entries()
            .flat_map(|e| e.actions.iter())
            .any(|a| matches!(a, EntryAction::Watch(_) | EntryAction::StartServer))
    }
}

/// The validated set of entry points.
#[derive(Debug, Clone)]
pub struct EntryGraph {
    entries: BTreeMap<String, EntryPoint>,
}

impl EntryGraph {
    /// Validate that every prerequisite exists and that there is no cycle.
    pub fn new(entries: Vec<EntryPoint>) -> Result<Self> {
        let entries: BTreeMap<String, EntryPoint> = entries
            .into_iter()
            .map(|e| (e.name.clone(), e))
            .collect();

        for entry in entries.values() {
            for dep in &entry.after {
                if !entries.contains_key(dep) {
                    return Err(DevloopError::ConfigError(format!(
                        "entry '{}' depends on unknown entry '{}'",
                        entry.name, dep
                    )));
                }
            }
        }

        // Edge direction: prerequisite -> entry.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in entries.keys() {
            graph.add_node(name.as_str());
        }
        for entry in entries.values() {
            for dep in &entry.after {
                graph.add_edge(dep.as_str(), entry.name.as_str(), ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(DevloopError::EntryCycle(format!(
                "cycle involving entry '{}'",
                cycle.node_id()
            )));
        }

        Ok(Self { entries })
    }

    /// The entry points this tool ships with.
    pub fn standard() -> Result<Self> {
        use EntryAction::{Run, StartServer, Watch};

        Self::new(vec![
            EntryPoint::new("make", &[], vec![Run(TEMPLATES.into())]),
            EntryPoint::new("make:watch", &["make"], vec![Watch(TEMPLATES.into())]),
            EntryPoint::new("bundle", &[], vec![Run(SCRIPTS.into())]),
            EntryPoint::new(
                "watchify",
                &[],
                vec![Run(SCRIPTS.into()), Watch(SCRIPTS.into())],
            ),
            EntryPoint::new("less", &[], vec![Run(STYLES.into())]),
            EntryPoint::new("less:watch", &["less"], vec![Watch(STYLES.into())]),
            EntryPoint::new("copy-assets", &[], vec![Run(ASSETS.into())]),
            EntryPoint::new(
                "copy-assets:watch",
                &["copy-assets"],
                vec![Watch(ASSETS.into())],
            ),
            EntryPoint::new("server:start", &[], vec![StartServer]),
            EntryPoint::new("server:restart", &[], vec![Run(SERVER.into())]),
            EntryPoint::new("server:watch", &["server:start"], vec![Watch(SERVER.into())]),
            EntryPoint::new(
                "default",
                &[
                    "watchify",
                    "make:watch",
                    "less:watch",
                    "copy-assets:watch",
                    "server:watch",
                ],
                Vec::new(),
            ),
        ])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&EntryPoint> {
        self.entries.get(name)
    }

    /// `entry` and all of its transitive prerequisites, levelled by depth.
    pub fn plan(&self, entry: &str) -> Result<Plan> {
        if !self.entries.contains_key(entry) {
            return Err(DevloopError::UnknownEntry(entry.to_string()));
        }

        let mut needed = BTreeSet::new();
        let mut stack = vec![entry];
        while let Some(name) = stack.pop() {
            if needed.insert(name) {
                if let Some(e) = self.entries.get(name) {
                    stack.extend(e.after.iter().map(|s| s.as_str()));
                }
            }
        }

        let mut depths: BTreeMap<&str, usize> = BTreeMap::new();
        for name in &needed {
            self.depth_of(name, &mut depths);
        }

        let max_depth = depths.values().copied().max().unwrap_or(0);
        let mut levels = vec![Vec::new(); max_depth + 1];
        for (name, depth) in depths {
            if let Some(e) = self.entries.get(name) {
                levels[depth].push(e.clone());
            }
        }

        Ok(Plan { levels })
    }

    /// Longest prerequisite chain below `name`. Terminates because the
    /// graph was checked acyclic.
    fn depth_of<'a>(&'a self, name: &'a str, memo: &mut BTreeMap<&'a str, usize>) -> usize {
        if let Some(d) = memo.get(name) {
            return *d;
        }
        let depth = self
            .entries
            .get(name)
            .map(|e| {
                e.after
                    .iter()
                    .map(|dep| self.depth_of(dep, memo) + 1)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        memo.insert(name, depth);
        depth
    }
}
