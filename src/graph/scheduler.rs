// src/graph/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::errors::{DevloopError, Result};
use crate::graph::graph::{TaskGraph, WatchBinding};
use crate::graph::scheduler_step::SchedulerStep;
use crate::graph::task::BuildRun;
use crate::graph::task_info::{ScheduledBuild, SlotState, TaskRunState};
use crate::types::{TaskName, TriggerOrigin};

/// Scheduler holds the task graph plus one slot per task.
///
/// It is responsible for:
/// - starting a build immediately when an idle task is triggered
/// - recording a single pending rerun when a busy task is triggered
/// - starting exactly one follow-up run when a task with a pending rerun
///   completes
///
/// It performs no IO; the engine feeds it events and dispatches the
/// builds it returns.
#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    slots: HashMap<TaskName, SlotState>,
    /// Monotonically increasing run ID, shared by all tasks.
    run_counter: u64,
}

impl Scheduler {
    pub fn new(graph: TaskGraph) -> Self {
        let slots = graph
            .task_names()
            .map(|name| (name.to_string(), SlotState::Idle))
            .collect();
        Self {
            graph,
            slots,
            run_counter: 0,
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Register another trigger source.
    pub fn bind(&mut self, binding: WatchBinding) -> Result<()> {
        self.graph.bind(binding)
    }

    /// Read-only view of the given task's state.
    pub fn state_of(&self, task: &str) -> Option<TaskRunState> {
        self.slots.get(task).copied().map(Into::into)
    }

    /// Returns `true` if no task is running.
    pub fn is_idle(&self) -> bool {
        self.slots.values().all(|s| matches!(s, SlotState::Idle))
    }

    /// A watcher reported a coalesced change for `binding`.
    pub fn on_trigger(&mut self, binding: &str) -> SchedulerStep {
        let tasks = match self.graph.binding(binding) {
            Some(b) => b.tasks.clone(),
            None => {
                warn!(binding = %binding, "trigger for unknown binding; ignoring");
                return SchedulerStep::default();
            }
        };

        let mut step = SchedulerStep::default();
        for task in tasks {
            step.merge(self.request(&task, TriggerOrigin::Watch));
        }
        step
    }

    /// Run `task` unconditionally. If it is busy, the request is folded into
    /// the single pending rerun.
    pub fn run_now(&mut self, task: &str) -> Result<SchedulerStep> {
        if !self.slots.contains_key(task) {
            return Err(DevloopError::TaskNotFound(task.to_string()));
        }
        Ok(self.request(task, TriggerOrigin::Direct))
    }

    /// A build finished. Returns the follow-up run if one was pending.
    pub fn on_completed(&mut self, run: &BuildRun) -> SchedulerStep {
        let Some(slot) = self.slots.get_mut(&run.task) else {
            warn!(task = %run.task, "completion for unknown task; ignoring");
            return SchedulerStep::default();
        };

        match *slot {
            SlotState::Running { run_id, rerun } if run_id == run.run_id => {
                *slot = SlotState::Idle;
                match rerun {
                    Some(origin) => {
                        debug!(task = %run.task, run_id, "starting queued rerun");
                        let build = self.start(&run.task, origin);
                        SchedulerStep {
                            newly_scheduled: build.into_iter().collect(),
                            queued: Vec::new(),
                        }
                    }
                    None => SchedulerStep::default(),
                }
            }
            other => {
                warn!(
                    task = %run.task,
                    run_id = run.run_id,
                    state = ?other,
                    "completion does not match the running build; ignoring"
                );
                SchedulerStep::default()
            }
        }
    }

    fn request(&mut self, task: &str, origin: TriggerOrigin) -> SchedulerStep {
        let Some(slot) = self.slots.get_mut(task) else {
            warn!(task = %task, "trigger for unknown task; ignoring");
            return SchedulerStep::default();
        };

        if let SlotState::Running { run_id, rerun } = slot {
            let merged = match (*rerun, origin) {
                (Some(TriggerOrigin::Direct), _) => TriggerOrigin::Direct,
                (_, o) => o,
            };
            *rerun = Some(merged);
            debug!(task = %task, run_id = *run_id, "task busy; rerun pending");
            return SchedulerStep {
                newly_scheduled: Vec::new(),
                queued: vec![task.to_string()],
            };
        }

        SchedulerStep {
            newly_scheduled: self.start(task, origin).into_iter().collect(),
            queued: Vec::new(),
        }
    }

    fn start(&mut self, task: &str, origin: TriggerOrigin) -> Option<ScheduledBuild> {
        let def = self.graph.task(task)?.clone();
        self.run_counter += 1;
        let run_id = self.run_counter;
        self.slots.insert(
            task.to_string(),
            SlotState::Running {
                run_id,
                rerun: None,
            },
        );
        debug!(task = %task, run_id, ?origin, "scheduling build");
        Some(ScheduledBuild {
            task: def,
            run_id,
            origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::graph::task::{BuildOutcome, RunFuture, Task, TaskRunner};

    struct Noop;

    impl TaskRunner for Noop {
        fn run(&self) -> RunFuture<'_> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn task(name: &str) -> Task {
        Task {
            name: name.to_string(),
            include: vec![format!("{name}/**")],
            exclude: Vec::new(),
            output_root: "build".into(),
            browser_visible: true,
            runner: Arc::new(Noop),
        }
    }

    fn scheduler(names: &[&str]) -> Scheduler {
        let mut graph = TaskGraph::new();
        for name in names {
            let t = task(name);
            let binding = WatchBinding::for_task(&t);
            graph.add_task(t).unwrap();
            graph.bind(binding).unwrap();
        }
        Scheduler::new(graph)
    }

    fn finished(build: &ScheduledBuild) -> BuildRun {
        BuildRun {
            task: build.task.name.clone(),
            run_id: build.run_id,
            origin: build.origin,
            started_at: SystemTime::now(),
            duration: Duration::ZERO,
            outcome: BuildOutcome::Success {
                outputs: Vec::new(),
            },
        }
    }

    #[test]
    fn idle_trigger_starts_immediately() {
        let mut s = scheduler(&["styles"]);
        let step = s.on_trigger("styles");
        assert_eq!(step.newly_scheduled.len(), 1);
        assert_eq!(step.newly_scheduled[0].origin, TriggerOrigin::Watch);
        assert!(matches!(
            s.state_of("styles"),
            Some(TaskRunState::Running {
                rerun_pending: false,
                ..
            })
        ));
    }

    #[test]
    fn busy_triggers_coalesce_into_one_rerun() {
        let mut s = scheduler(&["styles"]);
        let first = s.on_trigger("styles").newly_scheduled.remove(0);

        for _ in 0..5 {
            let step = s.on_trigger("styles");
            assert!(step.newly_scheduled.is_empty());
            assert_eq!(step.queued, vec!["styles".to_string()]);
        }

        let follow_up = s.on_completed(&finished(&first));
        assert_eq!(follow_up.newly_scheduled.len(), 1);
        let second = &follow_up.newly_scheduled[0];
        assert!(second.run_id > first.run_id);

        let done = s.on_completed(&finished(second));
        assert!(done.is_empty());
        assert!(s.is_idle());
    }

    #[test]
    fn direct_request_wins_over_watch_for_the_rerun() {
        let mut s = scheduler(&["scripts"]);
        let first = s.run_now("scripts").unwrap().newly_scheduled.remove(0);
        s.on_trigger("scripts");
        s.run_now("scripts").unwrap();
        s.on_trigger("scripts");

        let step = s.on_completed(&finished(&first));
        assert_eq!(step.newly_scheduled[0].origin, TriggerOrigin::Direct);
    }

    #[test]
    fn failure_returns_task_to_idle() {
        let mut s = scheduler(&["templates"]);
        let build = s.on_trigger("templates").newly_scheduled.remove(0);
        let mut run = finished(&build);
        run.outcome = BuildOutcome::Failure(crate::exec::Diagnostic::new("boom"));

        assert!(s.on_completed(&run).is_empty());
        assert_eq!(s.state_of("templates"), Some(TaskRunState::Idle));
        assert_eq!(s.on_trigger("templates").newly_scheduled.len(), 1);
    }

    #[test]
    fn tasks_are_independent() {
        let mut s = scheduler(&["styles", "scripts"]);
        s.on_trigger("styles");
        let step = s.on_trigger("scripts");
        assert_eq!(step.newly_scheduled.len(), 1);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut s = scheduler(&["styles"]);
        let build = s.on_trigger("styles").newly_scheduled.remove(0);
        let mut stale = finished(&build);
        stale.run_id += 100;
        s.on_completed(&stale);
        assert!(!s.is_idle());
    }

    #[test]
    fn run_now_unknown_task_is_an_error() {
        let mut s = scheduler(&["styles"]);
        assert!(matches!(
            s.run_now("nope"),
            Err(DevloopError::TaskNotFound(_))
        ));
    }

    #[test]
    fn binding_to_unknown_task_is_rejected() {
        let mut s = scheduler(&["styles"]);
        let err = s
            .bind(WatchBinding {
                name: "extra".into(),
                patterns: vec!["x/**".into()],
                exclude: Vec::new(),
                tasks: vec!["ghost".into()],
            })
            .unwrap_err();
        assert!(matches!(err, DevloopError::TaskNotFound(_)));
    }

    #[test]
    fn one_binding_can_trigger_several_tasks() {
        let mut s = scheduler(&["styles", "scripts"]);
        s.bind(WatchBinding {
            name: "everything".into(),
            patterns: vec!["**".into()],
            exclude: Vec::new(),
            tasks: vec!["styles".into(), "scripts".into()],
        })
        .unwrap();
        assert_eq!(s.on_trigger("everything").newly_scheduled.len(), 2);
    }
}
