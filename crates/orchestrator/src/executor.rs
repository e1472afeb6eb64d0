//! Dependency-ordered concurrent task execution.
//!
//! Tasks with no unresolved dependencies run concurrently on the tokio
//! pool, each under its task-level timeout. A task whose dependency did not
//! succeed is marked skipped without being attempted, but sibling branches
//! keep running. The whole-graph timeout races the scheduler: when it
//! fires, still-running tasks are aborted (their late results discarded)
//! and aggregation proceeds with whatever terminal states exist.

use confab_core::event::{DomainEvent, EventBus};
use confab_core::handler::{ExpertCall, ExpertResult, HandlerRegistry};
use confab_core::task::{TaskId, TaskOutcome, TaskReport, TaskState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::graph::TaskGraph;

/// Everything one graph execution produced: per-task results in
/// topological order plus the terminal-state report.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Successful and failed handler results, keyed by task
    pub results: HashMap<TaskId, ExpertResult>,

    /// Terminal state of every task in the graph
    pub report: TaskReport,

    /// The graph's topological order, for synthesis
    pub topo_order: Vec<TaskId>,
}

/// Executes validated task graphs against the handler registry.
pub struct Executor {
    registry: Arc<HandlerRegistry>,
    events: Arc<EventBus>,
}

impl Executor {
    pub fn new(registry: Arc<HandlerRegistry>, events: Arc<EventBus>) -> Self {
        Self { registry, events }
    }

    /// Run the graph to completion or to its whole-graph timeout,
    /// whichever comes first. Always returns an outcome — partial failure
    /// is reported, never escalated from here.
    pub async fn execute(&self, graph: TaskGraph) -> ExecutionOutcome {
        let topo_order = graph.topo_order();
        let mut states: HashMap<TaskId, TaskState> = graph
            .tasks()
            .iter()
            .map(|t| (t.id.clone(), TaskState::Pending))
            .collect();
        let mut results: HashMap<TaskId, ExpertResult> = HashMap::new();
        let mut running: JoinSet<(TaskId, ExpertResult)> = JoinSet::new();
        let mut spawned_ids: HashMap<tokio::task::Id, TaskId> = HashMap::new();

        info!(tasks = graph.len(), timeout_ms = graph.graph_timeout().as_millis() as u64, "executing task graph");

        let deadline = tokio::time::sleep(graph.graph_timeout());
        tokio::pin!(deadline);

        loop {
            // Schedule: start every ready task, skip every task whose
            // dependency reached a non-success terminal state. Loop until
            // quiescent, since one skip can cascade.
            loop {
                let mut progressed = false;
                for task in graph.tasks() {
                    if states[&task.id] != TaskState::Pending {
                        continue;
                    }
                    let dep_states: Vec<TaskState> =
                        task.depends_on.iter().map(|d| states[d]).collect();

                    if dep_states
                        .iter()
                        .any(|s| s.is_terminal() && *s != TaskState::Succeeded)
                    {
                        states.insert(task.id.clone(), TaskState::Skipped);
                        debug!(task = %task.id, "task skipped: dependency did not succeed");
                        self.publish_finished(&task.id, &task.handler, TaskState::Skipped, 0);
                        progressed = true;
                    } else if dep_states.iter().all(|s| *s == TaskState::Succeeded) {
                        states.insert(task.id.clone(), TaskState::Running);
                        let registry = Arc::clone(&self.registry);
                        let call = ExpertCall::new(&task.handler, task.args.clone());
                        let id = task.id.clone();
                        let timeout = task.timeout;
                        let handle = running.spawn(async move {
                            let result = registry.dispatch_with_timeout(&call, timeout).await;
                            (id, result)
                        });
                        spawned_ids.insert(handle.id(), task.id.clone());
                        progressed = true;
                    }
                }
                if !progressed {
                    break;
                }
            }

            if states.values().all(|s| s.is_terminal()) {
                break;
            }

            tokio::select! {
                joined = running.join_next() => match joined {
                    Some(Ok((id, result))) => {
                        let state = terminal_state(&result);
                        self.publish_finished(
                            &id,
                            &result.handler,
                            state,
                            result.duration.as_millis() as u64,
                        );
                        states.insert(id.clone(), state);
                        results.insert(id, result);
                    }
                    Some(Err(join_err)) => {
                        // A worker panicked or was aborted outside the
                        // timeout path; fail its task rather than hang.
                        if let Some(id) = spawned_ids.get(&join_err.id()) {
                            warn!(task = %id, "task worker died");
                            states.insert(id.clone(), TaskState::Failed);
                        }
                    }
                    None => {
                        // Nothing running and nothing progressed: remaining
                        // pendings are unreachable, mark them skipped.
                        for (_, state) in states.iter_mut().filter(|(_, s)| !s.is_terminal()) {
                            *state = TaskState::Skipped;
                        }
                    }
                },
                _ = &mut deadline => {
                    warn!("whole-graph timeout elapsed, cancelling in-flight tasks");
                    running.abort_all();
                    for (id, state) in states.iter_mut() {
                        if *state == TaskState::Running {
                            debug!(task = %id, "in-flight task cancelled");
                            *state = TaskState::TimedOut;
                        } else if !state.is_terminal() {
                            *state = TaskState::Skipped;
                        }
                    }
                    break;
                }
            }
        }

        let report = build_report(&graph, &topo_order, &states, &results);
        info!(
            succeeded = report.outcomes.iter().filter(|o| o.state == TaskState::Succeeded).count(),
            total = report.outcomes.len(),
            "task graph finished"
        );

        ExecutionOutcome {
            results,
            report,
            topo_order,
        }
    }

    fn publish_finished(&self, id: &TaskId, handler: &str, state: TaskState, duration_ms: u64) {
        self.events.publish(DomainEvent::TaskFinished {
            task_id: id.to_string(),
            handler: handler.to_string(),
            state,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });
    }
}

fn terminal_state(result: &ExpertResult) -> TaskState {
    if result.success {
        TaskState::Succeeded
    } else if result.error_kind.as_deref() == Some("timeout") {
        TaskState::TimedOut
    } else {
        TaskState::Failed
    }
}

fn build_report(
    graph: &TaskGraph,
    topo_order: &[TaskId],
    states: &HashMap<TaskId, TaskState>,
    results: &HashMap<TaskId, ExpertResult>,
) -> TaskReport {
    let outcomes = topo_order
        .iter()
        .filter_map(|id| {
            let task = graph.get(id)?;
            let state = states.get(id).copied().unwrap_or(TaskState::Skipped);
            let result = results.get(id);
            Some(TaskOutcome {
                task_id: id.clone(),
                handler: task.handler.clone(),
                state,
                error_kind: result.and_then(|r| r.error_kind.clone()).or_else(|| {
                    match state {
                        TaskState::TimedOut => Some("timeout".into()),
                        TaskState::Skipped => Some("skipped".into()),
                        _ => None,
                    }
                }),
                duration_ms: result.map(|r| r.duration.as_millis() as u64).unwrap_or(0),
            })
        })
        .collect();
    TaskReport { outcomes }
}
