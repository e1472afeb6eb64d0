//! Task graph construction and validation.
//!
//! All structural checks happen at build time, before any task runs: a
//! graph with a cycle, a dangling dependency, a duplicate id, or a
//! whole-graph timeout that could not outlast its largest task is rejected
//! with a [`GraphError`] and schedules nothing.

use confab_core::error::GraphError;
use confab_core::task::{Task, TaskId};
use std::collections::HashMap;
use std::time::Duration;

/// A validated, acyclic set of tasks. Owned by exactly one executor
/// invocation and dropped when it completes.
#[derive(Debug)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    graph_timeout: Duration,
}

impl TaskGraph {
    pub fn builder(graph_timeout: Duration) -> GraphBuilder {
        GraphBuilder {
            tasks: Vec::new(),
            graph_timeout,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn graph_timeout(&self) -> Duration {
        self.graph_timeout
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Topological order (Kahn), stable with respect to insertion order.
    /// Well-defined because construction rejected cycles.
    pub fn topo_order(&self) -> Vec<TaskId> {
        let mut in_degree: HashMap<&TaskId, usize> = self
            .tasks
            .iter()
            .map(|t| (&t.id, t.depends_on.len()))
            .collect();

        let mut order = Vec::with_capacity(self.tasks.len());
        let mut ready: Vec<&TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.depends_on.is_empty())
            .map(|t| &t.id)
            .collect();

        while let Some(id) = ready.first().cloned() {
            ready.remove(0);
            order.push(id.clone());
            for task in &self.tasks {
                if task.depends_on.contains(id) {
                    if let Some(degree) = in_degree.get_mut(&task.id) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push(&task.id);
                        }
                    }
                }
            }
        }

        order
    }
}

/// Accumulates tasks, then validates the whole graph at once.
pub struct GraphBuilder {
    tasks: Vec<Task>,
    graph_timeout: Duration,
}

impl GraphBuilder {
    pub fn add_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn add_tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Validate and freeze the graph.
    pub fn build(self) -> Result<TaskGraph, GraphError> {
        if self.tasks.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut index: HashMap<TaskId, usize> = HashMap::with_capacity(self.tasks.len());
        for (i, task) in self.tasks.iter().enumerate() {
            if index.insert(task.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateTask {
                    task: task.id.to_string(),
                });
            }
        }

        for task in &self.tasks {
            for dep in &task.depends_on {
                if !index.contains_key(dep) {
                    return Err(GraphError::DanglingDependency {
                        task: task.id.to_string(),
                        missing: dep.to_string(),
                    });
                }
            }
        }

        check_for_cycles(&self.tasks, &index)?;

        let max_task_timeout = self
            .tasks
            .iter()
            .map(|t| t.timeout)
            .max()
            .unwrap_or(Duration::ZERO);
        if self.graph_timeout <= max_task_timeout {
            return Err(GraphError::TimeoutBound {
                graph_ms: self.graph_timeout.as_millis() as u64,
                max_task_ms: max_task_timeout.as_millis() as u64,
            });
        }

        Ok(TaskGraph {
            tasks: self.tasks,
            index,
            graph_timeout: self.graph_timeout,
        })
    }
}

/// DFS with a recursion stack; reports the first task found on a cycle.
fn check_for_cycles(tasks: &[Task], index: &HashMap<TaskId, usize>) -> Result<(), GraphError> {
    fn visit(
        current: usize,
        tasks: &[Task],
        index: &HashMap<TaskId, usize>,
        visited: &mut [bool],
        rec_stack: &mut [bool],
    ) -> Option<usize> {
        visited[current] = true;
        rec_stack[current] = true;

        for dep in &tasks[current].depends_on {
            let next = index[dep];
            if !visited[next] {
                if let Some(found) = visit(next, tasks, index, visited, rec_stack) {
                    return Some(found);
                }
            } else if rec_stack[next] {
                return Some(next);
            }
        }

        rec_stack[current] = false;
        None
    }

    let mut visited = vec![false; tasks.len()];
    let mut rec_stack = vec![false; tasks.len()];

    for start in 0..tasks.len() {
        if !visited[start] {
            if let Some(on_cycle) = visit(start, tasks, index, &mut visited, &mut rec_stack) {
                return Err(GraphError::Cycle {
                    task: tasks[on_cycle].id.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task::new(id, "echo", serde_json::json!({}))
            .depends_on(deps)
            .with_timeout(Duration::from_secs(1))
    }

    fn builder() -> GraphBuilder {
        TaskGraph::builder(Duration::from_secs(10))
    }

    #[test]
    fn valid_graph_builds() {
        let graph = builder()
            .add_task(task("a", &[]))
            .add_task(task("b", &["a"]))
            .add_task(task("c", &["a", "b"]))
            .build()
            .unwrap();
        assert_eq!(graph.len(), 3);
        assert!(graph.get(&TaskId::new("b")).is_some());
    }

    #[test]
    fn empty_graph_rejected() {
        assert!(matches!(builder().build(), Err(GraphError::Empty)));
    }

    #[test]
    fn duplicate_id_rejected() {
        let err = builder()
            .add_task(task("a", &[]))
            .add_task(task("a", &[]))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateTask { .. }));
    }

    #[test]
    fn dangling_dependency_rejected() {
        let err = builder()
            .add_task(task("a", &["ghost"]))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::DanglingDependency { .. }));
    }

    #[test]
    fn cycle_rejected() {
        let err = builder()
            .add_task(task("a", &["c"]))
            .add_task(task("b", &["a"]))
            .add_task(task("c", &["b"]))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn self_cycle_rejected() {
        let err = builder().add_task(task("a", &["a"])).build().unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn graph_timeout_must_exceed_largest_task_timeout() {
        let err = TaskGraph::builder(Duration::from_secs(1))
            .add_task(task("a", &[]))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::TimeoutBound { .. }));
    }

    #[test]
    fn topo_order_respects_dependencies() {
        let graph = builder()
            .add_task(task("c", &["a", "b"]))
            .add_task(task("a", &[]))
            .add_task(task("b", &["a"]))
            .build()
            .unwrap();

        let order = graph.topo_order();
        let pos = |id: &str| order.iter().position(|t| t.as_str() == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn topo_order_is_stable_for_independent_tasks() {
        let graph = builder()
            .add_task(task("x", &[]))
            .add_task(task("y", &[]))
            .add_task(task("z", &[]))
            .build()
            .unwrap();
        let order = graph.topo_order();
        let order: Vec<&str> = order.iter().map(|t| t.as_str()).collect();
        assert_eq!(order, vec!["x", "y", "z"]);
    }
}
