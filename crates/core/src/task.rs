//! Tasks — the units of work an orchestrator invocation schedules.
//!
//! A [`Task`] names one expert handler, its arguments, the tasks it depends
//! on, and a timeout. Graph construction and execution live in
//! confab-orchestrator; this module holds the value objects shared across
//! crates, plus the per-task terminal-state report attached to replies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifier of a task within one task graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work: one handler call with dependencies and a timeout.
#[derive(Debug, Clone)]
pub struct Task {
    /// Identifier, unique within the graph
    pub id: TaskId,

    /// Name of the expert handler that executes this task
    pub handler: String,

    /// Structured arguments passed to the handler
    pub args: serde_json::Value,

    /// Tasks that must succeed before this one starts
    pub depends_on: Vec<TaskId>,

    /// Per-task timeout; exceeded ⇒ the task is marked timed-out
    pub timeout: Duration,
}

impl Task {
    pub fn new(id: impl Into<String>, handler: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: TaskId::new(id),
            handler: handler.into(),
            args,
            depends_on: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.depends_on = ids.iter().map(|s| TaskId::new(*s)).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    /// A dependency did not succeed, so this task was never attempted
    Skipped,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::TimedOut | Self::Skipped
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// The terminal state of one task, as reported with the final reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub handler: String,
    pub state: TaskState,

    /// Error kind for failed/timed-out tasks, preserved for the
    /// partial-failure notice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Wall-clock duration of the handler call, when one was made
    #[serde(default)]
    pub duration_ms: u64,
}

/// Per-task terminal states for one orchestrator invocation. The final
/// result always reports which tasks succeeded, failed, or were skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl TaskReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.state == TaskState::Succeeded)
    }

    /// Outcomes that did not succeed, in report order.
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.state != TaskState::Succeeded)
    }

    pub fn outcome(&self, id: &TaskId) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| &o.task_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_builder() {
        let task = Task::new("t1", "list-write", serde_json::json!({"item": "milk"}))
            .depends_on(&["t0"])
            .with_timeout(Duration::from_secs(5));
        assert_eq!(task.id.as_str(), "t1");
        assert_eq!(task.depends_on, vec![TaskId::new("t0")]);
        assert_eq!(task.timeout, Duration::from_secs(5));
    }

    #[test]
    fn terminal_states() {
        assert!(TaskState::Succeeded.is_terminal());
        assert!(TaskState::Skipped.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn report_failures() {
        let report = TaskReport {
            outcomes: vec![
                TaskOutcome {
                    task_id: TaskId::new("a"),
                    handler: "calendar-write".into(),
                    state: TaskState::Succeeded,
                    error_kind: None,
                    duration_ms: 12,
                },
                TaskOutcome {
                    task_id: TaskId::new("b"),
                    handler: "list-write".into(),
                    state: TaskState::TimedOut,
                    error_kind: Some("timeout".into()),
                    duration_ms: 5000,
                },
            ],
        };
        assert!(!report.all_succeeded());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task_id.as_str(), "b");
    }
}
