//! Decomposition strategies — turning one complex request into tasks.
//!
//! Two pluggable planners behind one trait:
//!
//! - [`RulePlanner`]: splits known compound patterns on conjunctions and
//!   maps each clause onto a registered handler by keyword. Cheap,
//!   deterministic, and the fallback for everything else.
//! - [`BackendPlanner`]: asks the completion backend for a plan (one
//!   `handler: instruction` line per sub-task, optional `[after N]`
//!   dependency suffix) and falls back to the rules when the output is
//!   unparseable.

use async_trait::async_trait;
use confab_core::completion::{CompletionBackend, CompletionRequest, PromptMessage};
use confab_core::classification::ModelProfile;
use confab_core::error::Error;
use confab_core::handler::HandlerRegistry;
use confab_core::task::Task;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout and size bounds a planner applies to the tasks it emits.
#[derive(Debug, Clone)]
pub struct PlanDefaults {
    /// Default per-task timeout when the handler does not override it
    pub task_timeout: Duration,

    /// Whole-graph timeout; per-task timeouts are clamped strictly below it
    pub graph_timeout: Duration,

    /// Upper bound on emitted tasks
    pub max_tasks: usize,
}

/// A decomposition strategy.
///
/// Returns the task list for a complex request; an empty list means the
/// planner found nothing actionable and the caller should fall back to a
/// simpler path.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        request: &str,
        registry: &HandlerRegistry,
        defaults: &PlanDefaults,
    ) -> Result<Vec<Task>, Error>;
}

fn task_timeout(registry: &HandlerRegistry, handler: &str, defaults: &PlanDefaults) -> Duration {
    let timeout = registry
        .get(handler)
        .map(|h| h.call_timeout())
        .unwrap_or(defaults.task_timeout);
    // The graph timeout must stay strictly above every task timeout.
    let cap = defaults.graph_timeout.saturating_sub(Duration::from_millis(1));
    timeout.min(cap)
}

// ── Rule-based planning ───────────────────────────────────────────────────

/// Conjunction-splitting planner for known compound patterns.
#[derive(Debug, Default, Clone, Copy)]
pub struct RulePlanner;

impl RulePlanner {
    /// Split a request into clauses on conjunctions and sequence markers.
    fn split_clauses(request: &str) -> Vec<String> {
        let mut text = request.to_string();
        for separator in [" and then ", ", and ", " after that ", " then ", "; ", ", ", " and "] {
            text = text.replace(separator, "\u{1f}");
        }
        text.split('\u{1f}')
            .map(|c| c.trim().trim_end_matches(['.', '!']).to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Map one clause onto a registered handler, if any fits.
    fn handler_for(clause: &str, registry: &HandlerRegistry) -> Option<&'static str> {
        let lower = clause.to_lowercase();

        let candidate = if lower.contains("schedule")
            || lower.contains("meeting")
            || lower.contains("appointment")
            || lower.contains("book")
            || (lower.contains("remind") && lower.contains(" at "))
        {
            "calendar-write"
        } else if lower.contains("list") {
            "list-write"
        } else if lower.contains("remind") || lower.contains("remember") || lower.contains("note") {
            "memory-write"
        } else if lower.contains("turn")
            || lower.contains("light")
            || lower.contains("lock")
            || lower.contains("thermostat")
            || lower.contains("play")
            || lower.contains("dim")
        {
            "device-control"
        } else if lower.starts_with("what")
            || lower.starts_with("who")
            || lower.starts_with("when")
        {
            "fact-lookup"
        } else {
            return None;
        };

        registry.get(candidate).map(|_| candidate)
    }
}

#[async_trait]
impl Planner for RulePlanner {
    async fn plan(
        &self,
        request: &str,
        registry: &HandlerRegistry,
        defaults: &PlanDefaults,
    ) -> Result<Vec<Task>, Error> {
        let mut tasks = Vec::new();

        for clause in Self::split_clauses(request) {
            if tasks.len() >= defaults.max_tasks {
                warn!(max_tasks = defaults.max_tasks, "plan truncated at task cap");
                break;
            }
            let Some(handler) = Self::handler_for(&clause, registry) else {
                debug!(clause = %clause, "no handler for clause, dropping");
                continue;
            };
            let id = format!("step-{}", tasks.len() + 1);
            tasks.push(
                Task::new(id, handler, serde_json::json!({ "instruction": clause }))
                    .with_timeout(task_timeout(registry, handler, defaults)),
            );
        }

        debug!(tasks = tasks.len(), "rule planner produced plan");
        Ok(tasks)
    }
}

// ── Backend-delegated planning ────────────────────────────────────────────

/// Planner that delegates decomposition to the completion backend.
pub struct BackendPlanner {
    backend: Arc<dyn CompletionBackend>,
    profile: ModelProfile,
}

impl BackendPlanner {
    pub fn new(backend: Arc<dyn CompletionBackend>, profile: ModelProfile) -> Self {
        Self { backend, profile }
    }

    fn prompt(request: &str, registry: &HandlerRegistry) -> String {
        format!(
            "You are a task planner. Decompose this request into sub-tasks for the available handlers.\n\n\
            Available handlers:\n{}\n\n\
            Request: {}\n\n\
            Respond with one line per sub-task in the format: HANDLER_NAME: instruction\n\
            Append [after N] when a sub-task must wait for line N. Be concise.",
            registry.describe(),
            request
        )
    }

    /// Parse `handler: instruction [after N,M]` lines into tasks. Lines
    /// naming unknown handlers are dropped — the backend's output is
    /// untrusted input.
    fn parse(
        content: &str,
        registry: &HandlerRegistry,
        defaults: &PlanDefaults,
    ) -> Vec<Task> {
        let mut tasks: Vec<Task> = Vec::new();

        for line in content.lines() {
            if tasks.len() >= defaults.max_tasks {
                break;
            }
            let line = line.trim().trim_start_matches(|c: char| {
                c.is_ascii_digit() || c == '.' || c == ')' || c == '-' || c == ' '
            });
            if line.is_empty() {
                continue;
            }
            let Some((handler, rest)) = line.split_once(':') else {
                continue;
            };
            let handler = handler.trim().to_lowercase();
            if registry.get(&handler).is_none() {
                continue;
            }

            let mut instruction = rest.trim().to_string();
            let mut depends = Vec::new();
            if let Some(open) = instruction.rfind("[after ") {
                if let Some(close) = instruction[open..].find(']') {
                    let refs = &instruction[open + "[after ".len()..open + close];
                    for n in refs.split(',') {
                        if let Ok(n) = n.trim().parse::<usize>() {
                            if n >= 1 && n <= tasks.len() {
                                depends.push(format!("step-{n}"));
                            }
                        }
                    }
                    instruction.truncate(open);
                    instruction = instruction.trim_end().to_string();
                }
            }

            let id = format!("step-{}", tasks.len() + 1);
            let mut task =
                Task::new(id, &handler, serde_json::json!({ "instruction": instruction }))
                    .with_timeout(task_timeout(registry, &handler, defaults));
            task.depends_on = depends
                .iter()
                .map(|d| confab_core::task::TaskId::new(d.clone()))
                .collect();
            tasks.push(task);
        }

        tasks
    }
}

#[async_trait]
impl Planner for BackendPlanner {
    async fn plan(
        &self,
        request: &str,
        registry: &HandlerRegistry,
        defaults: &PlanDefaults,
    ) -> Result<Vec<Task>, Error> {
        let completion_request = CompletionRequest::new(
            ModelProfile {
                // Planning wants determinism regardless of the reply profile.
                temperature: 0.2,
                ..self.profile.clone()
            },
            vec![PromptMessage::system(Self::prompt(request, registry))],
        );

        let response = self.backend.complete(completion_request).await?;
        let tasks = Self::parse(&response.text, registry, defaults);

        if tasks.is_empty() {
            debug!("backend plan unparseable, falling back to rules");
            return RulePlanner.plan(request, registry, defaults).await;
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::completion::CompletionResponse;
    use confab_core::error::{CompletionError, HandlerError};
    use confab_core::handler::ExpertHandler;

    struct NoopHandler(&'static str);

    #[async_trait]
    impl ExpertHandler for NoopHandler {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "test"
        }
        async fn call(
            &self,
            _args: serde_json::Value,
        ) -> std::result::Result<serde_json::Value, HandlerError> {
            Ok(serde_json::json!({}))
        }
    }

    fn registry() -> HandlerRegistry {
        HandlerRegistry::builder()
            .register(Arc::new(NoopHandler("calendar-write")))
            .register(Arc::new(NoopHandler("list-write")))
            .register(Arc::new(NoopHandler("memory-write")))
            .register(Arc::new(NoopHandler("device-control")))
            .register(Arc::new(NoopHandler("fact-lookup")))
            .build()
    }

    fn defaults() -> PlanDefaults {
        PlanDefaults {
            task_timeout: Duration::from_secs(10),
            graph_timeout: Duration::from_secs(25),
            max_tasks: 16,
        }
    }

    struct ScriptedBackend(String);

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, CompletionError> {
            Ok(CompletionResponse {
                text: self.0.clone(),
                model: "scripted".into(),
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn rule_planner_decomposes_compound_request() {
        let tasks = RulePlanner
            .plan(
                "Schedule a meeting, add it to my list, and remind me of the priority",
                &registry(),
                &defaults(),
            )
            .await
            .unwrap();

        let handlers: Vec<&str> = tasks.iter().map(|t| t.handler.as_str()).collect();
        assert_eq!(handlers, vec!["calendar-write", "list-write", "memory-write"]);
        // Known compound patterns fan out with no cross-dependencies.
        assert!(tasks.iter().all(|t| t.depends_on.is_empty()));
    }

    #[tokio::test]
    async fn rule_planner_drops_unmatchable_clauses() {
        let tasks = RulePlanner
            .plan("blorp the fizzle and add milk to my list", &registry(), &defaults())
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].handler, "list-write");
    }

    #[tokio::test]
    async fn rule_planner_empty_for_non_actionable_text() {
        let tasks = RulePlanner
            .plan("tell me something interesting", &registry(), &defaults())
            .await
            .unwrap();
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn backend_planner_parses_lines_and_dependencies() {
        let backend = Arc::new(ScriptedBackend(
            "calendar-write: book the dentist appointment\n\
             list-write: add the appointment to the errands list [after 1]\n\
             nonsense line\n\
             unknown-handler: do something"
                .into(),
        ));
        let planner = BackendPlanner::new(backend, ModelProfile::new("p", "m", 0.2, 512));

        let tasks = planner
            .plan("book dentist and track it", &registry(), &defaults())
            .await
            .unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].handler, "calendar-write");
        assert_eq!(tasks[1].handler, "list-write");
        assert_eq!(tasks[1].depends_on.len(), 1);
        assert_eq!(tasks[1].depends_on[0].as_str(), "step-1");
        assert!(!tasks[1].args["instruction"].as_str().unwrap().contains("[after"));
    }

    #[tokio::test]
    async fn backend_planner_falls_back_to_rules_on_garbage() {
        let backend = Arc::new(ScriptedBackend("complete nonsense with no colons".into()));
        let planner = BackendPlanner::new(backend, ModelProfile::new("p", "m", 0.2, 512));

        let tasks = planner
            .plan("add milk to my shopping list", &registry(), &defaults())
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].handler, "list-write");
    }

    #[tokio::test]
    async fn backend_error_propagates() {
        struct DownBackend;

        #[async_trait]
        impl CompletionBackend for DownBackend {
            fn name(&self) -> &str {
                "down"
            }
            async fn complete(
                &self,
                _request: CompletionRequest,
            ) -> std::result::Result<CompletionResponse, CompletionError> {
                Err(CompletionError::Unavailable("connection refused".into()))
            }
        }

        let planner = BackendPlanner::new(Arc::new(DownBackend), ModelProfile::new("p", "m", 0.2, 512));
        let err = planner
            .plan("do things", &registry(), &defaults())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Completion(_)));
    }

    #[tokio::test]
    async fn planner_clamps_timeout_below_graph_timeout() {
        struct SlowTimeoutHandler;

        #[async_trait]
        impl ExpertHandler for SlowTimeoutHandler {
            fn name(&self) -> &str {
                "list-write"
            }
            fn description(&self) -> &str {
                "test"
            }
            fn call_timeout(&self) -> Duration {
                Duration::from_secs(3600)
            }
            async fn call(
                &self,
                _args: serde_json::Value,
            ) -> std::result::Result<serde_json::Value, HandlerError> {
                Ok(serde_json::json!({}))
            }
        }

        let registry = HandlerRegistry::builder()
            .register(Arc::new(SlowTimeoutHandler))
            .build();

        let tasks = RulePlanner
            .plan("add milk to my list", &registry, &defaults())
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].timeout < defaults().graph_timeout);
    }
}
