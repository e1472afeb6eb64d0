//! Expert handler trait and registry — the uniform tool-call contract.
//!
//! Each handler covers one external capability domain (calendar write, list
//! write, memory write, device control). Handlers are black boxes behind a
//! uniform call interface; the core never branches on handler names at call
//! sites — dispatch goes through the registry built at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::error::HandlerError;

/// A request to invoke one expert handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertCall {
    /// Name of the handler to invoke
    pub handler: String,

    /// Structured argument payload
    pub args: serde_json::Value,
}

impl ExpertCall {
    pub fn new(handler: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            handler: handler.into(),
            args,
        }
    }
}

/// The result of one handler invocation. Produced by exactly one task
/// execution; consumed once by the synthesizer.
#[derive(Debug, Clone)]
pub struct ExpertResult {
    /// Which handler ran
    pub handler: String,

    /// Whether the call succeeded
    pub success: bool,

    /// The result payload on success
    pub payload: Option<serde_json::Value>,

    /// Error kind on failure, preserved for partial-failure notices
    pub error_kind: Option<String>,

    /// Wall-clock duration of the call
    pub duration: Duration,
}

impl ExpertResult {
    pub fn success(handler: impl Into<String>, payload: serde_json::Value, duration: Duration) -> Self {
        Self {
            handler: handler.into(),
            success: true,
            payload: Some(payload),
            error_kind: None,
            duration,
        }
    }

    pub fn failure(handler: impl Into<String>, kind: impl Into<String>, duration: Duration) -> Self {
        Self {
            handler: handler.into(),
            success: false,
            payload: None,
            error_kind: Some(kind.into()),
            duration,
        }
    }
}

/// The expert handler trait.
///
/// Implementations are independent executors reached through this uniform
/// interface. In-process reference handlers live in confab-handlers; real
/// deployments may register adapters to remote services instead.
#[async_trait]
pub trait ExpertHandler: Send + Sync {
    /// The unique handler name (e.g., "list-write", "calendar-write").
    fn name(&self) -> &str;

    /// What this handler does (used by the planner when decomposing).
    fn description(&self) -> &str;

    /// Per-call timeout for this handler; the registry enforces it.
    fn call_timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    /// Execute the call with the given arguments.
    async fn call(
        &self,
        args: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, HandlerError>;
}

/// A registry of expert handlers, read-only after startup.
///
/// Built once through [`HandlerRegistry::builder`], then shared behind an
/// `Arc` with no locking on the read path.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ExpertHandler>>,
}

/// Accumulates handlers before the registry is frozen.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<String, Arc<dyn ExpertHandler>>,
}

impl HandlerRegistryBuilder {
    /// Register a handler. Replaces any existing handler with the same name.
    pub fn register(mut self, handler: Arc<dyn ExpertHandler>) -> Self {
        self.handlers.insert(handler.name().to_string(), handler);
        self
    }

    /// Freeze the registry. No handlers can be added at request time.
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Get a handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ExpertHandler>> {
        self.handlers.get(name).cloned()
    }

    /// List all registered handler names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// One line per handler, for planner prompts.
    pub fn describe(&self) -> String {
        let mut lines: Vec<String> = self
            .handlers
            .values()
            .map(|h| format!("- {}: {}", h.name(), h.description()))
            .collect();
        lines.sort();
        lines.join("\n")
    }

    /// Dispatch a call under the handler's own timeout.
    pub async fn dispatch(&self, call: &ExpertCall) -> ExpertResult {
        let timeout = self
            .get(&call.handler)
            .map(|h| h.call_timeout())
            .unwrap_or(Duration::from_secs(10));
        self.dispatch_with_timeout(call, timeout).await
    }

    /// Dispatch a call under an explicit timeout (the orchestrator passes
    /// the task-level timeout here).
    ///
    /// Never returns `Err`: missing handlers, failures, and timeouts are all
    /// folded into an [`ExpertResult`] so graph aggregation sees a uniform
    /// shape. A timed-out call's future is dropped; a late result is
    /// discarded, not merged.
    pub async fn dispatch_with_timeout(&self, call: &ExpertCall, timeout: Duration) -> ExpertResult {
        let started = Instant::now();

        let Some(handler) = self.get(&call.handler) else {
            return ExpertResult::failure(&call.handler, "not_found", started.elapsed());
        };

        match tokio::time::timeout(timeout, handler.call(call.args.clone())).await {
            Ok(Ok(payload)) => ExpertResult::success(&call.handler, payload, started.elapsed()),
            Ok(Err(err)) => {
                tracing::debug!(handler = %call.handler, error = %err, "handler call failed");
                ExpertResult::failure(&call.handler, err.kind(), started.elapsed())
            }
            Err(_) => {
                tracing::debug!(handler = %call.handler, timeout_ms = timeout.as_millis() as u64, "handler call timed out");
                ExpertResult::failure(&call.handler, "timeout", started.elapsed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl ExpertHandler for EchoHandler {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the arguments"
        }
        async fn call(
            &self,
            args: serde_json::Value,
        ) -> std::result::Result<serde_json::Value, HandlerError> {
            Ok(args)
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl ExpertHandler for SlowHandler {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Sleeps past its own timeout"
        }
        fn call_timeout(&self) -> Duration {
            Duration::from_millis(20)
        }
        async fn call(
            &self,
            _args: serde_json::Value,
        ) -> std::result::Result<serde_json::Value, HandlerError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(serde_json::json!({}))
        }
    }

    #[test]
    fn registry_lookup() {
        let registry = HandlerRegistry::builder()
            .register(Arc::new(EchoHandler))
            .build();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn dispatch_success() {
        let registry = HandlerRegistry::builder()
            .register(Arc::new(EchoHandler))
            .build();
        let result = registry
            .dispatch(&ExpertCall::new("echo", serde_json::json!({"x": 1})))
            .await;
        assert!(result.success);
        assert_eq!(result.payload.unwrap()["x"], 1);
    }

    #[tokio::test]
    async fn dispatch_missing_handler() {
        let registry = HandlerRegistry::builder().build();
        let result = registry
            .dispatch(&ExpertCall::new("nope", serde_json::json!({})))
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("not_found"));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_enforces_handler_timeout() {
        let registry = HandlerRegistry::builder()
            .register(Arc::new(SlowHandler))
            .build();
        let result = registry
            .dispatch(&ExpertCall::new("slow", serde_json::json!({})))
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("timeout"));
    }

    #[test]
    fn describe_lists_handlers() {
        let registry = HandlerRegistry::builder()
            .register(Arc::new(EchoHandler))
            .register(Arc::new(SlowHandler))
            .build();
        let text = registry.describe();
        assert!(text.contains("- echo:"));
        assert!(text.contains("- slow:"));
    }
}
