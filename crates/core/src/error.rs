//! Error types for the confab domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. The propagation rule:
//! component-local failures (one task, one context fetch) are recovered
//! where they happen and reported as partial results; only failures that
//! block the entire request (completion backend down on the
//! single-completion path, graph validation failure) reach the caller.

use thiserror::Error;

/// The top-level error type for all confab operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion backend errors ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    // --- Context store / assembly errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Expert handler errors ---
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    // --- Task graph errors ---
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    // --- Fast-path template errors ---
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures reaching the generative completion backend. `Unavailable` and
/// `Timeout` are fatal on the single-completion path; on the orchestrator
/// path they degrade only the tasks that depend on the backend.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("Completion backend unreachable: {0}")]
    Unavailable(String),

    #[error("Completion request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Completion API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    #[error("Malformed completion response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("Context store unreachable: {0}")]
    StoreUnavailable(String),

    #[error("Context query failed: {0}")]
    QueryFailed(String),

    #[error("Context assembly failed: {0}")]
    Assembly(String),
}

#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error("Handler not found: {0}")]
    NotFound(String),

    #[error("Handler failed: {handler} — {kind}")]
    Failed { handler: String, kind: String },

    #[error("Handler timed out: {handler} after {timeout_ms}ms")]
    Timeout { handler: String, timeout_ms: u64 },

    #[error("Invalid handler arguments: {0}")]
    InvalidArguments(String),
}

impl HandlerError {
    /// Short machine-readable kind, preserved for partial-failure notices.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Failed { .. } => "failed",
            Self::Timeout { .. } => "timeout",
            Self::InvalidArguments(_) => "invalid_arguments",
        }
    }
}

/// Malformed task graphs are rejected before any task runs — a broken
/// graph never partially executes.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("Task graph contains a cycle through '{task}'")]
    Cycle { task: String },

    #[error("Task '{task}' depends on unknown task '{missing}'")]
    DanglingDependency { task: String, missing: String },

    #[error("Duplicate task id '{task}'")]
    DuplicateTask { task: String },

    #[error("Task graph has no tasks")]
    Empty,

    #[error(
        "Whole-graph timeout ({graph_ms}ms) must exceed the largest task timeout ({max_task_ms}ms)"
    )]
    TimeoutBound { graph_ms: u64, max_task_ms: u64 },
}

/// Rejected at template registration time, never at match time.
#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    #[error("Templates overlap: '{first}' and '{second}' can match the same input")]
    Overlap { first: String, second: String },

    #[error("Invalid template '{template}': {reason}")]
    Parse { template: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_error_displays_correctly() {
        let err = Error::Completion(CompletionError::Api {
            status: 503,
            message: "overloaded".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
    }

    #[test]
    fn handler_error_preserves_kind() {
        let err = HandlerError::Timeout {
            handler: "list-write".into(),
            timeout_ms: 5000,
        };
        assert_eq!(err.kind(), "timeout");
        assert!(err.to_string().contains("list-write"));
    }

    #[test]
    fn graph_error_names_offender() {
        let err = Error::Graph(GraphError::DanglingDependency {
            task: "remind".into(),
            missing: "schedule".into(),
        });
        assert!(err.to_string().contains("remind"));
        assert!(err.to_string().contains("schedule"));
    }

    #[test]
    fn template_overlap_names_both() {
        let err = TemplateError::Overlap {
            first: "add {item} to {list}".into(),
            second: "add {thing} to {place}".into(),
        };
        assert!(err.to_string().contains("{item}"));
        assert!(err.to_string().contains("{place}"));
    }
}
