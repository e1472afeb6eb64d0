//! The multi-agent orchestrator for confab.
//!
//! Turns one complex request into an acyclic graph of expert-handler tasks
//! and executes it:
//!
//! - [`graph`]: construction-time validation — cycles, dangling
//!   dependencies, and the timeout bound are rejected before any task runs.
//! - [`executor`]: dependency-ordered concurrent scheduling with per-task
//!   and whole-graph timeouts; a failed dependency skips its dependents but
//!   never aborts sibling branches.
//! - [`planner`]: pluggable decomposition — rule-based for known compound
//!   patterns, completion-backed for novel ones.

pub mod executor;
pub mod graph;
pub mod planner;

pub use executor::{ExecutionOutcome, Executor};
pub use graph::{GraphBuilder, TaskGraph};
pub use planner::{BackendPlanner, PlanDefaults, Planner, RulePlanner};
