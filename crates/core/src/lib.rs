//! # Confab Core
//!
//! Domain types, traits, and error definitions for the confab assistant
//! backend. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: the generative
//! completion backend, the fact/memory store, and the expert handlers. The
//! decision-and-orchestration crates (router, context, orchestrator, engine)
//! depend inward on this crate, never on each other's internals. This
//! enables:
//! - Swapping collaborators via configuration
//! - Easy testing with scripted/stub implementations
//! - A clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod utterance;
pub mod classification;
pub mod record;
pub mod completion;
pub mod task;
pub mod handler;
pub mod reply;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use utterance::{Utterance, ScopeId, ConversationId, ConversationState, Turn, TurnRole};
pub use classification::{
    ClassificationResult, DeterministicAction, ExecutionPath, IntentClass, ModelProfile,
};
pub use record::{ContextQuery, ContextRecord, ContextStore, RecordKind};
pub use completion::{
    CompletionBackend, CompletionRequest, CompletionResponse, PromptMessage, PromptRole,
};
pub use task::{Task, TaskId, TaskOutcome, TaskReport, TaskState};
pub use handler::{ExpertCall, ExpertHandler, ExpertResult, HandlerRegistry};
pub use reply::{ConfidenceAnnotation, Reply, Verdict};
pub use event::{DomainEvent, EventBus};
