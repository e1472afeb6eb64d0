//! The confab engine — one inbound utterance in, one reply out.
//!
//! Wires the decision-and-orchestration pieces into a pipeline:
//! fast-path classifier → query router → context assembly / orchestrator →
//! response synthesis → grounding annotation → post-reply follow-ups.
//!
//! The pipeline never invokes more than one execution path per utterance,
//! and the grounding validator only annotates — it cannot block or edit a
//! reply.

pub mod followup;
pub mod grounding;
pub mod pipeline;
pub mod synthesizer;
pub mod testing;

pub use pipeline::Engine;
