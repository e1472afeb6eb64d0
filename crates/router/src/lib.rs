//! Intent classification for confab — the stages that gate every request.
//!
//! Two layers, both synchronous and allocation-light:
//!
//! 1. **Fast path** ([`fastpath`]): a closed, ordered set of conflict-checked
//!    templates. A hit produces a [`confab_core::DeterministicAction`] that
//!    goes straight to one expert handler — no router, no context assembly,
//!    no completion backend.
//! 2. **Query router** ([`router`]): a rule-based signal set that picks one
//!    of four coarse intent classes, maps it to an execution path and a
//!    model/temperature profile, and breaks near-ties by blast radius.

pub mod fastpath;
pub mod router;
mod signals;

pub use fastpath::{Template, TemplateRegistry};
pub use router::QueryRouter;
