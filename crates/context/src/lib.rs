//! Context assembly and caching for confab.
//!
//! Gathers bounded, ranked facts from the context store and caches
//! expensive summaries:
//!
//! - [`store`]: the in-process reference [`confab_core::ContextStore`] with
//!   per-scope version counters (the durable store is an external
//!   collaborator; this adapter backs tests and the CLI harness).
//! - [`assembler`]: rank, truncate to budget, guarantee a personal-fact
//!   floor, and decide whether the summarization step was expensive enough
//!   to cache.
//! - [`cache`]: the TTL summary cache with version-fingerprinted keys and
//!   per-key single-flight coordination.
//! - [`clock`]: the injected clock — cache logic never reads wall-clock
//!   time directly.

pub mod assembler;
pub mod cache;
pub mod clock;
pub mod store;

pub use assembler::{Assembler, ContextAssembly};
pub use cache::SummaryCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::InMemoryContextStore;
