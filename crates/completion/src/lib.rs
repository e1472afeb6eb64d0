//! Adapters for the external generative-text backend.
//!
//! The backend itself is an external collaborator; this crate is the thin
//! client side of that interface. [`HttpBackend`] speaks the
//! OpenAI-compatible `/v1/chat/completions` shape, which covers the vast
//! majority of hosted and local serving stacks.

pub mod http;

pub use http::HttpBackend;
