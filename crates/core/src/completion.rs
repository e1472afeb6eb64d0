//! Completion backend trait — the abstraction over the generative-text
//! service.
//!
//! The backend itself (model weights, sampling, GPU scheduling) is an
//! external collaborator. The core sends a prompt plus a model profile and
//! gets text back. Callers wrap `complete()` in `tokio::time::timeout`;
//! dropping the future is the cancellation contract, and a late result is
//! discarded, never merged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::classification::ModelProfile;
use crate::error::CompletionError;

/// The role of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One message in a completion prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// A request to the completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model, temperature, and output budget selected by the router
    pub profile: ModelProfile,

    /// The prompt messages (system message first when present)
    pub messages: Vec<PromptMessage>,
}

impl CompletionRequest {
    pub fn new(profile: ModelProfile, messages: Vec<PromptMessage>) -> Self {
        Self { profile, messages }
    }
}

/// A response from the completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text
    pub text: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage, when the backend reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The completion backend trait.
///
/// Implementations: the OpenAI-compatible HTTP adapter (confab-completion)
/// and scripted backends for tests.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Send a request and get the complete generated text.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        Ok(true)
    }
}
